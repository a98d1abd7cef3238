use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "dealdesk.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backends: BackendsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BackendsConfig {
    pub sales_url: String,
    pub deal_url: String,
    pub sales_timeout_secs: u64,
    pub deal_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub cors_allow_any: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub sales_url: Option<String>,
    pub deal_url: Option<String>,
    pub sales_timeout_secs: Option<u64>,
    pub deal_timeout_secs: Option<u64>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backends: BackendsConfig {
                sales_url: "http://127.0.0.1:8000".to_string(),
                deal_url: "http://127.0.0.1:3000".to_string(),
                sales_timeout_secs: 30,
                deal_timeout_secs: 10,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8001,
                cors_allow_any: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl BackendsConfig {
    pub fn sales_timeout(&self) -> Duration {
        Duration::from_secs(self.sales_timeout_secs)
    }

    pub fn deal_timeout(&self) -> Duration {
        Duration::from_secs(self.deal_timeout_secs)
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(backends) = patch.backends {
            if let Some(sales_url) = backends.sales_url {
                self.backends.sales_url = sales_url;
            }
            if let Some(deal_url) = backends.deal_url {
                self.backends.deal_url = deal_url;
            }
            if let Some(sales_timeout_secs) = backends.sales_timeout_secs {
                self.backends.sales_timeout_secs = sales_timeout_secs;
            }
            if let Some(deal_timeout_secs) = backends.deal_timeout_secs {
                self.backends.deal_timeout_secs = deal_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(cors_allow_any) = server.cors_allow_any {
                self.server.cors_allow_any = cors_allow_any;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let sales_url =
            read_env("DEALDESK_BACKENDS_SALES_URL").or_else(|| read_env("SALES_AGENT_API_URL"));
        if let Some(value) = sales_url {
            self.backends.sales_url = value;
        }
        let deal_url =
            read_env("DEALDESK_BACKENDS_DEAL_URL").or_else(|| read_env("DEAL_SERVER_URL"));
        if let Some(value) = deal_url {
            self.backends.deal_url = value;
        }
        if let Some(value) = read_env("DEALDESK_BACKENDS_SALES_TIMEOUT_SECS") {
            self.backends.sales_timeout_secs =
                parse_u64("DEALDESK_BACKENDS_SALES_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DEALDESK_BACKENDS_DEAL_TIMEOUT_SECS") {
            self.backends.deal_timeout_secs =
                parse_u64("DEALDESK_BACKENDS_DEAL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DEALDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DEALDESK_SERVER_PORT") {
            self.server.port = parse_u16("DEALDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DEALDESK_SERVER_CORS_ALLOW_ANY") {
            self.server.cors_allow_any = parse_bool("DEALDESK_SERVER_CORS_ALLOW_ANY", &value)?;
        }

        let log_level =
            read_env("DEALDESK_LOGGING_LEVEL").or_else(|| read_env("DEALDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DEALDESK_LOGGING_FORMAT").or_else(|| read_env("DEALDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(sales_url) = overrides.sales_url {
            self.backends.sales_url = sales_url;
        }
        if let Some(deal_url) = overrides.deal_url {
            self.backends.deal_url = deal_url;
        }
        if let Some(sales_timeout_secs) = overrides.sales_timeout_secs {
            self.backends.sales_timeout_secs = sales_timeout_secs;
        }
        if let Some(deal_timeout_secs) = overrides.deal_timeout_secs {
            self.backends.deal_timeout_secs = deal_timeout_secs;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    fn normalize(&mut self) {
        self.backends.sales_url = trim_base_url(&self.backends.sales_url);
        self.backends.deal_url = trim_base_url(&self.backends.deal_url);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_backends(&self.backends)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Locates the config file: the explicit path when it exists, otherwise the
/// first of the conventional locations that exists.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn validate_backends(backends: &BackendsConfig) -> Result<(), ConfigError> {
    for (key, url) in
        [("backends.sales_url", &backends.sales_url), ("backends.deal_url", &backends.deal_url)]
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https:// (got `{url}`)"
            )));
        }
    }

    for (key, timeout_secs) in [
        ("backends.sales_timeout_secs", backends.sales_timeout_secs),
        ("backends.deal_timeout_secs", backends.deal_timeout_secs),
    ] {
        if timeout_secs == 0 || timeout_secs > 300 {
            return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    backends: Option<BackendsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendsPatch {
    sales_url: Option<String>,
    deal_url: Option<String>,
    sales_timeout_secs: Option<u64>,
    deal_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    cors_allow_any: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const MANAGED_VARS: &[&str] = &[
        "DEALDESK_BACKENDS_SALES_URL",
        "DEALDESK_BACKENDS_DEAL_URL",
        "DEALDESK_BACKENDS_SALES_TIMEOUT_SECS",
        "DEALDESK_BACKENDS_DEAL_TIMEOUT_SECS",
        "SALES_AGENT_API_URL",
        "DEAL_SERVER_URL",
        "DEALDESK_LOG_LEVEL",
        "DEALDESK_LOG_FORMAT",
        "TEST_DEAL_URL",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn load_default() -> Result<AppConfig, String> {
        AppConfig::load(LoadOptions::default()).map_err(|err| format!("config load failed: {err}"))
    }

    #[test]
    fn defaults_point_at_local_backends() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        let config = load_default()?;
        ensure(config.backends.sales_url == "http://127.0.0.1:8000", "sales default")?;
        ensure(config.backends.deal_url == "http://127.0.0.1:3000", "deal default")?;
        ensure(config.backends.sales_timeout_secs == 30, "sales timeout default is 30s")?;
        ensure(config.backends.deal_timeout_secs == 10, "deal timeout default is 10s")?;
        ensure(config.server.port == 8001, "server port default")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logging default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        env::set_var("TEST_DEAL_URL", "http://deals.internal:3000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("dealdesk.toml");
            fs::write(
                &path,
                r#"
[backends]
deal_url = "${TEST_DEAL_URL}/"
deal_timeout_secs = 5
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.backends.deal_url == "http://deals.internal:3000",
                "deal url should be interpolated and trimmed",
            )?;
            ensure(config.backends.deal_timeout_secs == 5, "file timeout should apply")?;
            Ok(())
        })();

        clear_vars(MANAGED_VARS);
        result
    }

    #[test]
    fn legacy_backend_env_names_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        env::set_var("SALES_AGENT_API_URL", "http://sales.example:8000");
        env::set_var("DEAL_SERVER_URL", "http://deal.example:3000");
        env::set_var("DEALDESK_BACKENDS_DEAL_URL", "https://deal.preferred");
        env::set_var("DEALDESK_LOG_LEVEL", "warn");
        env::set_var("DEALDESK_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = load_default()?;
            ensure(
                config.backends.sales_url == "http://sales.example:8000",
                "legacy sales url alias should apply",
            )?;
            ensure(
                config.backends.deal_url == "https://deal.preferred",
                "prefixed deal url should win over legacy alias",
            )?;
            ensure(config.logging.level == "warn", "log level alias should apply")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "json format alias")?;
            Ok(())
        })();

        clear_vars(MANAGED_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        env::set_var("DEALDESK_BACKENDS_SALES_URL", "http://from-env:8000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("dealdesk.toml");
            fs::write(
                &path,
                r#"
[backends]
sales_url = "http://from-file:8000"
deal_url = "http://from-file:3000"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    deal_url: Some("http://from-override:3000".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.backends.sales_url == "http://from-env:8000", "env should beat file")?;
            ensure(
                config.backends.deal_url == "http://from-override:3000",
                "override should beat file",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(MANAGED_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        env::set_var("DEALDESK_BACKENDS_SALES_URL", "sales.local:8000");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("backends.sales_url")
            );
            ensure(has_message, "validation failure should mention backends.sales_url")
        })();

        clear_vars(MANAGED_VARS);
        result
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { deal_timeout_secs: Some(0), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        });

        ensure(
            matches!(
                result,
                Err(ConfigError::Validation(ref message)) if message.contains("deal_timeout_secs")
            ),
            "zero deal timeout should fail validation",
        )
    }

    #[test]
    fn malformed_numeric_env_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        env::set_var("DEALDESK_BACKENDS_SALES_TIMEOUT_SECS", "thirty");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(MANAGED_VARS);

        ensure(
            matches!(
                result,
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "DEALDESK_BACKENDS_SALES_TIMEOUT_SECS"
            ),
            "invalid timeout env should name the variable",
        )
    }
}
