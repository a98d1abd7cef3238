use std::env;
use std::fs;
use std::path::Path;

use dealdesk_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config, resolve_config_path(None).as_deref()),
        Err(error) => format!("config validation failed: {error}"),
    }
}

/// Renders every effective value with the layer it came from.
pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let fields = [
        Field {
            key_path: "backends.sales_url",
            env_keys: &["DEALDESK_BACKENDS_SALES_URL", "SALES_AGENT_API_URL"],
            value: config.backends.sales_url.clone(),
        },
        Field {
            key_path: "backends.deal_url",
            env_keys: &["DEALDESK_BACKENDS_DEAL_URL", "DEAL_SERVER_URL"],
            value: config.backends.deal_url.clone(),
        },
        Field {
            key_path: "backends.sales_timeout_secs",
            env_keys: &["DEALDESK_BACKENDS_SALES_TIMEOUT_SECS"],
            value: config.backends.sales_timeout_secs.to_string(),
        },
        Field {
            key_path: "backends.deal_timeout_secs",
            env_keys: &["DEALDESK_BACKENDS_DEAL_TIMEOUT_SECS"],
            value: config.backends.deal_timeout_secs.to_string(),
        },
        Field {
            key_path: "server.bind_address",
            env_keys: &["DEALDESK_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key_path: "server.port",
            env_keys: &["DEALDESK_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key_path: "server.cors_allow_any",
            env_keys: &["DEALDESK_SERVER_CORS_ALLOW_ANY"],
            value: config.server.cors_allow_any.to_string(),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["DEALDESK_LOGGING_LEVEL", "DEALDESK_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["DEALDESK_LOGGING_FORMAT", "DEALDESK_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path);
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
