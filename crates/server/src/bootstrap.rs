use std::sync::Arc;

use axum::Router;
use dealdesk_agent::{BackendError, BackendTools, DealAgent, ToolRegistry};
use dealdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::api::{self, ApiState};
use crate::health::{self, HealthState};

pub struct Application {
    pub config: AppConfig,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("backend client construction failed: {0}")]
    Backend(#[source] BackendError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

/// Builds the agent and the routes around it. The agent exists before the
/// first request is accepted or the process does not start.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        sales_url = %config.backends.sales_url,
        deal_url = %config.backends.deal_url,
        "starting application bootstrap"
    );

    let backend =
        Arc::new(BackendTools::from_config(&config.backends).map_err(BootstrapError::Backend)?);
    let registry = Arc::new(ToolRegistry::with_backend(Arc::clone(&backend)));
    let agent = Arc::new(DealAgent::new(registry.clone()));
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        tools = registry.len(),
        "deal agent constructed"
    );

    let mut router = api::router(ApiState::new(agent, registry))
        .merge(health::router(HealthState::new(backend)));
    if config.server.cors_allow_any {
        router = router.layer(CorsLayer::permissive());
    }

    Ok(Application { config, router })
}

#[cfg(test)]
mod tests {
    use dealdesk_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[test]
    fn bootstrap_fails_fast_on_invalid_backend_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                sales_url: Some("ftp://sales.internal".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("backends.sales_url"));
    }

    #[test]
    fn bootstrap_builds_agent_with_valid_overrides() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                sales_url: Some("http://127.0.0.1:18000/".to_string()),
                deal_url: Some("http://127.0.0.1:13000".to_string()),
                port: Some(18001),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.config.backends.sales_url, "http://127.0.0.1:18000");
        assert_eq!(app.config.server.port, 18001);
    }
}
