use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use dealdesk_agent::BackendTools;
use serde::Serialize;
use tracing::warn;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct HealthState {
    backend: Arc<BackendTools>,
    probe_timeout: Duration,
}

impl HealthState {
    pub fn new(backend: Arc<BackendTools>) -> Self {
        Self { backend, probe_timeout: PROBE_TIMEOUT }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub sales_backend: HealthCheck,
    pub deal_backend: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let endpoints = state.backend.endpoints();
    let (sales_backend, deal_backend) = tokio::join!(
        backend_check(&state, "sales", &endpoints.sales_url),
        backend_check(&state, "deal", &endpoints.deal_url),
    );
    let ready = sales_backend.status == "ready" && deal_backend.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "dealdesk-server runtime initialized".to_string(),
        },
        sales_backend,
        deal_backend,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// Any HTTP answer counts as reachable; only transport failures degrade.
async fn backend_check(state: &HealthState, name: &'static str, base_url: &str) -> HealthCheck {
    match state.backend.probe(base_url, state.probe_timeout).await {
        Ok(status) => HealthCheck {
            status: "ready",
            detail: format!("{name} backend at {base_url} answered HTTP {status}"),
        },
        Err(error) => {
            warn!(
                event_name = "server.health.backend_unreachable",
                backend = name,
                base_url = %base_url,
                error = %error,
                "backend probe failed"
            );
            HealthCheck {
                status: "degraded",
                detail: format!("{name} backend at {base_url} unreachable: {error}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
    use dealdesk_agent::{BackendClient, BackendEndpoints, BackendTools};

    use crate::health::{health, HealthState};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }

    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        drop(listener);
        format!("http://{address}")
    }

    fn state(sales_url: String, deal_url: String) -> State<HealthState> {
        let backend = BackendTools::new(
            BackendClient::new().expect("client"),
            BackendEndpoints {
                sales_url,
                deal_url,
                sales_timeout: Duration::from_secs(5),
                deal_timeout: Duration::from_secs(5),
            },
        );
        State(HealthState { backend: Arc::new(backend), probe_timeout: Duration::from_secs(2) })
    }

    #[tokio::test]
    async fn health_returns_ready_when_both_backends_answer() {
        // The deal backend has no root route; a 404 still proves it is up.
        let sales = serve(Router::new().route("/", get(|| async { "sales up" }))).await;
        let deal = serve(Router::new()).await;

        let (status, Json(payload)) = health(state(sales, deal)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.sales_backend.status, "ready");
        assert!(payload.deal_backend.detail.contains("HTTP 404"));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_a_backend_is_down() {
        let sales = serve(Router::new().route("/", get(|| async { "sales up" }))).await;

        let (status, Json(payload)) = health(state(sales, closed_port_url().await)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.sales_backend.status, "ready");
        assert_eq!(payload.deal_backend.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
