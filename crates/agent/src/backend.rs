//! Outbound calls to the sales and deal backends.
//!
//! Every call is issued at most once with an explicit timeout. Transport,
//! status, and decoding problems are normalized into [`ToolResult`] so no
//! error ever escapes to the caller.

use std::time::Duration;

use dealdesk_core::config::BackendsConfig;
use dealdesk_core::CustomerId;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::result::{ToolFailure, ToolResult};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Error: {0}")]
    Unknown(String),
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl From<BackendError> for ToolFailure {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Transport(_) => ToolFailure::transport(error.to_string()),
            BackendError::Http { status, body } => ToolFailure::http(status, &body),
            BackendError::Unknown(_) | BackendError::ClientBuild(_) => {
                ToolFailure::unknown(error.to_string())
            }
        }
    }
}

fn classify(error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Transport(format!("timed out: {error}"))
    } else if error.is_connect() {
        BackendError::Transport(format!("connection failed: {error}"))
    } else if error.is_request() {
        BackendError::Transport(error.to_string())
    } else {
        BackendError::Unknown(error.to_string())
    }
}

/// Stateless HTTP adapter. Cloning shares the underlying connection pool.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
}

impl BackendClient {
    pub fn new() -> Result<Self, BackendError> {
        let http = Client::builder()
            .user_agent(concat!("dealdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BackendError::ClientBuild)?;
        Ok(Self { http })
    }

    /// Issues one request against a fully resolved `url`.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> ToolResult {
        if timeout.is_zero() {
            return ToolResult::Failure(ToolFailure::unknown(
                "Error: request timeout must be a positive duration",
            ));
        }

        debug!(
            event_name = "agent.backend.request",
            method = %method,
            url = %url,
            timeout_ms = timeout.as_millis() as u64,
            "calling backend"
        );

        match self.send(method.clone(), url, body, timeout).await {
            Ok(payload) => ToolResult::Success(payload),
            Err(error) => {
                warn!(
                    event_name = "agent.backend.call_failed",
                    method = %method,
                    url = %url,
                    error = %error,
                    "backend call failed"
                );
                ToolResult::Failure(error.into())
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, BackendError> {
        let mut request = self.http.request(method, url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http { status: status.as_u16(), body });
        }

        response.json::<Value>().await.map_err(|error| {
            if error.is_timeout() {
                BackendError::Transport(format!("timed out: {error}"))
            } else {
                BackendError::Unknown(format!("could not decode response body: {error}"))
            }
        })
    }
}

/// Base URLs and per-call timeouts for the two backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendEndpoints {
    pub sales_url: String,
    pub deal_url: String,
    pub sales_timeout: Duration,
    pub deal_timeout: Duration,
}

impl From<&BackendsConfig> for BackendEndpoints {
    fn from(config: &BackendsConfig) -> Self {
        Self {
            sales_url: config.sales_url.clone(),
            deal_url: config.deal_url.clone(),
            sales_timeout: config.sales_timeout(),
            deal_timeout: config.deal_timeout(),
        }
    }
}

impl BackendEndpoints {
    pub fn sales_query_url(&self) -> String {
        format!("{}/query", self.sales_url)
    }

    pub fn deal_url_for(&self, customer_id: i64) -> String {
        format!("{}/api/getdeal/customer/{customer_id}", self.deal_url)
    }
}

/// The two typed backend operations the agent is allowed to perform.
#[derive(Clone, Debug)]
pub struct BackendTools {
    client: BackendClient,
    endpoints: BackendEndpoints,
}

impl BackendTools {
    pub fn new(client: BackendClient, endpoints: BackendEndpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn from_config(config: &BackendsConfig) -> Result<Self, BackendError> {
        Ok(Self::new(BackendClient::new()?, BackendEndpoints::from(config)))
    }

    pub fn endpoints(&self) -> &BackendEndpoints {
        &self.endpoints
    }

    /// Sends a natural-language question to the sales backend.
    pub async fn query_sales_agent(&self, query: &str) -> ToolResult {
        if query.trim().is_empty() {
            return ToolResult::Failure(ToolFailure::unknown("Error: query must not be empty"));
        }

        let body = json!({ "query": query });
        let url = self.endpoints.sales_query_url();
        let result =
            self.client.call(Method::POST, &url, Some(&body), self.endpoints.sales_timeout).await;
        reject_error_envelope(result)
    }

    /// Fetches the deal document for one customer.
    pub async fn get_deal_by_customer_id(&self, customer_id: CustomerId) -> ToolResult {
        let raw_id = i64::from(customer_id);
        let url = self.endpoints.deal_url_for(raw_id);
        let result = self.client.call(Method::GET, &url, None, self.endpoints.deal_timeout).await;

        match reject_error_envelope(result) {
            ToolResult::Failure(failure) => ToolResult::Failure(failure.with_customer_id(raw_id)),
            success => success,
        }
    }

    /// Whether the backend answers HTTP at all. Any status counts.
    pub async fn probe(&self, base_url: &str, timeout: Duration) -> Result<u16, BackendError> {
        let response =
            self.client.http.get(base_url).timeout(timeout).send().await.map_err(classify)?;
        Ok(response.status().as_u16())
    }
}

/// A 2xx body shaped `{"status": "error", ...}` is still a failure.
fn reject_error_envelope(result: ToolResult) -> ToolResult {
    let payload = match result {
        ToolResult::Success(payload) => payload,
        failure => return failure,
    };

    if payload.get("status").and_then(Value::as_str) != Some("error") {
        return ToolResult::Success(payload);
    }

    let detail = ["error", "response", "message"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .unwrap_or("backend reported an error");
    ToolResult::Failure(ToolFailure::unknown(format!("Error: {detail}")))
}
