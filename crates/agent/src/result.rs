use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Category of a failed tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, DNS failure, or timeout.
    TransportError,
    /// The backend answered with a non-2xx status.
    HttpError,
    UnknownError,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransportError => "transport_error",
            Self::HttpError => "http_error",
            Self::UnknownError => "unknown_error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Set for `HttpError` failures.
    pub status: Option<u16>,
    /// Customer the failed call was about, kept as received for traceability.
    pub customer_id: Option<i64>,
}

impl ToolFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::TransportError,
            message: message.into(),
            status: None,
            customer_id: None,
        }
    }

    pub fn http(status: u16, body: &str) -> Self {
        Self {
            kind: FailureKind::HttpError,
            message: format!("HTTP {status}: {body}"),
            status: Some(status),
            customer_id: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::UnknownError,
            message: message.into(),
            status: None,
            customer_id: None,
        }
    }

    pub fn with_customer_id(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// The backend signalled it is overloaded rather than broken.
    pub fn is_overloaded(&self) -> bool {
        self.kind == FailureKind::HttpError && self.status == Some(503)
    }
}

/// Outcome of exactly one tool invocation. Tools never raise; every error
/// is folded into `Failure`.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Success(Value),
    Failure(ToolFailure),
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure(&self) -> Option<&ToolFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Normalized result document handed to agents: the payload itself on
    /// success, an error envelope on failure.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success(payload) => payload.clone(),
            Self::Failure(failure) => {
                let mut document = json!({
                    "status": "error",
                    "kind": failure.kind.as_str(),
                    "error": failure.message,
                });
                if let Some(status) = failure.status {
                    document["http_status"] = json!(status);
                }
                if let Some(customer_id) = failure.customer_id {
                    document["customer_id"] = json!(customer_id);
                }
                document
            }
        }
    }
}
