//! Events emitted while a request runs, and extraction of the final answer.
//!
//! Every variant has exactly one extraction rule. A failed extraction is
//! logged and skipped; the last event that yields a candidate wins.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

pub const NO_RESPONSE_GENERATED: &str = "No response generated";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Some("assistant".to_string()),
            content: Some(Value::String(content.into())),
            extra: Map::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    Response(Value),
    Text(String),
    Content(Value),
    Message(ChatMessage),
    ToolCall { name: String, input: Value },
    ToolOutput { name: String, output: Value },
    Other(Value),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("event field `{0}` is empty")]
    Empty(&'static str),
    #[error("event carries no answer")]
    NoCandidate,
    #[error("could not render message: {0}")]
    Render(#[from] serde_json::Error),
}

impl AgentEvent {
    /// Classifies a raw event object by the first non-empty field among
    /// `response`, `text`, `content` and `message`.
    pub fn from_value(value: Value) -> Self {
        let mut object = match value {
            Value::Object(object) => object,
            other => return Self::Other(other),
        };

        if let Some(response) = take_present(&mut object, "response") {
            return Self::Response(response);
        }
        if let Some(text) = take_present(&mut object, "text") {
            return match text {
                Value::String(text) => Self::Text(text),
                other => Self::Content(other),
            };
        }
        if let Some(content) = take_present(&mut object, "content") {
            return Self::Content(content);
        }
        if let Some(message) = take_present(&mut object, "message") {
            return match message {
                Value::String(text) => Self::Message(ChatMessage::assistant(text)),
                other => match serde_json::from_value::<ChatMessage>(other.clone()) {
                    Ok(message) => Self::Message(message),
                    Err(_) => Self::Other(other),
                },
            };
        }
        Self::Other(Value::Object(object))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Response(_) => "response",
            Self::Text(_) => "text",
            Self::Content(_) => "content",
            Self::Message(_) => "message",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolOutput { .. } => "tool_output",
            Self::Other(_) => "other",
        }
    }

    /// The answer text this event would contribute.
    pub fn candidate(&self) -> Result<String, ExtractionError> {
        match self {
            Self::Response(value) => render(value).ok_or(ExtractionError::Empty("response")),
            Self::Text(text) if text.trim().is_empty() => Err(ExtractionError::Empty("text")),
            Self::Text(text) => Ok(text.clone()),
            Self::Content(value) => render(value).ok_or(ExtractionError::Empty("content")),
            Self::Message(message) => match message.content.as_ref().and_then(render) {
                Some(content) => Ok(content),
                None => Ok(serde_json::to_string(message)?),
            },
            Self::ToolCall { .. } | Self::ToolOutput { .. } | Self::Other(_) => {
                Err(ExtractionError::NoCandidate)
            }
        }
    }
}

/// Removes `key`, keeping it only when it would render to an answer.
fn take_present(object: &mut Map<String, Value>, key: &str) -> Option<Value> {
    object.remove(key).filter(|value| render(value).is_some())
}

/// Strings verbatim, structured values as JSON text. Empty values render
/// to nothing.
fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(object) if object.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Last-write-wins accumulator over an event stream.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    latest: Option<String>,
    seen: usize,
}

impl ResponseCollector {
    pub fn push(&mut self, event: &AgentEvent) {
        self.seen += 1;
        match event.candidate() {
            Ok(candidate) => self.latest = Some(candidate),
            Err(error) => debug!(
                event_name = "agent.events.extraction_skipped",
                event_index = self.seen,
                event_kind = event.kind(),
                error = %error,
                "event skipped during response extraction"
            ),
        }
    }

    pub fn finish(self) -> String {
        self.latest.unwrap_or_else(|| NO_RESPONSE_GENERATED.to_string())
    }
}

pub fn extract_response<I>(events: I) -> String
where
    I: IntoIterator<Item = AgentEvent>,
{
    let mut collector = ResponseCollector::default();
    for event in events {
        collector.push(&event);
    }
    collector.finish()
}

/// Drains `events` until every sender is dropped.
pub async fn collect_response(mut events: mpsc::Receiver<AgentEvent>) -> String {
    let mut collector = ResponseCollector::default();
    while let Some(event) = events.recv().await {
        collector.push(&event);
    }
    collector.finish()
}
