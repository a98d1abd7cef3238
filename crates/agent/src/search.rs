//! Free-text passthrough to the sales backend.

use dealdesk_core::ApplicationError;
use serde_json::Value;
use tracing::info;

use crate::result::ToolResult;
use crate::tools::DealTools;

const ASSISTANT_PREFIX: &str = "assistant:";

/// Sends `text` verbatim to the sales backend and returns its answer text.
pub async fn search<T>(tools: &T, text: &str) -> Result<String, ApplicationError>
where
    T: DealTools + ?Sized,
{
    if text.trim().is_empty() {
        return Err(ApplicationError::InvalidInput("Search query cannot be empty".to_string()));
    }

    match tools.query_sales_agent(text).await {
        ToolResult::Success(payload) => {
            info!(event_name = "agent.search.completed", "search completed");
            Ok(answer_text(&payload))
        }
        ToolResult::Failure(failure) if failure.is_overloaded() => {
            Err(ApplicationError::Overloaded(failure.message))
        }
        ToolResult::Failure(failure) => Err(ApplicationError::Integration(failure.message)),
    }
}

fn answer_text(payload: &Value) -> String {
    let raw = match payload.get("response").unwrap_or(payload) {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    let trimmed = raw.trim();
    trimmed.strip_prefix(ASSISTANT_PREFIX).unwrap_or(trimmed).trim().to_string()
}
