use std::sync::Arc;

use async_trait::async_trait;
use dealdesk_core::config::BackendsConfig;
use dealdesk_core::{ApplicationError, CustomerId};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::backend::{BackendError, BackendTools};
use crate::events::{collect_response, AgentEvent, ChatMessage};
use crate::intent::DealRequest;
use crate::resolution::{ConversationTurn, ResolutionPolicy};
use crate::result::ToolResult;
use crate::tools::{DealTools, ToolRegistry, GET_DEAL_BY_CUSTOMER_ID, QUERY_SALES_AGENT};

/// Events buffered between a running agent and the collector.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    /// Upstream asked callers to back off (HTTP 503).
    #[error("upstream overloaded: {0}")]
    Overloaded(String),
    #[error("agent runtime failure: {0}")]
    Runtime(String),
}

impl From<AgentError> for ApplicationError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::Overloaded(message) => ApplicationError::Overloaded(message),
            AgentError::Runtime(message) => ApplicationError::Integration(message),
        }
    }
}

/// Runs one request and reports progress as [`AgentEvent`]s. The final
/// answer is whatever the event stream yields under response extraction.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        request: DealRequest,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<(), AgentError>;
}

/// Runs `request` on `runtime` while concurrently collecting its events.
pub async fn answer(
    runtime: &dyn AgentRuntime,
    request: DealRequest,
) -> Result<String, AgentError> {
    let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (outcome, response) =
        tokio::join!(runtime.run(request, sender), collect_response(receiver));
    outcome?;
    Ok(response)
}

/// The deal agent: resolves the customer, then fetches and summarizes the
/// deal, using nothing but the two backend tools.
pub struct DealAgent {
    tools: Arc<dyn DealTools>,
    policy: ResolutionPolicy,
}

impl DealAgent {
    pub fn new(tools: Arc<dyn DealTools>) -> Self {
        Self { tools, policy: ResolutionPolicy }
    }

    pub fn from_config(config: &BackendsConfig) -> Result<Self, BackendError> {
        let backend = Arc::new(BackendTools::from_config(config)?);
        Ok(Self::new(Arc::new(ToolRegistry::with_backend(backend))))
    }

    /// Resolves `request` without emitting events.
    pub async fn resolve(&self, request: &DealRequest) -> Result<ConversationTurn, AgentError> {
        self.policy.run(self.tools.as_ref(), request).await
    }
}

#[async_trait]
impl AgentRuntime for DealAgent {
    fn name(&self) -> &str {
        "deal_agent"
    }

    async fn run(
        &self,
        request: DealRequest,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<(), AgentError> {
        info!(
            event_name = "agent.run.started",
            agent = self.name(),
            explicit_customer_id = request.customer_id.map(CustomerId::get),
            "agent run started"
        );

        let observed = ObservedTools { inner: self.tools.as_ref(), events: &events };
        let turn = self.policy.run(&observed, &request).await?;
        let answer = turn.answer().to_string();

        let mut extra = Map::new();
        extra.insert("state".to_string(), json!(turn.state));
        if let Some(customer_id) = turn.resolved_customer_id {
            extra.insert("customer_id".to_string(), json!(customer_id));
        }
        if !turn.disambiguation_candidates.is_empty() {
            extra.insert("candidates".to_string(), json!(turn.disambiguation_candidates));
        }
        let message = ChatMessage { extra, ..ChatMessage::assistant(answer.clone()) };

        send(&events, AgentEvent::Message(message)).await?;
        send(&events, AgentEvent::Response(Value::String(answer))).await
    }
}

async fn send(events: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<(), AgentError> {
    events
        .send(event)
        .await
        .map_err(|_| AgentError::Runtime("event receiver dropped before the answer".to_string()))
}

/// Reports every tool invocation on the event stream.
struct ObservedTools<'a> {
    inner: &'a dyn DealTools,
    events: &'a mpsc::Sender<AgentEvent>,
}

impl ObservedTools<'_> {
    async fn announce(&self, name: &str, input: Value) {
        let _ = self.events.send(AgentEvent::ToolCall { name: name.to_string(), input }).await;
    }

    async fn report(&self, name: &str, result: ToolResult) -> ToolResult {
        if let Some(failure) = result.failure() {
            warn!(
                event_name = "agent.tool.call_failed",
                tool = name,
                kind = failure.kind.as_str(),
                error = %failure.message,
                "tool call failed"
            );
        }
        let output = AgentEvent::ToolOutput { name: name.to_string(), output: result.to_json() };
        let _ = self.events.send(output).await;
        result
    }
}

#[async_trait]
impl DealTools for ObservedTools<'_> {
    async fn query_sales_agent(&self, query: &str) -> ToolResult {
        self.announce(QUERY_SALES_AGENT, json!({ "query": query })).await;
        let result = self.inner.query_sales_agent(query).await;
        self.report(QUERY_SALES_AGENT, result).await
    }

    async fn get_deal_by_customer_id(&self, customer_id: CustomerId) -> ToolResult {
        self.announce(GET_DEAL_BY_CUSTOMER_ID, json!({ "customer_id": customer_id })).await;
        let result = self.inner.get_deal_by_customer_id(customer_id).await;
        self.report(GET_DEAL_BY_CUSTOMER_ID, result).await
    }
}
