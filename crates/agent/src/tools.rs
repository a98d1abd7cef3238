use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dealdesk_core::CustomerId;
use serde::Serialize;
use serde_json::{json, Value};

use crate::backend::BackendTools;
use crate::result::{ToolFailure, ToolResult};

pub const QUERY_SALES_AGENT: &str = "query_sales_agent";
pub const GET_DEAL_BY_CUSTOMER_ID: &str = "get_deal_by_customer_id";

/// A deterministic action an agent may take. Execution never fails: any
/// problem is reported as [`ToolResult::Failure`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value) -> ToolResult;
}

/// Typed view of the two tools, used by the resolution policy.
#[async_trait]
pub trait DealTools: Send + Sync {
    async fn query_sales_agent(&self, query: &str) -> ToolResult;
    async fn get_deal_by_customer_id(&self, customer_id: CustomerId) -> ToolResult;
}

#[async_trait]
impl DealTools for BackendTools {
    async fn query_sales_agent(&self, query: &str) -> ToolResult {
        BackendTools::query_sales_agent(self, query).await
    }

    async fn get_deal_by_customer_id(&self, customer_id: CustomerId) -> ToolResult {
        BackendTools::get_deal_by_customer_id(self, customer_id).await
    }
}

pub struct SalesQueryTool {
    backend: Arc<BackendTools>,
}

impl SalesQueryTool {
    pub fn new(backend: Arc<BackendTools>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for SalesQueryTool {
    fn name(&self) -> &'static str {
        QUERY_SALES_AGENT
    }

    fn description(&self) -> &'static str {
        "Ask the sales agent a natural-language question about customers, customer IDs, \
         discounts, or rebates (e.g. \"Get customer ID for CompanyABC\")."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Natural-language sales question"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        match input.get("query").and_then(Value::as_str) {
            Some(query) => self.backend.query_sales_agent(query).await,
            None => ToolResult::Failure(ToolFailure::unknown(
                "Error: `query` must be a non-empty string",
            )),
        }
    }
}

pub struct DealLookupTool {
    backend: Arc<BackendTools>,
}

impl DealLookupTool {
    pub fn new(backend: Arc<BackendTools>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for DealLookupTool {
    fn name(&self) -> &'static str {
        GET_DEAL_BY_CUSTOMER_ID
    }

    fn description(&self) -> &'static str {
        "Fetch the deal document (bidHead, bidAcct, ...) for a customer ID from the deal server."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "customer_id": {"type": "integer", "minimum": 1, "description": "Customer ID"}
            },
            "required": ["customer_id"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let raw = match input.get("customer_id").and_then(integer_value) {
            Some(raw) => raw,
            None => {
                return ToolResult::Failure(ToolFailure::unknown(
                    "Error: `customer_id` must be an integer",
                ))
            }
        };

        match CustomerId::new(raw) {
            Ok(customer_id) => self.backend.get_deal_by_customer_id(customer_id).await,
            Err(error) => ToolResult::Failure(
                ToolFailure::unknown(format!("Error: {error}")).with_customer_id(raw),
            ),
        }
    }
}

/// Accepts JSON integers and integer strings; agents send both.
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry holding exactly the two backend tools.
    pub fn with_backend(backend: Arc<BackendTools>) -> Self {
        let mut registry = Self::default();
        registry.register(SalesQueryTool::new(Arc::clone(&backend)));
        registry.register(DealLookupTool::new(backend));
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn describe(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name(),
                description: tool.description(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Runs the named tool. An unknown name is itself a failed call.
    pub async fn call(&self, name: &str, input: Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.execute(input).await,
            None => {
                ToolResult::Failure(ToolFailure::unknown(format!("Error: unknown tool `{name}`")))
            }
        }
    }
}

#[async_trait]
impl DealTools for ToolRegistry {
    async fn query_sales_agent(&self, query: &str) -> ToolResult {
        self.call(QUERY_SALES_AGENT, json!({ "query": query })).await
    }

    async fn get_deal_by_customer_id(&self, customer_id: CustomerId) -> ToolResult {
        let input = json!({ "customer_id": i64::from(customer_id) });
        self.call(GET_DEAL_BY_CUSTOMER_ID, input).await
    }
}
