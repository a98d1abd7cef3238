//! MCP Server Implementation

use std::sync::Arc;

use dealdesk_agent::{BackendTools, ToolRegistry, ToolResult};
use dealdesk_core::config::AppConfig;
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, ErrorData, Implementation, JsonObject,
        ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
        Tool,
    },
    service::RequestContext,
    RoleServer, ServerHandler, ServiceExt,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::McpResult;

const INSTRUCTIONS: &str = "Dealdesk exposes two tools. Use query_sales_agent to resolve a \
company name to a customer id, then get_deal_by_customer_id to fetch the deal. Never guess a \
customer id that no tool returned.";

/// MCP server fronting the backend tool registry
#[derive(Clone)]
pub struct DealDeskMcpServer {
    registry: Arc<ToolRegistry>,
}

impl DealDeskMcpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn from_config(config: &AppConfig) -> McpResult<Self> {
        let backend = BackendTools::from_config(&config.backends)?;
        let registry = ToolRegistry::with_backend(Arc::new(backend));
        info!(
            event_name = "mcp.server.initialized",
            sales_url = %config.backends.sales_url,
            deal_url = %config.backends.deal_url,
            tools = registry.len(),
            "dealdesk MCP server initialized"
        );
        Ok(Self::new(Arc::new(registry)))
    }

    /// Run the server with stdio transport
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!(event_name = "mcp.server.started", "starting MCP server with stdio transport");

        let service = self.serve(rmcp::transport::stdio()).await?;
        let _quit = service.waiting().await?;

        info!(event_name = "mcp.server.stopped", "MCP server shutdown complete");
        Ok(())
    }

    /// Registry tools rendered as MCP tool definitions.
    pub fn tools(&self) -> Vec<Tool> {
        self.registry
            .describe()
            .into_iter()
            .map(|descriptor| {
                let schema = match descriptor.input_schema {
                    Value::Object(schema) => schema,
                    _ => JsonObject::new(),
                };
                Tool::new(descriptor.name, descriptor.description, Arc::new(schema))
            })
            .collect()
    }

    /// Runs a registered tool. Only an unknown tool name is a protocol error.
    pub async fn run_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<ToolResult, ErrorData> {
        if !self.registry.contains(name) {
            return Err(ErrorData::invalid_params(format!("unknown tool: {name}"), None));
        }
        debug!(event_name = "mcp.tool.invoked", tool = name, "running tool");
        let input = Value::Object(arguments.unwrap_or_default());
        Ok(self.registry.call(name, input).await)
    }

    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self.run_tool(name, arguments).await?;
        let text = serde_json::to_string_pretty(&result.to_json())
            .map_err(|error| ErrorData::internal_error(error.to_string(), None))?;

        if let Some(failure) = result.failure() {
            warn!(
                event_name = "mcp.tool.failed",
                tool = name,
                kind = failure.kind.as_str(),
                "tool call failed"
            );
            return Ok(CallToolResult::error(vec![Content::text(text)]));
        }
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

impl ServerHandler for DealDeskMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult { tools: self.tools(), next_cursor: None })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.dispatch(&request.name, request.arguments).await
    }
}
