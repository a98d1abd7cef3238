//! Dealdesk MCP (Model Context Protocol) Server
//!
//! Exposes the two backend tools of the deal agent to external MCP clients
//! over stdio, so an outside agent framework can drive the same calls the
//! built-in resolution policy makes.
//!
//! ## Tools
//!
//! - `query_sales_agent` - ask the sales backend a free-text question
//! - `get_deal_by_customer_id` - fetch the deal document for a customer id
//!
//! Failed calls come back as tool errors whose text is the failure document,
//! never as protocol errors.
//!
//! ## Example Usage
//!
//! ```no_run
//! use dealdesk_core::config::{AppConfig, LoadOptions};
//! use dealdesk_mcp::DealDeskMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(LoadOptions::default())?;
//!     let server = DealDeskMcpServer::from_config(&config)?;
//!     server.run_stdio().await
//! }
//! ```

mod server;

pub use server::DealDeskMcpServer;

use dealdesk_agent::BackendError;
use dealdesk_core::config::ConfigError;
use thiserror::Error;

/// Errors raised while standing up the MCP server
#[derive(Error, Debug)]
pub enum McpError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("backend client construction failed: {0}")]
    Backend(#[from] BackendError),
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;
