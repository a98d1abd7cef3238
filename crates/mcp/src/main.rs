//! Dealdesk MCP Server Binary
//!
//! ## Usage
//!
//! ```bash
//! # Backends from dealdesk.toml or the defaults
//! dealdesk-mcp
//!
//! # Point at other backends
//! SALES_AGENT_API_URL=http://sales:8000 DEAL_SERVER_URL=http://deals:3000 dealdesk-mcp
//! ```

use anyhow::Result;
use dealdesk_core::config::{AppConfig, LoadOptions};
use dealdesk_mcp::DealDeskMcpServer;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;

    // stdout carries the protocol; logs go to stderr
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level)
        .init();

    DealDeskMcpServer::from_config(&config)?.run_stdio().await
}
