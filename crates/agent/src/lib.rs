//! Deal Agent - tool-mediated query resolution
//!
//! This crate turns a natural-language deal question into a short sequence
//! of deterministic HTTP calls against two backends:
//! - a sales service that resolves company names to customer ids
//! - a deal service that serves the deal document for a customer id
//!
//! # Architecture
//!
//! 1. **Intent** (`intent`) - pick the customer id or company name out of the request
//! 2. **Resolution** (`resolution`) - resolve, disambiguate, then fetch the deal
//! 3. **Tools** (`tools`, `backend`) - the only two actions an agent may take
//! 4. **Extraction** (`events`) - pull the final answer out of the event stream
//!
//! # Key Types
//!
//! - `AgentRuntime` - pluggable runner that emits `AgentEvent`s
//! - `DealAgent` - the built-in runtime driving `ResolutionPolicy`
//! - `ToolResult` - the normalized outcome of every tool call
//!
//! # Safety Principle
//!
//! Customer ids and deal fields only ever come from a tool's success
//! payload. Gaps become a clarifying question or a not-found answer.

pub mod backend;
pub mod events;
pub mod intent;
pub mod matches;
pub mod resolution;
pub mod result;
pub mod runtime;
pub mod search;
pub mod tools;

pub use backend::{BackendClient, BackendEndpoints, BackendError, BackendTools};
pub use events::{collect_response, extract_response, AgentEvent, ChatMessage};
pub use intent::DealRequest;
pub use resolution::{ConversationTurn, ResolutionPolicy, ResolutionState};
pub use result::{FailureKind, ToolFailure, ToolResult};
pub use runtime::{answer, AgentError, AgentRuntime, DealAgent};
pub use tools::{DealTools, ToolRegistry};
