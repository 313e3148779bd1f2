//! Tool hosting and execution
//!
//! A [`ToolHost`] publishes a catalog of [`ToolDescriptor`]s and invokes
//! tools by name. Two hosts are provided:
//!
//! - [`LocalToolHost`]: in-process handlers with schema-validated arguments
//! - [`McpToolHost`]: a remote MCP server over streamable HTTP
//!
//! [`ToolExecutor`] sits in front of either host and turns every call into a
//! [`ToolOutcome`], so callers never see a raised failure.

pub mod executor;
pub mod host;
pub mod local;
pub mod mcp;
pub mod python;
pub mod types;

pub use executor::{canonical_json, render_result, OutcomeKind, ToolExecutor, ToolOutcome};
pub use host::ToolHost;
pub use local::{LocalToolHost, ToolHandler};
pub use mcp::McpToolHost;
pub use python::{PythonInterpreterTool, PYTHON_TOOL_NAME};
pub use types::{catalog_contains, ContentItem, ToolCall, ToolDescriptor, ToolResult};
