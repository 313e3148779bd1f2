//! The tool-hosting boundary

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::types::{ToolDescriptor, ToolResult};
use crate::error::ToolHostError;

/// A catalog of named capabilities that can be listed and invoked
///
/// Implementations acquire whatever connection they need per operation and
/// release it before returning, on success and failure alike.
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// Fetch the current catalog
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolHostError>;

    /// Invoke `name` with `arguments`
    ///
    /// `Err` means the call could not be made (transport, unknown tool,
    /// rejected arguments). A tool that ran and failed returns
    /// `Ok(ToolResult { is_error: true, .. })`.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ToolHostError>;
}
