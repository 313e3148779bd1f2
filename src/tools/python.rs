//! `python_interpreter` tool backed by the sandboxed runner

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::local::ToolHandler;
use super::types::{ToolDescriptor, ToolResult};
use crate::error::ToolHostError;
use crate::sandbox::SandboxedCodeRunner;

pub const PYTHON_TOOL_NAME: &str = "python_interpreter";

/// Executes Python code in a short-lived child interpreter
///
/// The structured result is `{stdout, stderr, returncode}`. A non-zero
/// returncode is still a successful tool call: the caller decides what a
/// failing script means.
#[derive(Debug, Clone)]
pub struct PythonInterpreterTool {
    runner: Arc<SandboxedCodeRunner>,
}

impl PythonInterpreterTool {
    pub fn new(runner: Arc<SandboxedCodeRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ToolHandler for PythonInterpreterTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            PYTHON_TOOL_NAME,
            "Execute Python code and return its stdout, stderr and return code. \
             Print anything you want to see in the result.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Python source to execute"
                    },
                    "timeout": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Wall-clock limit in seconds",
                        "default": self.runner.default_timeout().as_secs()
                    }
                },
                "required": ["code"]
            }),
        )
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolHostError> {
        // Shape is guaranteed by schema validation in the host
        let code = arguments.get("code").and_then(Value::as_str).unwrap_or_default();
        let timeout =
            requested_timeout(&arguments)?.unwrap_or_else(|| self.runner.default_timeout());

        let result = self.runner.run(code, timeout).await;
        let value = serde_json::to_value(&result).map_err(|e| ToolHostError::Execution {
            tool: PYTHON_TOOL_NAME.to_string(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::structured(value))
    }
}

/// The `timeout` argument, if present
///
/// Models often write integral budgets as `5.0`, which the schema accepts as
/// an integer, so any finite positive number is honored.
fn requested_timeout(arguments: &Map<String, Value>) -> Result<Option<Duration>, ToolHostError> {
    let Some(value) = arguments.get("timeout") else {
        return Ok(None);
    };
    value
        .as_f64()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .map(Some)
        .ok_or_else(|| ToolHostError::InvalidArguments {
            tool: PYTHON_TOOL_NAME.to_string(),
            reason: format!("timeout must be a positive number of seconds, got {}", value),
        })
}
