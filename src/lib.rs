//! Toolpilot - single-shot tool-selecting agent with a sandboxed code interpreter
//!
//! This library lets a language model pick one tool out of a remotely (or
//! locally) hosted catalog, runs it, and folds the result back into a running
//! conversation. Model output is treated as untrusted text throughout.
//!
//! # Modules
//!
//! - `agent` - conversation state, decision parsing, tool selection, the agent loop
//! - `model` - text-completion clients (Ollama, Gemini)
//! - `tools` - tool descriptors/results, tool hosts (in-process and MCP over HTTP), executor
//! - `sandbox` - isolated child-process code execution with a wall-clock budget
//! - `config` - explicit configuration values passed into constructors
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - tracing subscriber and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use toolpilot::{AgentConfig, AgentLoop, LocalToolHost, ModelConfig, SandboxConfig};
//! use toolpilot::{PythonInterpreterTool, SandboxedCodeRunner};
//!
//! let runner = Arc::new(SandboxedCodeRunner::new(SandboxConfig::default()));
//! let host = LocalToolHost::new().with_tool(PythonInterpreterTool::new(runner))?;
//! let model = toolpilot::model::build_client(&ModelConfig::default())?;
//!
//! let mut agent = AgentLoop::new(model, Arc::new(host), AgentConfig::default());
//! let reply = agent.process_message("What is 2**100?", None).await;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod sandbox;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentLoop, AgentProfile, ConversationState, LoopState, Role, ToolSelector, TurnOutcome};
pub use config::{AgentConfig, McpConfig, ModelConfig, ModelProvider, SandboxConfig};
pub use error::{ModelError, SessionError, ToolHostError};
pub use model::ModelClient;
pub use sandbox::{SandboxExecutionResult, SandboxedCodeRunner};
pub use tools::{
    LocalToolHost, McpToolHost, PythonInterpreterTool, ToolCall, ToolDescriptor, ToolExecutor,
    ToolHandler, ToolHost, ToolOutcome, ToolResult,
};
