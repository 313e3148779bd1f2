//! Error types for model, tool host and session operations
//!
//! None of these ever cross the [`AgentLoop`](crate::agent::AgentLoop)
//! boundary: the loop converts every failure into response text.

use thiserror::Error;

/// Failure talking to a text-completion endpoint
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),
}

/// Failure listing or calling tools on a tool host
#[derive(Debug, Error)]
pub enum ToolHostError {
    /// Host unreachable, HTTP failure, timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Host answered, but not with something we understand
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("cannot register tool '{tool}': {reason}")]
    Registration { tool: String, reason: String },

    #[error("tool '{tool}' failed: {reason}")]
    Execution { tool: String, reason: String },
}

impl From<reqwest::Error> for ToolHostError {
    fn from(e: reqwest::Error) -> Self {
        ToolHostError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ToolHostError {
    fn from(e: serde_json::Error) -> Self {
        ToolHostError::Protocol(e.to_string())
    }
}

/// Failure persisting or loading a saved session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid session id: {0:?}")]
    InvalidId(String),
}
