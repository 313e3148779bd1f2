//! Configuration values
//!
//! Every client and runner takes its configuration explicitly in its
//! constructor; nothing here is read from globals.

use std::time::Duration;

use crate::agent::AgentProfile;

/// Default sandbox wall-clock budget in seconds
pub const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 60;

/// Default per-stream output cap for sandboxed executions (100 KiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Which text-completion backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModelProvider {
    #[default]
    Ollama,
    Gemini,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::Ollama => "ollama",
            ModelProvider::Gemini => "gemini",
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            ModelProvider::Ollama => "qwen3",
            ModelProvider::Gemini => "gemini-2.5-flash",
        }
    }

    /// Base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ModelProvider::Ollama => "http://localhost:11434",
            ModelProvider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

/// Configuration for the text-completion client
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    /// Model name (e.g., "qwen3", "gemini-2.5-flash")
    pub model: String,
    pub base_url: String,
    /// Required for Gemini, ignored by Ollama
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::for_provider(ModelProvider::Ollama)
    }
}

impl ModelConfig {
    /// Defaults for the given provider
    pub fn for_provider(provider: ModelProvider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 8192,
            request_timeout_secs: 120,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration for the agent loop
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Persona whose system prompt heads every transcript
    pub profile: AgentProfile,
    /// Sampling temperature used for conversational replies
    pub temperature: f32,
    /// Sampling temperature used for single-shot tool selection
    pub selection_temperature: f32,
    /// Completion length cap for every model call
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            profile: AgentProfile::actor(),
            temperature: 0.1,
            selection_temperature: 0.0,
            max_tokens: 8192,
        }
    }
}

impl AgentConfig {
    /// Take sampling parameters from a model configuration
    pub fn from_model_config(profile: AgentProfile, model: &ModelConfig) -> Self {
        Self {
            profile,
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            ..Self::default()
        }
    }
}

/// Configuration for the sandboxed code runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Interpreter executable (looked up on PATH)
    pub interpreter: String,
    /// Arguments that make the interpreter read its program from stdin
    pub interpreter_args: Vec<String>,
    pub default_timeout_secs: u64,
    /// Cap applied separately to stdout and stderr
    pub max_output_bytes: usize,
    /// Ceiling on simultaneous executions; `None` means unbounded
    pub max_concurrent: Option<usize>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            interpreter_args: vec!["-".to_string()],
            default_timeout_secs: DEFAULT_SANDBOX_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrent: None,
        }
    }
}

impl SandboxConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

/// Configuration for the remote MCP tool host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpConfig {
    /// Streamable-HTTP endpoint (e.g., "http://localhost:8000/mcp")
    pub url: String,
    /// Timeout for each HTTP request in seconds
    pub timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/mcp".to_string(),
            timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_defaults_follow_provider() {
        let ollama = ModelConfig::default();
        assert_eq!(ollama.provider, ModelProvider::Ollama);
        assert_eq!(ollama.model, "qwen3");
        assert_eq!(ollama.base_url, "http://localhost:11434");

        let gemini = ModelConfig::for_provider(ModelProvider::Gemini);
        assert_eq!(gemini.model, "gemini-2.5-flash");
        assert!(gemini.base_url.starts_with("https://"));
        assert_eq!(gemini.max_tokens, 8192);
    }

    #[test]
    fn test_sandbox_config_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.interpreter_args, vec!["-"]);
        assert_eq!(config.default_timeout(), Duration::from_secs(60));
        assert!(config.max_concurrent.is_none());
    }

    #[test]
    fn test_agent_config_from_model_config() {
        let model = ModelConfig {
            temperature: 0.7,
            max_tokens: 256,
            ..ModelConfig::default()
        };
        let config = AgentConfig::from_model_config(AgentProfile::critic(), &model);
        assert_eq!(config.profile.name, "Critic");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.selection_temperature, 0.0);
    }
}
