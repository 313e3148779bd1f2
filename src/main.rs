//! Toolpilot command-line interface
//!
//! ```sh
//! # Show the tool catalog (built-in python_interpreter unless --mcp-url is set)
//! toolpilot list-tools
//!
//! # Conversation mode, persisting the transcript
//! toolpilot ask "What is 2**100? Use python." --session new
//!
//! # Routed mode against a remote MCP server
//! toolpilot --mcp-url http://localhost:8000/mcp select "latest rust release"
//!
//! # Run code directly in the sandbox
//! echo 'print("hi")' | toolpilot run-code - --timeout 5
//! ```

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;

use toolpilot::agent::{AgentProfile, Session, SessionStore};
use toolpilot::config::DEFAULT_SANDBOX_TIMEOUT_SECS;
use toolpilot::{
    AgentConfig, AgentLoop, LocalToolHost, McpConfig, McpToolHost, ModelConfig, ModelProvider,
    PythonInterpreterTool, SandboxConfig, SandboxedCodeRunner, ToolHost,
};

/// Let a language model pick and run one tool per request.
#[derive(Parser)]
#[command(name = "toolpilot", version)]
struct Cli {
    // ── Model ──────────────────────────────────────────────────
    /// Completion backend
    #[arg(long, value_enum, env = "TOOLPILOT_PROVIDER", default_value_t = ModelProvider::Ollama)]
    provider: ModelProvider,

    /// Model name (defaults per provider: qwen3 / gemini-2.5-flash)
    #[arg(long, env = "TOOLPILOT_MODEL")]
    model: Option<String>,

    /// Base URL of the completion backend
    #[arg(long, env = "TOOLPILOT_MODEL_URL")]
    model_url: Option<String>,

    /// Ollama base URL; only consulted for the Ollama provider
    #[arg(long, env = "OLLAMA_URL", hide = true)]
    ollama_url: Option<String>,

    /// API key (Gemini only)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Sampling temperature for conversational replies
    #[arg(long, default_value_t = 0.1)]
    temperature: f32,

    /// Maximum tokens per completion
    #[arg(long, default_value_t = 8192)]
    max_tokens: u32,

    /// Agent persona
    #[arg(long, value_enum, default_value_t = ProfileKind::Actor)]
    profile: ProfileKind,

    // ── Tools ──────────────────────────────────────────────────
    /// Remote MCP endpoint; the built-in local tools are used when absent
    #[arg(long, env = "TOOLPILOT_MCP_URL")]
    mcp_url: Option<String>,

    /// Per-request timeout for the MCP endpoint, in seconds
    #[arg(long, default_value_t = 10)]
    mcp_timeout: u64,

    /// Default sandbox budget, in seconds
    #[arg(long, default_value_t = DEFAULT_SANDBOX_TIMEOUT_SECS)]
    sandbox_timeout: u64,

    /// Maximum simultaneous sandbox executions (unbounded when absent)
    #[arg(long)]
    max_concurrent: Option<usize>,

    // ── Observability ──────────────────────────────────────────
    /// OTLP gRPC endpoint for trace export (e.g., http://localhost:4317)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tool catalog
    ListTools,

    /// Ask in conversation mode
    Ask {
        query: String,

        /// Resume a saved session by id, or `new` to start one
        #[arg(long)]
        session: Option<String>,

        /// JSON object shown to the model as request context
        #[arg(long)]
        context: Option<String>,
    },

    /// Pick and run one tool for a query (routed mode)
    Select { query: String },

    /// Execute Python code in the sandbox; `-` reads the code from stdin
    RunCode {
        code: String,

        /// Budget in seconds (defaults to --sandbox-timeout)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List saved sessions
    Sessions,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileKind {
    Actor,
    Critic,
    Search,
}

impl ProfileKind {
    fn profile(self) -> AgentProfile {
        match self {
            ProfileKind::Actor => AgentProfile::actor(),
            ProfileKind::Critic => AgentProfile::critic(),
            ProfileKind::Search => AgentProfile::search(),
        }
    }
}

impl Cli {
    fn model_config(&self) -> ModelConfig {
        let mut config = ModelConfig::for_provider(self.provider);
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        let url = match self.provider {
            ModelProvider::Ollama => self.model_url.as_ref().or(self.ollama_url.as_ref()),
            ModelProvider::Gemini => self.model_url.as_ref(),
        };
        if let Some(url) = url {
            config.base_url = url.clone();
        }
        config.api_key = self.api_key.clone();
        config.temperature = self.temperature;
        config.max_tokens = self.max_tokens;
        config
    }

    fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            default_timeout_secs: self.sandbox_timeout,
            max_concurrent: self.max_concurrent,
            ..SandboxConfig::default()
        }
    }

    fn tool_host(&self, runner: Arc<SandboxedCodeRunner>) -> Result<Arc<dyn ToolHost>> {
        let host: Arc<dyn ToolHost> = match &self.mcp_url {
            Some(url) => Arc::new(McpToolHost::new(McpConfig {
                url: url.clone(),
                timeout_secs: self.mcp_timeout,
            })?),
            None => Arc::new(LocalToolHost::new().with_tool(PythonInterpreterTool::new(runner))?),
        };
        Ok(host)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    toolpilot::tracing::init_tracing("toolpilot", cli.otlp_endpoint.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))?;

    let result = run(&cli).await;

    if cli.print_metrics {
        eprintln!("{}", toolpilot::metrics::encode_text());
    }
    toolpilot::tracing::shutdown_tracing();

    match result? {
        0 => Ok(()),
        code => std::process::exit(code),
    }
}

/// Runs the command, returning the process exit code
async fn run(cli: &Cli) -> Result<i32> {
    let runner = Arc::new(SandboxedCodeRunner::new(cli.sandbox_config()));

    match &cli.command {
        Command::ListTools => {
            let host = cli.tool_host(runner)?;
            let catalog = host.list_tools().await.context("failed to list tools")?;
            for tool in catalog {
                println!("{}: {}", tool.name, tool.description);
                println!("  {}", tool.input_schema);
            }
        }

        Command::Ask {
            query,
            session,
            context,
        } => {
            let context: Option<Value> = context
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("--context must be valid JSON")?;

            let model_config = cli.model_config();
            let model = toolpilot::model::build_client(&model_config)?;
            let profile = cli.profile.profile();
            let config = AgentConfig::from_model_config(profile.clone(), &model_config);
            let mut agent = AgentLoop::new(Arc::clone(&model), cli.tool_host(runner)?, config);

            let store_and_session = match session.as_deref() {
                None => None,
                Some(id) => {
                    let store = SessionStore::default_store()?;
                    let session = if id == "new" {
                        Session::new(&profile.name, model.model())
                    } else {
                        store.load(id)?
                    };
                    agent = agent.with_conversation(session.conversation());
                    Some((store, session))
                }
            };

            let outcome = agent.run_turn(query, context.as_ref()).await;
            info!(trace_id = %outcome.trace_id, path = ?outcome.path, "Answered");
            println!("{}", outcome.text);

            if let Some((store, mut session)) = store_and_session {
                session.record(agent.conversation());
                store.save(&session)?;
                eprintln!("session: {}", session.id);
            }
        }

        Command::Select { query } => {
            let model_config = cli.model_config();
            let model = toolpilot::model::build_client(&model_config)?;
            let config = AgentConfig::from_model_config(cli.profile.profile(), &model_config);
            let mut agent = AgentLoop::new(model, cli.tool_host(runner)?, config);
            println!("{}", agent.route_message(query).await);
        }

        Command::RunCode { code, timeout } => {
            let code = if code == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read code from stdin")?;
                buf
            } else {
                code.clone()
            };
            let budget = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| runner.default_timeout());
            if budget.is_zero() {
                bail!("--timeout must be at least 1 second");
            }

            let result = runner.run(&code, budget).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.succeeded() {
                return Ok(result.returncode.clamp(1, 255));
            }
        }

        Command::Sessions => {
            let store = SessionStore::default_store()?;
            for summary in store.list()? {
                println!(
                    "{}  {}  {:>3} turns  [{}] {}",
                    summary.id, summary.created_at, summary.turns, summary.profile, summary.preview
                );
            }
        }
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("toolpilot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_ollama_url_ignored_for_gemini() {
        let cli = parse(&[
            "--provider",
            "gemini",
            "--ollama-url",
            "http://localhost:11434",
            "ask",
            "q",
        ]);
        let config = cli.model_config();
        assert_eq!(config.base_url, ModelProvider::Gemini.default_base_url());
    }

    #[test]
    fn test_ollama_url_applies_to_ollama() {
        let cli = parse(&["--ollama-url", "http://gpu-box:11434", "ask", "q"]);
        assert_eq!(cli.model_config().base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_model_url_wins_for_any_provider() {
        let cli = parse(&[
            "--provider",
            "gemini",
            "--model-url",
            "https://proxy.internal",
            "--ollama-url",
            "http://localhost:11434",
            "select",
            "q",
        ]);
        assert_eq!(cli.model_config().base_url, "https://proxy.internal");

        let cli = parse(&[
            "--model-url",
            "http://a:1",
            "--ollama-url",
            "http://b:2",
            "list-tools",
        ]);
        assert_eq!(cli.model_config().base_url, "http://a:1");
    }

    /// A failing script's status comes back from `run` instead of exiting
    /// the process, so shutdown still happens in `main`
    #[tokio::test]
    async fn test_run_code_returns_exit_status() {
        let has_python = std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !has_python {
            return;
        }

        let cli = parse(&["run-code", "import sys; sys.exit(3)"]);
        assert_eq!(run(&cli).await.unwrap(), 3);

        let cli = parse(&["run-code", "print('ok')"]);
        assert_eq!(run(&cli).await.unwrap(), 0);
    }
}
