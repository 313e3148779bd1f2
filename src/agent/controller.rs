//! Agent loop - per-request orchestration of model, selector and tools
//!
//! Two operating modes share one conversation:
//!
//! - **Conversation** ([`AgentLoop::process_message`]): the rendered
//!   transcript goes to the model; if the reply is a JSON tool request the
//!   tool runs and its result is folded back into the transcript.
//! - **Routed** ([`AgentLoop::route_message`]): a [`ToolSelector`] round
//!   trip picks one tool for the query, which runs and whose result is the
//!   answer.
//!
//! Both modes return text for every input; failures become part of the text.

use std::fmt::Display;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::conversation::{ConversationState, ConversationSummary, Role};
use super::decision::{classify_reply, ReplyKind};
use super::profile::AgentProfile;
use super::selector::ToolSelector;
use crate::config::AgentConfig;
use crate::metrics::AGENT_REQUESTS;
use crate::model::{complete_instrumented, CompletionRequest, ModelClient};
use crate::tools::{OutcomeKind, ToolCall, ToolDescriptor, ToolExecutor, ToolHost, ToolOutcome};

/// Reply in routed mode when the catalog is empty
pub const NO_TOOLS_MESSAGE: &str =
    "I'm sorry, but no tools are currently available to handle your request.";

/// Reply in routed mode when the selector makes no decision
pub const NO_SUITABLE_TOOL_MESSAGE: &str =
    "I'm sorry, I couldn't find a suitable tool to handle your request.";

/// Synthetic user turn recorded when a tool request cannot be honored
const TOOL_RESULT_ERROR: &str = "Tool result error";

/// Where the loop is within one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    ModelResponding,
    ParsingResponse,
    ExecutingTool,
    FoldingResult,
    Done,
}

/// How a request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPath {
    /// Model answered in prose, no tool involved
    Answered,
    /// A tool ran and its result was folded in
    ToolResult,
    /// A tool request failed to parse or the tool failed
    ToolError,
    /// Routed mode with an empty catalog
    NoTools,
    /// Routed mode where the selector made no decision
    NoSuitableTool,
    /// Catalog or model unreachable
    Degraded,
}

impl TurnPath {
    fn label(&self) -> &'static str {
        match self {
            TurnPath::Answered => "answered",
            TurnPath::ToolResult => "tool_result",
            TurnPath::ToolError => "tool_error",
            TurnPath::NoTools | TurnPath::NoSuitableTool => "no_tool",
            TurnPath::Degraded => "degraded",
        }
    }
}

/// Everything observable about one request
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text returned to the caller
    pub text: String,
    pub path: TurnPath,
    /// Decision that was executed, if any
    pub tool_call: Option<ToolCall>,
    pub tool_outcome: Option<ToolOutcome>,
    pub trace_id: String,
    /// States visited, in order
    pub states: Vec<LoopState>,
}

/// Drives one conversation
///
/// Not meant to be shared between concurrent callers: every request mutates
/// the conversation, hence `&mut self`.
pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    host: Arc<dyn ToolHost>,
    executor: ToolExecutor,
    selector: ToolSelector,
    config: AgentConfig,
    conversation: ConversationState,
    state: LoopState,
}

impl AgentLoop {
    /// Create a loop with an empty conversation
    ///
    /// # Arguments
    /// * `model` - Completion client used for replies and tool selection
    /// * `host` - Tool host providing the catalog and executing calls
    /// * `config` - Persona and sampling parameters
    pub fn new(model: Arc<dyn ModelClient>, host: Arc<dyn ToolHost>, config: AgentConfig) -> Self {
        let selector = ToolSelector::new(
            Arc::clone(&model),
            config.selection_temperature,
            config.max_tokens,
        );
        Self {
            executor: ToolExecutor::new(Arc::clone(&host)),
            model,
            host,
            selector,
            config,
            conversation: ConversationState::new(),
            state: LoopState::AwaitingInput,
        }
    }

    /// Continue an existing conversation (e.g. a saved session)
    pub fn with_conversation(mut self, conversation: ConversationState) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn clear_conversation(&mut self) {
        self.conversation.clear();
        self.state = LoopState::AwaitingInput;
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.config.profile
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn summary(&self) -> ConversationSummary {
        self.conversation
            .summary(&self.config.profile.name, self.model.model())
    }

    /// Conversation mode; returns only the text
    pub async fn process_message(&mut self, query: &str, context: Option<&Value>) -> String {
        self.run_turn(query, context).await.text
    }

    /// Routed mode; returns only the text
    pub async fn route_message(&mut self, query: &str) -> String {
        self.run_routed_turn(query).await.text
    }

    /// Conversation mode
    ///
    /// The query and the raw model reply are always appended. A reply that
    /// is a tool request adds one more user turn carrying the tool result
    /// (or an error marker), and the returned text is the reply followed by
    /// `"\nTool result: ..."`. `context`, when given, is shown to the model
    /// for this request only.
    pub async fn run_turn(&mut self, query: &str, context: Option<&Value>) -> TurnOutcome {
        let trace_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "agent_request",
            trace_id = %trace_id,
            mode = "conversation",
            agent = %self.config.profile.name,
            otel.name = "agent_request"
        );

        async {
            let mut trail = Vec::new();
            self.enter(&mut trail, LoopState::AwaitingInput);
            info!(query_len = query.len(), "Processing message");

            self.conversation.append(Role::User, query);

            let catalog = match self.host.list_tools().await {
                Ok(catalog) => catalog,
                Err(e) => return self.degrade("conversation", trace_id, trail, e),
            };

            let mut prompt = self.conversation.render(&self.system_prompt(&catalog));
            if let Some(context) = context {
                let rendered =
                    serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
                prompt.push_str(&format!("\nContext: {}\n\n", rendered));
            }

            self.enter(&mut trail, LoopState::ModelResponding);
            let request = CompletionRequest::new(prompt, self.config.temperature, self.config.max_tokens);
            let reply = match complete_instrumented(self.model.as_ref(), request).await {
                Ok(reply) => reply,
                Err(e) => return self.degrade("conversation", trace_id, trail, e),
            };

            self.enter(&mut trail, LoopState::ParsingResponse);
            self.conversation.append(Role::Assistant, reply.as_str());

            let mut text = reply.clone();
            let mut tool_call = None;
            let mut tool_outcome = None;

            let path = match classify_reply(&reply, &catalog) {
                ReplyKind::Prose => TurnPath::Answered,
                ReplyKind::Malformed(reason) => {
                    warn!(%reason, "Reply is not a usable tool request");
                    self.conversation.append(Role::User, TOOL_RESULT_ERROR);
                    text.push_str("\nTool result: error");
                    TurnPath::ToolError
                }
                ReplyKind::ToolCall(call) => {
                    self.enter(&mut trail, LoopState::ExecutingTool);
                    let name = call.tool_name.clone().unwrap_or_default();
                    let outcome = self.executor.execute(&name, call.arguments.clone()).await;

                    self.enter(&mut trail, LoopState::FoldingResult);
                    let path = match outcome.kind {
                        OutcomeKind::Success => {
                            self.conversation.append(Role::User, outcome.text.as_str());
                            text.push_str(&format!("\nTool result: {}", outcome.text));
                            TurnPath::ToolResult
                        }
                        OutcomeKind::ToolError => {
                            self.conversation
                                .append(Role::User, format!("{}: {}", TOOL_RESULT_ERROR, outcome.text));
                            text.push_str(&format!("\nTool result: error: {}", outcome.text));
                            TurnPath::ToolError
                        }
                        OutcomeKind::TransportFault | OutcomeKind::Unexpected => {
                            self.conversation.append(Role::User, TOOL_RESULT_ERROR);
                            text.push_str("\nTool result: error");
                            TurnPath::ToolError
                        }
                    };
                    tool_call = Some(call);
                    tool_outcome = Some(outcome);
                    path
                }
            };

            if trail.last() != Some(&LoopState::FoldingResult) {
                self.enter(&mut trail, LoopState::FoldingResult);
            }
            self.finish("conversation", trace_id, trail, text, path, tool_call, tool_outcome)
        }
        .instrument(span)
        .await
    }

    /// Routed mode
    ///
    /// An empty catalog short-circuits without any model call. Otherwise the
    /// selector picks a tool, which runs once; its serialized result (or a
    /// formatted error) is the answer. The query and the answer are recorded
    /// as a user/assistant pair.
    pub async fn run_routed_turn(&mut self, query: &str) -> TurnOutcome {
        let trace_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "agent_request",
            trace_id = %trace_id,
            mode = "routed",
            agent = %self.config.profile.name,
            otel.name = "agent_request"
        );

        async {
            let mut trail = Vec::new();
            self.enter(&mut trail, LoopState::AwaitingInput);
            info!(query_len = query.len(), "Routing message");

            self.conversation.append(Role::User, query);

            let catalog = match self.host.list_tools().await {
                Ok(catalog) => catalog,
                Err(e) => {
                    let outcome = self.degrade("routed", trace_id, trail, e);
                    self.conversation.append(Role::Assistant, outcome.text.as_str());
                    return outcome;
                }
            };

            if catalog.is_empty() {
                debug!("Empty catalog; skipping selection");
                return self.finish_routed(trace_id, trail, NO_TOOLS_MESSAGE.to_string(), TurnPath::NoTools, None, None);
            }

            self.enter(&mut trail, LoopState::ModelResponding);
            let call = self.selector.select(query, &catalog).await;
            self.enter(&mut trail, LoopState::ParsingResponse);

            let Some(name) = call.tool_name.clone() else {
                return self.finish_routed(
                    trace_id,
                    trail,
                    NO_SUITABLE_TOOL_MESSAGE.to_string(),
                    TurnPath::NoSuitableTool,
                    None,
                    None,
                );
            };

            self.enter(&mut trail, LoopState::ExecutingTool);
            let outcome = self.executor.execute(&name, call.arguments.clone()).await;
            self.enter(&mut trail, LoopState::FoldingResult);

            let (text, path) = if outcome.is_error() {
                (format!("Error executing tool '{}': {}", name, outcome.text), TurnPath::ToolError)
            } else {
                (outcome.text.clone(), TurnPath::ToolResult)
            };
            self.finish_routed(trace_id, trail, text, path, Some(call), Some(outcome))
        }
        .instrument(span)
        .await
    }

    /// System prompt: persona, catalog listing and reply format
    fn system_prompt(&self, catalog: &[ToolDescriptor]) -> String {
        let mut prompt = self.config.profile.system_prompt.clone();
        if catalog.is_empty() {
            return prompt;
        }

        prompt.push_str("\n\nAvailable tools:\n");
        for tool in catalog {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            prompt.push_str(&format!("  input schema: {}\n", tool.input_schema));
        }
        prompt.push_str(
            "\nTo use a tool, reply with only a JSON object of the form \
             {\"tool_name\": \"<tool name>\", \"parameters\": {<arguments>}}. \
             Otherwise answer in plain text.",
        );
        prompt
    }

    fn enter(&mut self, trail: &mut Vec<LoopState>, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "Agent state transition");
        self.state = next;
        trail.push(next);
    }

    /// Resolve a catalog or model fault into response text
    fn degrade(
        &mut self,
        mode: &'static str,
        trace_id: String,
        trail: Vec<LoopState>,
        fault: impl Display,
    ) -> TurnOutcome {
        warn!(error = %fault, "Request degraded");
        let text = format!("I encountered an error while processing your request: {}", fault);
        self.finish(mode, trace_id, trail, text, TurnPath::Degraded, None, None)
    }

    fn finish_routed(
        &mut self,
        trace_id: String,
        trail: Vec<LoopState>,
        text: String,
        path: TurnPath,
        tool_call: Option<ToolCall>,
        tool_outcome: Option<ToolOutcome>,
    ) -> TurnOutcome {
        self.conversation.append(Role::Assistant, text.as_str());
        self.finish("routed", trace_id, trail, text, path, tool_call, tool_outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &mut self,
        mode: &'static str,
        trace_id: String,
        mut trail: Vec<LoopState>,
        text: String,
        path: TurnPath,
        tool_call: Option<ToolCall>,
        tool_outcome: Option<ToolOutcome>,
    ) -> TurnOutcome {
        self.enter(&mut trail, LoopState::Done);
        AGENT_REQUESTS.with_label_values(&[mode, path.label()]).inc();
        info!(
            path = path.label(),
            turns = self.conversation.len(),
            response_len = text.len(),
            "Request completed"
        );
        TurnOutcome {
            text,
            path,
            tool_call,
            tool_outcome,
            trace_id,
            states: trail,
        }
    }
}
