//! Agent module - conversation, decision parsing and the agent loop
//!
//! # Architecture
//!
//! ```text
//! User query → AgentLoop ── append user turn ──► ConversationState
//!                  │
//!                  ├── ToolHost.list_tools() → catalog
//!                  │
//!                  ├── conversation mode: ModelClient.complete(transcript)
//!                  │       └── decision::classify_reply → prose | tool call | malformed
//!                  │
//!                  ├── routed mode: ToolSelector.select(query, catalog)
//!                  │       └── decision::parse_selection → ToolCall (or sentinel)
//!                  │
//!                  ├── ToolExecutor.execute() → ToolOutcome (never fails)
//!                  │
//!                  └── fold result into transcript → response text
//! ```

pub mod controller;
pub mod conversation;
pub mod decision;
pub mod profile;
pub mod selector;
pub mod sessions;

pub use controller::{AgentLoop, LoopState, TurnOutcome, TurnPath, NO_SUITABLE_TOOL_MESSAGE, NO_TOOLS_MESSAGE};
pub use conversation::{ConversationState, ConversationSummary, ConversationTurn, Role};
pub use decision::{classify_reply, parse_selection, strip_code_fence, DecisionError, ReplyKind};
pub use profile::AgentProfile;
pub use selector::ToolSelector;
pub use sessions::{Session, SessionStore, SessionSummary};
