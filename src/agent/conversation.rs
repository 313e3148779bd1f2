//! Append-only conversation transcript

use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering the transcript
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "Human",
            Role::Assistant => "Assistant",
        }
    }
}

/// One turn of the conversation; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered transcript of turns, oldest first
///
/// Turns are only ever appended; there is no way to edit or remove a single
/// turn. [`clear`](Self::clear) starts a new conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    turns: Vec<ConversationTurn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously saved turns, keeping their order
    pub fn from_turns(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ConversationTurn::new(role, content));
    }

    /// Render the transcript passed to the model
    ///
    /// ```text
    /// System: {system_prompt}
    ///
    /// Human: {content}
    ///
    /// Assistant: {content}
    ///
    /// ```
    pub fn render(&self, system_prompt: &str) -> String {
        let mut out = format!("System: {}\n\n", system_prompt);
        for turn in &self.turns {
            out.push_str(turn.role.label());
            out.push_str(": ");
            out.push_str(&turn.content);
            out.push_str("\n\n");
        }
        out
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn summary(&self, agent_name: &str, model: &str) -> ConversationSummary {
        ConversationSummary {
            agent_name: agent_name.to_string(),
            model: model.to_string(),
            message_count: self.turns.len(),
            conversation_length: self.turns.iter().map(|t| t.content.chars().count()).sum(),
        }
    }
}

/// Size of a conversation, for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub agent_name: String,
    pub model: String,
    pub message_count: usize,
    /// Characters across all turn contents
    pub conversation_length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_labels_roles() {
        let mut state = ConversationState::new();
        state.append(Role::User, "What is 2+2?");
        state.append(Role::Assistant, "4");

        assert_eq!(
            state.render("Be brief."),
            "System: Be brief.\n\nHuman: What is 2+2?\n\nAssistant: 4\n\n"
        );
    }

    #[test]
    fn test_render_is_repeatable() {
        let mut state = ConversationState::new();
        state.append(Role::User, "hello");
        assert_eq!(state.render("p"), state.render("p"));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut state = ConversationState::new();
        for i in 0..5 {
            state.append(Role::User, i.to_string());
        }
        let contents: Vec<&str> = state.turns().iter().map(|t| t.content()).collect();
        assert_eq!(contents, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(state.last().map(|t| t.content()), Some("4"));
    }

    #[test]
    fn test_summary_and_clear() {
        let mut state = ConversationState::new();
        state.append(Role::User, "héllo");
        state.append(Role::Assistant, "hi");

        let summary = state.summary("Actor", "qwen3");
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.conversation_length, 7);

        state.clear();
        assert!(state.is_empty());
        assert_eq!(state.render("p"), "System: p\n\n");
    }

    #[test]
    fn test_turn_roundtrips_through_session_json() {
        let turn = ConversationTurn::new(Role::Assistant, "done");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"done"}"#);
    }
}
