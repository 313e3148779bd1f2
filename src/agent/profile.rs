//! Agent personas

use serde::{Deserialize, Serialize};

/// A named persona: the system prompt that heads every transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub system_prompt: String,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Accomplishes tasks by calling tools
    pub fn actor() -> Self {
        Self::new(
            "Actor",
            "You are an actor agent. Your goal is to accomplish the given task by using the available tools.",
        )
    }

    /// Reviews the work of other agents
    pub fn critic() -> Self {
        Self::new(
            "Critic",
            "You are a critic agent. Your goal is to evaluate the work of other agents and provide constructive feedback.",
        )
    }

    pub fn search() -> Self {
        Self::new("SearchAgent", SEARCH_PROMPT)
    }
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self::actor()
    }
}

const SEARCH_PROMPT: &str = r#"You are a helpful search agent with access to web search capabilities.

Your role is to:
1. Help users find information by searching the web
2. Provide accurate, up-to-date information from reliable sources
3. Summarize search results in a clear and helpful way
4. Cite sources when providing information

When a user asks a question that requires current information, use the web search tool, analyze the results and answer from what you found, including relevant links.

If you cannot find reliable information, say so clearly."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_distinct() {
        let names: Vec<String> = [AgentProfile::actor(), AgentProfile::critic(), AgentProfile::search()]
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Actor", "Critic", "SearchAgent"]);
        assert_eq!(AgentProfile::default(), AgentProfile::actor());
    }
}
