//! Persistent conversation sessions
//!
//! Allows saving and resuming conversations to/from disk, one pretty-printed
//! JSON file per session.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::conversation::{ConversationState, ConversationTurn};
use crate::error::SessionError;

/// A saved conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID (UUID v7, so IDs sort by creation time)
    pub id: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// RFC 3339 timestamp of the last save
    pub updated_at: String,
    /// Agent profile name
    pub profile: String,
    /// Model used for this session
    pub model: String,
    pub turns: Vec<ConversationTurn>,
}

impl Session {
    pub fn new(profile: impl Into<String>, model: impl Into<String>) -> Self {
        let now = timestamp();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: now.clone(),
            updated_at: now,
            profile: profile.into(),
            model: model.into(),
            turns: Vec::new(),
        }
    }

    /// Replace the stored turns with the current conversation
    pub fn record(&mut self, conversation: &ConversationState) {
        self.turns = conversation.turns().to_vec();
        self.updated_at = timestamp();
    }

    /// Conversation to resume from
    pub fn conversation(&self) -> ConversationState {
        ConversationState::from_turns(self.turns.clone())
    }
}

/// Session storage manager
#[derive(Debug, Clone)]
pub struct SessionStore {
    /// Base directory for session files
    base_dir: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Create with default directory (~/.toolpilot/sessions)
    pub fn default_store() -> Result<Self, SessionError> {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(PathBuf::from(home).join(".toolpilot").join("sessions"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(self.session_path(&session.id)?, json)?;
        Ok(())
    }

    pub fn load(&self, session_id: &str) -> Result<Session, SessionError> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        load_from_path(&path)
    }

    /// All readable sessions, newest first
    pub fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Ok(session) = load_from_path(&path) {
                    let preview = session
                        .turns
                        .first()
                        .map(|t| truncate(t.content(), 50))
                        .unwrap_or_default();
                    sessions.push(SessionSummary {
                        id: session.id,
                        profile: session.profile,
                        preview,
                        created_at: session.created_at,
                        turns: session.turns.len(),
                    });
                }
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    pub fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Ids are plain file stems; anything that could leave `base_dir` is rejected
    fn session_path(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionError::InvalidId(session_id.to_string()));
        }
        Ok(self.base_dir.join(format!("{}.json", session_id)))
    }
}

fn load_from_path(path: &Path) -> Result<Session, SessionError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Summary of a session for listing
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub profile: String,
    /// Start of the first user turn
    pub preview: String,
    pub created_at: String,
    pub turns: usize,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Truncate to `max_chars` characters, adding an ellipsis if needed
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::Role;

    #[test]
    fn test_session_creation() {
        let session = Session::new("Actor", "qwen3");
        assert!(!session.id.is_empty());
        assert_eq!(session.profile, "Actor");
        assert_eq!(session.model, "qwen3");
        assert!(session.turns.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&session.created_at).is_ok());
    }

    #[test]
    fn test_save_load_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let mut conversation = ConversationState::new();
        conversation.append(Role::User, "What is the weather like in Lisbon today?");
        conversation.append(Role::Assistant, "Sunny.");

        let mut session = Session::new("SearchAgent", "gemini-2.5-flash");
        session.record(&conversation);
        store.save(&session).unwrap();

        let loaded = store.load(&session.id).unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.conversation(), conversation);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].turns, 2);
        assert!(listed[0].preview.ends_with("..."));

        store.delete(&session.id).unwrap();
        assert!(matches!(store.load(&session.id), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_list_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("garbage.json"), "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_ids_cannot_escape_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions")).unwrap();
        std::fs::write(dir.path().join("outside.json"), "{}").unwrap();

        for id in ["../outside", "a/b", "..", "", "/etc/passwd", "id.json"] {
            assert!(
                matches!(store.load(id), Err(SessionError::InvalidId(_))),
                "{:?} was accepted",
                id
            );
            assert!(matches!(store.delete(id), Err(SessionError::InvalidId(_))));
        }

        let mut session = Session::new("Actor", "qwen3");
        session.id = "../escaped".to_string();
        assert!(matches!(store.save(&session), Err(SessionError::InvalidId(_))));
        assert!(!dir.path().join("escaped.json").exists());
        assert!(dir.path().join("outside.json").exists());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
    }
}
