use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::StructuredSummary;

/// The document a session is grounded in. Held once and shared by every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: Uuid,
    pub text: String,
    pub image: Option<PathBuf>,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>, image: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Grounding reference. Every turn points at the same document allocation.
    #[serde(skip)]
    pub grounding: Arc<SourceDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<StructuredSummary>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only history of one document session.
#[derive(Debug, Clone)]
pub struct ConversationState {
    document: Arc<SourceDocument>,
    turns: Vec<Turn>,
}

impl ConversationState {
    /// Start a session for `document`. The submission is the first user turn; its
    /// content names the document rather than repeating its text.
    pub fn new(document: SourceDocument) -> Self {
        let document = Arc::new(document);
        let first = Turn {
            role: Role::User,
            content: format!("[document {}]", document.id),
            grounding: Arc::clone(&document),
            summary: None,
            timestamp: Utc::now(),
        };
        Self {
            document,
            turns: vec![first],
        }
    }

    pub fn document(&self) -> &Arc<SourceDocument> {
        &self.document
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into(), None);
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content.into(), None);
    }

    pub fn add_assistant_summary(&mut self, summary: StructuredSummary) {
        let content = serde_json::to_string(&summary).unwrap_or_default();
        self.push(Role::Assistant, content, Some(summary));
    }

    pub fn has_assistant_turn(&self) -> bool {
        self.turns.iter().any(|turn| turn.role == Role::Assistant)
    }

    /// Most recent structured summary produced in this session.
    pub fn latest_summary(&self) -> Option<&StructuredSummary> {
        self.turns.iter().rev().find_map(|turn| turn.summary.as_ref())
    }

    /// The last user turn's text, which is the request currently being served.
    pub fn last_user_message(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.content.as_str())
    }

    /// Question/answer pairs after the document submission, as `User:`/`AI:` lines.
    /// The pending question (the last user turn without an answer) is excluded.
    pub fn history_transcript(&self) -> String {
        let mut lines = Vec::new();
        let mut pending: Option<&str> = None;
        for turn in self.turns.iter().skip(1) {
            match turn.role {
                Role::User => pending = Some(&turn.content),
                Role::Assistant => {
                    if turn.summary.is_some() {
                        pending = None;
                        continue;
                    }
                    if let Some(question) = pending.take() {
                        lines.push(format!("User: {}\nAI: {}", question, turn.content));
                    }
                }
            }
        }
        lines.join("\n")
    }

    fn push(&mut self, role: Role, content: String, summary: Option<StructuredSummary>) {
        self.turns.push(Turn {
            role,
            content,
            grounding: Arc::clone(&self.document),
            summary,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn summary() -> StructuredSummary {
        StructuredSummary {
            key_takeaways: vec!["A".into()],
            medications: vec![],
            term_definitions: BTreeMap::new(),
            follow_up_questions: vec![],
        }
    }

    #[test]
    fn every_turn_shares_the_original_document() {
        let mut state = ConversationState::new(SourceDocument::new("Discharge note", None));
        state.add_assistant_summary(summary());
        state.add_user_message("What is A?");
        state.add_assistant_message("A is a takeaway.");

        assert_eq!(state.len(), 4);
        for turn in state.turns() {
            assert!(Arc::ptr_eq(&turn.grounding, state.document()));
        }
        assert_eq!(
            state.turns()[0].content,
            format!("[document {}]", state.document().id)
        );
        assert_eq!(state.document().text, "Discharge note");
    }

    #[test]
    fn assistant_turn_tracking() {
        let mut state = ConversationState::new(SourceDocument::new("doc", None));
        assert!(!state.has_assistant_turn());
        assert!(state.latest_summary().is_none());

        state.add_assistant_summary(summary());
        assert!(state.has_assistant_turn());
        assert_eq!(state.latest_summary(), Some(&summary()));
    }

    #[test]
    fn transcript_pairs_answered_questions_only() {
        let mut state = ConversationState::new(SourceDocument::new("doc", None));
        state.add_assistant_summary(summary());
        state.add_user_message("First?");
        state.add_assistant_message("One.");
        state.add_user_message("Second?");

        assert_eq!(state.history_transcript(), "User: First?\nAI: One.");
        assert_eq!(state.last_user_message(), Some("Second?"));
    }
}
