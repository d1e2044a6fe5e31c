use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A medication mentioned in the source document, explained in plain language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administration: Option<String>,
}

impl Medication {
    pub fn new(name: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            explanation: explanation.into(),
            dosage: None,
            administration: None,
        }
    }
}

/// Fully validated summary. Only ever constructed with all four fields populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub key_takeaways: Vec<String>,
    pub medications: Vec<Medication>,
    pub term_definitions: BTreeMap<String, String>,
    pub follow_up_questions: Vec<String>,
}

/// Why a generation could not be turned into a [`StructuredSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    TruncatedBeforeClose,
    Unparseable,
    SchemaIncomplete,
    EmptyOutput,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TruncatedBeforeClose => "truncated-before-close",
            Self::Unparseable => "unparseable",
            Self::SchemaIncomplete => "schema-incomplete",
            Self::EmptyOutput => "empty-output",
        }
    }

    /// Whether a corrective re-prompt can fix this failure. Truncation can only be
    /// fixed with a larger token budget.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, Self::TruncatedBeforeClose)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    IncompatibleType { found: String },
    DroppedItems { count: usize },
}

/// A coercion decision taken while validating one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl FieldIssue {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: IssueKind::Missing,
        }
    }

    pub fn incompatible(field: &str, found: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: IssueKind::IncompatibleType {
                found: found.to_string(),
            },
        }
    }

    pub fn dropped(field: &str, count: usize) -> Self {
        Self {
            field: field.to_string(),
            kind: IssueKind::DroppedItems { count },
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::Missing => write!(f, "{}: missing", self.field),
            IssueKind::IncompatibleType { found } => {
                write!(f, "{}: incompatible type {}", self.field, found)
            }
            IssueKind::DroppedItems { count } => {
                write!(f, "{}: dropped {} unusable item(s)", self.field, count)
            }
        }
    }
}

/// Result of running the extractor over one generation.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Success(StructuredSummary),
    Degraded {
        raw_text: String,
        reason: ReasonCode,
        issues: Vec<FieldIssue>,
    },
    Empty(ReasonCode),
}

impl ParseOutcome {
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Self::Success(_) => None,
            Self::Degraded { reason, .. } => Some(*reason),
            Self::Empty(reason) => Some(*reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "sequences", rename_all = "snake_case")]
pub enum StopCondition {
    /// Stop at the model's own end-of-turn marker.
    #[default]
    EndOfTurn,
    Sequences(Vec<String>),
}

/// One call to the generation backend. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<PathBuf>,
    pub max_output_tokens: u32,
    pub stop: StopCondition,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            max_output_tokens,
            stop: StopCondition::EndOfTurn,
        }
    }

    pub fn with_image(mut self, image: Option<PathBuf>) -> Self {
        self.image = image;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub raw_text: String,
    /// The token budget ran out before the backend reached a natural stop.
    pub truncated: bool,
}

impl GenerationResult {
    pub fn complete(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            truncated: false,
        }
    }

    pub fn truncated(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            truncated: true,
        }
    }
}

/// What the orchestrator hands back to its caller for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Summary(StructuredSummary),
    Answer {
        text: String,
        truncated: bool,
    },
    /// Unstructured fallback. `raw_text` is the last non-blank generation, if any.
    Degraded {
        raw_text: String,
        reason: ReasonCode,
        issues: Vec<FieldIssue>,
        attempts: u8,
    },
}

impl Reply {
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Degraded { .. })
    }

    pub fn summary(&self) -> Option<&StructuredSummary> {
        match self {
            Self::Summary(summary) => Some(summary),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_serialize_kebab_case() {
        let json = serde_json::to_string(&ReasonCode::TruncatedBeforeClose).unwrap();
        assert_eq!(json, "\"truncated-before-close\"");
        assert_eq!(
            ReasonCode::SchemaIncomplete.to_string(),
            "schema-incomplete"
        );
    }

    #[test]
    fn only_truncation_is_unrepairable() {
        assert!(!ReasonCode::TruncatedBeforeClose.is_repairable());
        assert!(ReasonCode::Unparseable.is_repairable());
        assert!(ReasonCode::SchemaIncomplete.is_repairable());
        assert!(ReasonCode::EmptyOutput.is_repairable());
    }

    #[test]
    fn degraded_reply_is_flagged_unstructured() {
        let reply = Reply::Degraded {
            raw_text: "free text".into(),
            reason: ReasonCode::Unparseable,
            issues: vec![],
            attempts: 2,
        };
        assert!(!reply.is_structured());
        assert!(reply.summary().is_none());

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["kind"], "degraded");
        assert_eq!(value["reason"], "unparseable");
    }

    #[test]
    fn field_issue_display() {
        assert_eq!(
            FieldIssue::incompatible("medications", "number").to_string(),
            "medications: incompatible type number"
        );
        assert_eq!(
            FieldIssue::missing("follow_up_questions").to_string(),
            "follow_up_questions: missing"
        );
    }
}
