//! Prompt templates and rendering.
//!
//! Templates are opaque text with `{name}` substitution points: `{document}`,
//! `{document_id}`, `{summary}`, `{history}` and `{question}`. Substitution is a single
//! pass, so placeholder-like text inside a document is never expanded.

use std::fmt;

use crate::conversation::SourceDocument;
use crate::models::{ReasonCode, StructuredSummary};

pub const INITIAL_SYNTHESIS_FILE: &str = "json_prompt.txt";
pub const FOLLOW_UP_FILE: &str = "conversational_prompt.txt";

const BUILTIN_INITIAL: &str = include_str!("../prompts/json_prompt.txt");
const BUILTIN_FOLLOW_UP: &str = include_str!("../prompts/conversational_prompt.txt");

// Appended when a template does not place the document itself.
// Appended, in order, for each placeholder a template leaves out.
const DOCUMENT_SECTION: (&str, &str) = (
    "document",
    "\n\n<medical_text id=\"{document_id}\">\n{document}\n</medical_text>\n",
);
const DOCUMENT_ID_SECTION: (&str, &str) = ("document_id", "\n\n<document_id>{document_id}</document_id>\n");
const SUMMARY_SECTION: (&str, &str) = ("summary", "\n\n<summary_of_text>\n{summary}\n</summary_of_text>\n");
const HISTORY_SECTION: (&str, &str) = (
    "history",
    "\n\n<conversation_history>\n{history}\n</conversation_history>\n",
);
const QUESTION_SECTION: (&str, &str) = ("question", "\n\n<user_question>\n{question}\n</user_question>\n");

/// Which instruction context a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    InitialSynthesis,
    FollowUp,
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialSynthesis => f.write_str("initial_synthesis"),
            Self::FollowUp => f.write_str("follow_up"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    initial_synthesis: String,
    follow_up: String,
}

impl PromptTemplates {
    pub fn new(initial_synthesis: impl Into<String>, follow_up: impl Into<String>) -> Self {
        Self {
            initial_synthesis: initial_synthesis.into(),
            follow_up: follow_up.into(),
        }
    }

    /// Templates compiled into the crate, used when no template directory is available.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_INITIAL, BUILTIN_FOLLOW_UP)
    }

    pub fn builtin_initial_synthesis() -> &'static str {
        BUILTIN_INITIAL
    }

    pub fn builtin_follow_up() -> &'static str {
        BUILTIN_FOLLOW_UP
    }

    pub fn render_initial(&self, document: &SourceDocument) -> String {
        let id = document.id.to_string();
        let values = [("document_id", id.as_str()), ("document", document.text.as_str())];
        render_grounded(
            &self.initial_synthesis,
            &values,
            &[DOCUMENT_SECTION, DOCUMENT_ID_SECTION],
        )
    }

    pub fn render_follow_up(
        &self,
        document: &SourceDocument,
        summary: &StructuredSummary,
        history: &str,
        question: &str,
    ) -> String {
        let id = document.id.to_string();
        let summary = serde_json::to_string_pretty(summary).unwrap_or_default();
        let values = [
            ("document_id", id.as_str()),
            ("document", document.text.as_str()),
            ("summary", summary.as_str()),
            ("history", history),
            ("question", question),
        ];
        render_grounded(
            &self.follow_up,
            &values,
            &[
                DOCUMENT_SECTION,
                DOCUMENT_ID_SECTION,
                SUMMARY_SECTION,
                HISTORY_SECTION,
                QUESTION_SECTION,
            ],
        )
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Amend a prompt after an unusable response, quoting what came back.
pub fn render_repair(original: &str, kind: PromptKind, reason: ReasonCode, previous: &str) -> String {
    let problem = match reason {
        ReasonCode::Unparseable => "it did not contain a valid JSON object",
        ReasonCode::SchemaIncomplete => "the JSON object was missing required fields",
        ReasonCode::EmptyOutput => "it was empty",
        ReasonCode::TruncatedBeforeClose => "it was cut off before the JSON object closed",
    };
    let instruction = match kind {
        PromptKind::InitialSynthesis => {
            "Respond again with only one JSON object containing the keys \"key_takeaways\", \
             \"medications\", \"term_definitions\" and \"follow_up_questions\". \
             Do not add any text before or after it."
        }
        PromptKind::FollowUp => "Answer the user question again, directly and in plain text.",
    };
    let previous = if previous.trim().is_empty() {
        "(empty)"
    } else {
        previous.trim()
    };

    format!(
        "{original}\n\n---\nYour previous response could not be used because {problem}.\n\
         <previous_response>\n{previous}\n</previous_response>\n{instruction}\n"
    )
}

/// Fill `template`, then append a section for every required placeholder it lacks.
/// A placeholder already carried by an appended section counts as present.
fn render_grounded(template: &str, values: &[(&str, &str)], sections: &[(&str, &str)]) -> String {
    let mut prompt = fill(template, values);
    let mut covered = template.to_string();
    for (name, section) in sections {
        if !covered.contains(&format!("{{{name}}}")) {
            prompt.push_str(&fill(section, values));
            covered.push_str(section);
        }
    }
    prompt
}

/// Replace `{name}` tokens found in `template`. Unknown tokens are kept verbatim.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
