//! Defensive structured-output extraction.
//!
//! `extract` runs an ordered fallback chain over raw generator text:
//! span isolation, strict parse, lenient repair parse, then schema validation.
//! It has no side effects beyond debug logging.

pub mod lenient;
pub mod schema;
pub mod span;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::models::{FieldIssue, ParseOutcome, ReasonCode};

pub fn extract(raw_text: &str, truncated: bool) -> ParseOutcome {
    let spans = span::isolate_spans(raw_text);
    let mut incomplete: Option<Vec<FieldIssue>> = None;

    for span in &spans.candidates {
        let Some(value) = parse_span(span) else {
            continue;
        };
        let validation = schema::validate(&value);
        for issue in &validation.issues {
            debug!(%issue, "Schema coercion");
        }
        match validation.summary {
            Some(summary) => return ParseOutcome::Success(summary),
            None => {
                incomplete.get_or_insert(validation.issues);
            }
        }
    }

    if truncated && (spans.candidates.is_empty() || spans.unterminated) {
        debug!("No complete record before the token budget ran out");
        return ParseOutcome::Empty(ReasonCode::TruncatedBeforeClose);
    }
    if let Some(issues) = incomplete {
        return degraded(raw_text, ReasonCode::SchemaIncomplete, issues);
    }
    if spans.candidates.is_empty() && raw_text.trim().is_empty() {
        return ParseOutcome::Empty(ReasonCode::EmptyOutput);
    }
    debug!(
        candidates = spans.candidates.len(),
        "No parseable structural span in generator output"
    );
    degraded(raw_text, ReasonCode::Unparseable, Vec::new())
}

fn parse_span(span: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(span) {
        Ok(value) => Some(value),
        Err(strict_error) => {
            debug!(error = %strict_error, "Strict parse failed, attempting lenient repair");
            lenient::parse(span)
        }
    }
}

fn degraded(raw_text: &str, reason: ReasonCode, issues: Vec<FieldIssue>) -> ParseOutcome {
    ParseOutcome::Degraded {
        raw_text: raw_text.to_string(),
        reason,
        issues,
    }
}

static OPENING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(\w+)>").expect("tag pattern is valid"));

/// Unwrap the first `<tag>...</tag>` pair in a free-text answer, if any.
/// Models sometimes answer follow-ups wrapped in `<answer>` or `<response>`.
pub fn strip_wrapping_tag(text: &str) -> &str {
    let trimmed = text.trim();
    for caps in OPENING_TAG.captures_iter(trimmed) {
        let (Some(open), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let closing = format!("</{}>", name.as_str());
        if let Some(offset) = trimmed[open.end()..].find(&closing) {
            return trimmed[open.end()..open.end() + offset].trim();
        }
    }
    trimmed
}
