//! Schema validation and coercion for the summary record.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::models::{FieldIssue, Medication, StructuredSummary};

pub const KEY_TAKEAWAYS: &str = "key_takeaways";
pub const MEDICATIONS: &str = "medications";
pub const TERM_DEFINITIONS: &str = "term_definitions";
pub const FOLLOW_UP_QUESTIONS: &str = "follow_up_questions";

/// Canonical key first, then the names older prompts ask the model for.
const TERM_KEYS: &[&str] = &[TERM_DEFINITIONS, "medical_terms"];
const QUESTION_KEYS: &[&str] = &[FOLLOW_UP_QUESTIONS, "questions_for_provider"];

#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    /// Present only when all four required fields survived coercion.
    pub summary: Option<StructuredSummary>,
    pub issues: Vec<FieldIssue>,
}

pub fn validate(value: &Value) -> Validation {
    let Some(obj) = value.as_object() else {
        return Validation {
            summary: None,
            issues: vec![FieldIssue::incompatible("$root", kind_of(value))],
        };
    };

    let mut issues = Vec::new();

    let key_takeaways = required(obj, &[KEY_TAKEAWAYS], &mut issues, |v, issues| {
        coerce_string_list(KEY_TAKEAWAYS, v, issues)
    });
    let medications = required(obj, &[MEDICATIONS], &mut issues, coerce_medications);
    let term_definitions = required(obj, TERM_KEYS, &mut issues, coerce_terms);
    let follow_up_questions = required(obj, QUESTION_KEYS, &mut issues, |v, issues| {
        coerce_string_list(FOLLOW_UP_QUESTIONS, v, issues)
    });

    let summary = match (key_takeaways, medications, term_definitions, follow_up_questions) {
        (Some(key_takeaways), Some(medications), Some(term_definitions), Some(follow_up_questions)) => {
            Some(StructuredSummary {
                key_takeaways,
                medications,
                term_definitions,
                follow_up_questions,
            })
        }
        _ => None,
    };

    Validation { summary, issues }
}

fn required<T>(
    obj: &Map<String, Value>,
    keys: &[&str],
    issues: &mut Vec<FieldIssue>,
    coerce: impl FnOnce(&Value, &mut Vec<FieldIssue>) -> Option<T>,
) -> Option<T> {
    match keys.iter().filter_map(|key| obj.get(*key)).find(|v| !v.is_null()) {
        Some(value) => coerce(value, issues),
        None => {
            issues.push(FieldIssue::missing(keys[0]));
            None
        }
    }
}

fn coerce_string_list(
    field: &str,
    value: &Value,
    issues: &mut Vec<FieldIssue>,
) -> Option<Vec<String>> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => {
            issues.push(FieldIssue::incompatible(field, "object"));
            return None;
        }
        scalar => vec![scalar],
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut dropped = 0;
    for item in items {
        match scalar_text(item) {
            Some(text) => {
                let text = text.trim();
                if !text.is_empty() && seen.insert(text.to_string()) {
                    out.push(text.to_string());
                }
            }
            None if item.is_null() => {}
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        issues.push(FieldIssue::dropped(field, dropped));
    }
    Some(out)
}

fn coerce_medications(value: &Value, issues: &mut Vec<FieldIssue>) -> Option<Vec<Medication>> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) | Value::String(_) => vec![value],
        other => {
            issues.push(FieldIssue::incompatible(MEDICATIONS, kind_of(other)));
            return None;
        }
    };

    let mut out = Vec::new();
    let mut dropped = 0;
    for item in items {
        let medication = match item {
            Value::Object(obj) => medication_from_object(obj),
            Value::String(name) if !name.trim().is_empty() => {
                Some(Medication::new(name.trim(), ""))
            }
            _ => None,
        };
        match medication {
            Some(medication) => out.push(medication),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        issues.push(FieldIssue::dropped(MEDICATIONS, dropped));
    }
    Some(out)
}

fn medication_from_object(obj: &Map<String, Value>) -> Option<Medication> {
    let name = text_field(obj, &["name"])?;
    Some(Medication {
        name,
        explanation: text_field(obj, &["explanation", "description"]).unwrap_or_default(),
        dosage: text_field(obj, &["dosage"]),
        administration: text_field(obj, &["administration"]),
    })
}

fn coerce_terms(
    value: &Value,
    issues: &mut Vec<FieldIssue>,
) -> Option<BTreeMap<String, String>> {
    let mut terms = BTreeMap::new();
    let mut dropped = 0;
    let mut insert = |term: &str, definition: String| {
        let term = term.trim();
        if term.is_empty() {
            return false;
        }
        terms.entry(term.to_string()).or_insert(definition);
        true
    };

    match value {
        Value::Object(map) => {
            for (term, definition) in map {
                let accepted = scalar_text(definition)
                    .map(|d| insert(term, d.trim().to_string()))
                    .unwrap_or(false);
                if !accepted {
                    dropped += 1;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let pair = item.as_object().and_then(|obj| {
                    Some((text_field(obj, &["term"])?, text_field(obj, &["definition"])?))
                });
                let accepted = pair
                    .map(|(term, definition)| insert(&term, definition))
                    .unwrap_or(false);
                if !accepted {
                    dropped += 1;
                }
            }
        }
        other => {
            issues.push(FieldIssue::incompatible(TERM_DEFINITIONS, kind_of(other)));
            return None;
        }
    }

    if dropped > 0 {
        issues.push(FieldIssue::dropped(TERM_DEFINITIONS, dropped));
    }
    Some(terms)
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(scalar_text))
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
