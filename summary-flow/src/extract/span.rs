//! Locates the structural span inside raw generator output.

use std::sync::LazyLock;

use regex::Regex;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("fence pattern is valid"));

enum CloseScan {
    Closed(usize),
    Mismatched,
    Unterminated,
}

/// Balanced `{ ... }` spans that look like records, in the order they should be tried.
#[derive(Debug, Default, PartialEq)]
pub struct Spans<'a> {
    pub candidates: Vec<&'a str>,
    /// Some record-like opening brace was never closed.
    pub unterminated: bool,
}

/// Collect every top-level balanced `{ ... }` span that looks like a record.
///
/// Spans inside a fenced ```` ```json ```` block come first. An opening brace that
/// is never closed does not stop the scan: later braces are still tried, since the
/// unclosed one may be prose with a stray quote.
pub fn isolate_spans(text: &str) -> Spans<'_> {
    let mut spans = Spans::default();
    if let Some(inner) = JSON_FENCE.captures(text).and_then(|caps| caps.get(1)) {
        scan_balanced(inner.as_str(), &mut spans);
    }
    scan_balanced(text, &mut spans);
    spans
}

fn scan_balanced<'a>(text: &'a str, spans: &mut Spans<'a>) {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if !looks_like_record(&text[start + 1..]) {
            search_from = start + 1;
            continue;
        }
        match match_close(bytes, start) {
            CloseScan::Closed(end) => {
                let span = &text[start..=end];
                if !spans.candidates.contains(&span) {
                    spans.candidates.push(span);
                }
                search_from = end + 1;
            }
            CloseScan::Mismatched => search_from = start + 1,
            CloseScan::Unterminated => {
                spans.unterminated = true;
                search_from = start + 1;
            }
        }
    }
}

// Delimiters and quotes are ASCII, so scanning bytes never splits a UTF-8 sequence
// at a position we slice on.
fn match_close(bytes: &[u8], start: usize) -> CloseScan {
    let mut expected: Vec<u8> = Vec::new();
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }

        match b {
            b'"' | b'\'' => quote = Some(b),
            b'{' => expected.push(b'}'),
            b'[' => expected.push(b']'),
            b'}' | b']' => {
                if expected.pop() != Some(b) {
                    return CloseScan::Mismatched;
                }
                if expected.is_empty() {
                    return CloseScan::Closed(i);
                }
            }
            _ => {}
        }
    }
    CloseScan::Unterminated
}

/// A record opens with a key (quoted or bare), a comment, or closes immediately.
fn looks_like_record(rest: &str) -> bool {
    match rest.trim_start().chars().next() {
        None => true,
        Some(c) => matches!(c, '"' | '\'' | '}' | '/') || c.is_alphabetic() || c == '_' || c == '$',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(text: &str) -> Option<&str> {
        isolate_spans(text).candidates.first().copied()
    }

    #[test]
    fn strips_leading_and_trailing_prose() {
        let text = "Here is your summary:\n{\"a\": [1, 2]}\nLet me know if you need more.";
        assert_eq!(first(text), Some("{\"a\": [1, 2]}"));
    }

    #[test]
    fn ignores_delimiters_inside_strings() {
        let text = r#"{"note": "use } and ] freely", "b": 'it\'s {fine}'}"#;
        assert_eq!(first(text), Some(text));
    }

    #[test]
    fn skips_brace_groups_that_are_not_records() {
        let text = "The set {1, 2} is small. {\"key\": true}";
        assert_eq!(first(text), Some("{\"key\": true}"));
    }

    #[test]
    fn prefers_fenced_json_block() {
        let text = "Example shape {\"x\": 1}\n```json\n{\"key_takeaways\": []}\n```";
        let spans = isolate_spans(text);
        assert_eq!(spans.candidates, vec!["{\"key_takeaways\": []}", "{\"x\": 1}"]);
    }

    #[test]
    fn keeps_every_top_level_candidate() {
        let text = "Fill in {see below} then:\n{\"a\": {\"b\": 1}}";
        let spans = isolate_spans(text);
        assert_eq!(spans.candidates, vec!["{see below}", "{\"a\": {\"b\": 1}}"]);
        assert!(!spans.unterminated);
    }

    #[test]
    fn stray_quote_does_not_hide_later_record() {
        let text = "I'll use {patient's notes} only.\n{\"a\": 1}";
        let spans = isolate_spans(text);
        assert!(spans.unterminated);
        assert_eq!(spans.candidates, vec!["{\"a\": 1}"]);
    }

    #[test]
    fn unclosed_record_is_flagged() {
        let text = "{\"key_takeaways\": [\"A\"], \"medications\": [{\"name\": \"x\"}, ";
        let spans = isolate_spans(text);
        assert!(spans.unterminated);
        assert_eq!(spans.candidates, vec!["{\"name\": \"x\"}"]);
    }

    #[test]
    fn mismatched_candidate_is_abandoned() {
        let text = "{\"a\": ] {\"b\": 2}";
        assert_eq!(first(text), Some("{\"b\": 2}"));
    }

    #[test]
    fn no_delimiter_yields_nothing() {
        assert_eq!(isolate_spans("just prose, no structure"), Spans::default());
    }
}
