//! Tolerant re-writing of near-JSON into strict JSON.
//!
//! Handles a fixed set of generator habits: trailing commas, single-quoted strings,
//! bare identifier keys, `//` and `/* */` comments, and raw control characters inside
//! strings. Anything else is left for the strict parser to reject.

use serde_json::Value;

/// Repair `input` and parse the result strictly.
pub fn parse(input: &str) -> Option<Value> {
    serde_json::from_str(&repair(input)).ok()
}

pub fn repair(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => i = copy_string(&chars, i, '"', &mut out),
            '\'' => i = copy_string(&chars, i, '\'', &mut out),
            '/' if matches!(chars.get(i + 1), Some('/' | '*')) => i = skip_comment(&chars, i),
            ',' => {
                if !matches!(next_significant(&chars, i + 1), Some('}' | ']')) {
                    out.push(',');
                }
                i += 1;
            }
            c if is_ident_start(c) => {
                let end = ident_end(&chars, i);
                let word: String = chars[i..end].iter().collect();
                if next_significant(&chars, end) == Some(':') {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Copy a string literal opened by `quote` at `start` as a double-quoted JSON string.
/// Returns the index just past the closing quote.
fn copy_string(chars: &[char], start: usize, quote: char, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                match chars.get(i + 1) {
                    // \' is not a JSON escape
                    Some('\'') => out.push('\''),
                    Some(&next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push_str("\\\\"),
                }
                i += 2;
                continue;
            }
            c if c == quote => {
                out.push('"');
                return i + 1;
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }
    out.push('"');
    i
}

fn skip_comment(chars: &[char], start: usize) -> usize {
    let mut i = start + 2;
    if chars[start + 1] == '/' {
        while i < chars.len() && chars[i] != '\n' {
            i += 1;
        }
        return i;
    }
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    let mut i = from;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && matches!(chars.get(i + 1), Some('/' | '*')) {
            i = skip_comment(chars, i);
        } else {
            return Some(c);
        }
    }
    None
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn ident_end(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
        i += 1;
    }
    i
}
