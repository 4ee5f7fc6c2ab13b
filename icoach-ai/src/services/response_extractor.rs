//! Best-effort JSON recovery from free-form model output
//!
//! Models asked for JSON still wrap it in prose, markdown fences or
//! reasoning, leave trailing commas behind, or get cut off mid-value.
//! [`extract_json`] tries, in order:
//!
//! 1. The whole text as-is
//! 2. Fenced code blocks, last block first
//! 3. The span from the first `[`/`{` to the last matching closer
//! 4. That same fragment with missing closers appended
//!
//! Every candidate is parsed as-is first and then with trailing commas
//! stripped. Each step is a separate function so it can be tested alone.
//! Nothing here has side effects besides the final diagnostic log line.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Characters of raw text kept in the failure log line
const LOG_PREVIEW_CHARS: usize = 500;

/// Triple-backtick blocks, optionally tagged `json`
static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?i:json)?[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
});

/// A comma directly before a closing bracket or brace
static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([\]}])").expect("valid trailing comma regex"));

/// Recover a JSON value from `text`
///
/// Returns `None` when every strategy fails. Callers must treat that as a
/// recoverable condition; the raw text has already been logged.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        warn!("Model response was empty, no JSON to extract");
        return None;
    }

    let recovered = parse_candidate(trimmed)
        .or_else(|| parse_fenced(trimmed))
        .or_else(|| parse_delimited(trimmed));

    if recovered.is_none() {
        warn!(
            len = text.len(),
            raw = %preview(text),
            "Could not recover JSON from model response"
        );
    }

    recovered
}

/// Contents of every fenced code block, in order of appearance
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    FENCE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|block| !block.is_empty())
        .collect()
}

/// Remove commas that directly precede `]` or `}`
pub fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA_RE.replace_all(text, "$1").into_owned()
}

/// Parse `candidate`, retrying once with trailing commas stripped
pub fn parse_candidate(candidate: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(candidate) {
        return Some(value);
    }
    let cleaned = strip_trailing_commas(candidate);
    if cleaned != candidate {
        return serde_json::from_str(&cleaned).ok();
    }
    None
}

/// First fenced block that parses, scanning from the last block backwards
pub fn parse_fenced(text: &str) -> Option<Value> {
    fenced_blocks(text)
        .into_iter()
        .rev()
        .find_map(parse_candidate)
}

/// Parse the span starting at the first `[` or `{`
///
/// Tries the span up to the last closer of the same kind; when there is
/// none, or that span does not parse, falls back to [`balance_fragment`].
pub fn parse_delimited(text: &str) -> Option<Value> {
    let start = text.find(|c| c == '[' || c == '{')?;
    let fragment = &text[start..];
    let closer = if fragment.starts_with('[') { ']' } else { '}' };

    if let Some(end) = fragment.rfind(closer) {
        if let Some(value) = parse_candidate(&fragment[..=end]) {
            return Some(value);
        }
    }

    parse_candidate(&balance_fragment(fragment))
}

/// Close whatever `fragment` leaves open
///
/// Walks the fragment tracking open brackets and braces (ignoring any
/// inside string literals). If the outermost value closes, everything after
/// it is cut off. Otherwise an open string is terminated, a dangling comma
/// is dropped and the missing closers are appended innermost first.
pub fn balance_fragment(fragment: &str) -> String {
    let mut expected: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in fragment.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => expected.push('}'),
            '[' => expected.push(']'),
            '}' | ']' => {
                if expected.last() == Some(&ch) {
                    expected.pop();
                    if expected.is_empty() {
                        return fragment[..idx + ch.len_utf8()].to_string();
                    }
                }
            }
            _ => {}
        }
    }

    let mut balanced = fragment.to_string();
    if in_string {
        if escaped {
            balanced.pop();
        }
        balanced.push('"');
    }

    let kept = balanced.trim_end().trim_end_matches(',').len();
    balanced.truncate(kept);

    balanced.extend(expected.iter().rev());
    balanced
}

fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_block_inside_prose() {
        let text = "prose ```json\n[1,2,3]\n``` trailing";
        assert_eq!(extract_json(text), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_last_parseable_block_wins() {
        let text = "Draft:\n```json\n{\"score\": 10,, oops\n```\nFinal:\n```json\n{\"score\": 80}\n```";
        assert_eq!(extract_json(text), Some(json!({"score": 80})));
    }

    #[test]
    fn test_earlier_block_used_when_last_is_broken() {
        let text = "```json\n{\"a\": 1}\n```\nthen\n```\nnot json at all\n```";
        assert_eq!(parse_fenced(text), Some(json!({"a": 1})));
    }

    #[test]
    fn test_untagged_and_uppercase_fences() {
        assert_eq!(fenced_blocks("```\n{}\n```"), vec!["{}"]);
        assert_eq!(fenced_blocks("```JSON\n[1]\n```"), vec!["[1]"]);
        assert!(fenced_blocks("no fences here").is_empty());
    }

    #[test]
    fn test_trailing_commas_stripped() {
        assert_eq!(strip_trailing_commas("[1,2,]"), "[1,2]");
        assert_eq!(strip_trailing_commas("{\"a\": 1,\n }"), "{\"a\": 1}");
        let text = "```json\n{\"items\": [\"x\", \"y\",],}\n```";
        assert_eq!(extract_json(text), Some(json!({"items": ["x", "y"]})));
    }

    #[test]
    fn test_valid_json_not_touched_by_comma_cleanup() {
        let text = r#"{"quote": "first, ]second"}"#;
        assert_eq!(extract_json(text), Some(json!({"quote": "first, ]second"})));
    }

    #[test]
    fn test_object_surrounded_by_prose() {
        let text = "Here is the evaluation: {\"rubric\": []} Let me know if you need more.";
        assert_eq!(extract_json(text), Some(json!({"rubric": []})));
    }

    #[test]
    fn test_first_opener_decides_kind() {
        let text = "Results: [{\"a\": 1}, {\"a\": 2}] done";
        assert_eq!(extract_json(text), Some(json!([{"a": 1}, {"a": 2}])));
    }

    #[test]
    fn test_truncated_input_is_balanced() {
        assert_eq!(balance_fragment(r#"{"a": [1,2,"#), r#"{"a": [1,2]}"#);
        assert_eq!(extract_json(r#"{"a": [1,2,"#), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_balance_closes_open_string() {
        assert_eq!(balance_fragment(r#"{"a": "x["#), r#"{"a": "x["}"#);
    }

    #[test]
    fn test_balance_ignores_brackets_in_strings() {
        assert_eq!(
            balance_fragment(r#"{"q": "}{][", "n": [1"#),
            r#"{"q": "}{][", "n": [1]}"#
        );
    }

    #[test]
    fn test_balance_cuts_after_complete_value() {
        assert_eq!(balance_fragment(r#"{"a": 1} and then {"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_unrecoverable_text_is_none() {
        assert_eq!(extract_json("I could not evaluate this answer."), None);
        assert_eq!(extract_json("   "), None);
        assert_eq!(extract_json(r#"{"a": "#), None);
    }

    #[test]
    fn test_deterministic() {
        let text = "noise ```json\n{\"k\": [1,\n``` more {\"k\": 2}";
        assert_eq!(extract_json(text), extract_json(text));
    }
}
