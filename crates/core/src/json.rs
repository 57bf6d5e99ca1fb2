//! Tolerant JSON extraction from free-text model replies.
//!
//! Models do not reliably emit bare JSON: replies arrive wrapped in markdown
//! fences, prefixed with prose, or both. Extraction is an ordered chain of
//! strategies — strict parse, fence-stripped parse, brace-scan parse — each
//! returning an `Option`; the first success wins.

use serde_json::Value;

/// Try to extract a JSON value from a model reply.
///
/// Returns `None` only when every strategy is exhausted. Callers decide what
/// exhaustion means (a `SynthesisError`, a plan-parse retry, ...).
pub fn extract_json(text: &str) -> Option<Value> {
    parse_strict(text)
        .or_else(|| parse_fenced(text))
        .or_else(|| parse_brace_scan(text))
}

/// Strategy 1: the whole reply is valid JSON.
fn parse_strict(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Strategy 2: JSON inside a markdown code fence (```json ... ``` or ``` ... ```).
fn parse_fenced(text: &str) -> Option<Value> {
    let after_open = if let Some(rest) = text.split_once("```json") {
        rest.1
    } else {
        text.split_once("```")?.1
    };
    let inner = after_open.split_once("```")?.0;
    serde_json::from_str(inner.trim()).ok()
}

/// Strategy 3: scan for the outermost `{ ... }` pair and parse that slice.
fn parse_brace_scan(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// A short preview of a reply for error messages (first 200 chars).
pub fn reply_preview(text: &str) -> String {
    let mut preview: String = text.chars().take(200).collect();
    if text.chars().count() > 200 {
        preview.push('…');
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_parses() {
        let v = extract_json(r#"{"action_type": "COMPLETE"}"#).unwrap();
        assert_eq!(v["action_type"], "COMPLETE");
    }

    #[test]
    fn fenced_json_parses() {
        let text = "Here is my answer:\n```json\n{\"insights\": []}\n```\nDone.";
        let v = extract_json(text).unwrap();
        assert!(v["insights"].as_array().unwrap().is_empty());
    }

    #[test]
    fn plain_fence_parses() {
        let text = "```\n{\"x\": 1}\n```";
        let v = extract_json(text).unwrap();
        assert_eq!(v["x"], 1);
    }

    #[test]
    fn brace_scan_recovers_from_prose() {
        let text = "Sure! The plan is {\"action_type\": \"TOOL_CALL\", \"tool\": \"search_content\"} — hope that helps.";
        let v = extract_json(text).unwrap();
        assert_eq!(v["tool"], "search_content");
    }

    #[test]
    fn nested_braces_survive_scan() {
        let text = "blah {\"a\": {\"b\": 2}} blah";
        let v = extract_json(text).unwrap();
        assert_eq!(v["a"]["b"], 2);
    }

    #[test]
    fn exhaustion_returns_none() {
        assert!(extract_json("no json here at all").is_none());
        assert!(extract_json("{broken: json").is_none());
    }

    #[test]
    fn preview_truncates() {
        let long = "x".repeat(500);
        let p = reply_preview(&long);
        assert!(p.chars().count() <= 201);
        assert!(p.ends_with('…'));
    }
}
