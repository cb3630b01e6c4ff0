//! Response sanitation for structured model replies.
//!
//! Models asked for JSON often wrap it in a fenced block, prefix it with a
//! language tag, or surround it with prose. The helpers here peel that off
//! and parse the first-brace..last-brace span. Failure is never an error: the
//! caller supplies a default for its own schema.

use serde::de::DeserializeOwned;
use tracing::warn;

const FENCE: &str = "```";

/// Strip one fenced block (and a leading language tag inside it) if present.
///
/// Text without a fence is returned trimmed.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    let after = &trimmed[open + FENCE.len()..];
    let tag_len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    let body = &after[tag_len..];

    match body.find(FENCE) {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// The span from the first `{` to the last `}` after fence stripping.
pub fn extract_object(text: &str) -> Option<&str> {
    let body = strip_fences(text);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

/// Parse a structured payload, or `None` if nothing usable is found.
pub fn parse_payload<T: DeserializeOwned>(text: &str) -> Option<T> {
    let candidate = extract_object(text)?;
    serde_json::from_str(candidate).ok()
}

/// Parse a structured payload, falling back to the call site's default.
pub fn parse_or_else<T, F>(text: &str, call_site: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match parse_payload(text) {
        Some(value) => value,
        None => {
            warn!(
                call_site,
                preview = %text.chars().take(80).collect::<String>(),
                "Unparseable model reply, using fallback payload"
            );
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{Value, json};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        diagnosis: String,
        confidence: f64,
    }

    const PAYLOAD: &str = r#"{"diagnosis": "water_stress", "confidence": 0.82}"#;

    #[test]
    fn fenced_with_language_tag_parses_like_bare() {
        let fenced = format!("```json\n{PAYLOAD}\n```");
        let bare: Value = parse_payload(PAYLOAD).unwrap();
        let wrapped: Value = parse_payload(&fenced).unwrap();
        assert_eq!(bare, wrapped);
    }

    #[test]
    fn fenced_without_tag_parses() {
        let fenced = format!("```\n{PAYLOAD}\n```");
        let v: Verdict = parse_payload(&fenced).unwrap();
        assert_eq!(v.diagnosis, "water_stress");
    }

    #[test]
    fn upper_case_tag_and_surrounding_prose() {
        let text = format!("Here is my analysis:\n```JSON\n{PAYLOAD}\n```\nHope this helps!");
        let v: Verdict = parse_payload(&text).unwrap();
        assert!((v.confidence - 0.82).abs() < f64::EPSILON);
    }

    #[test]
    fn prose_around_unfenced_object() {
        let text = format!("Sure. {PAYLOAD} Let me know.");
        let v: Verdict = parse_payload(&text).unwrap();
        assert_eq!(v.diagnosis, "water_stress");
    }

    #[test]
    fn nested_objects_survive_brace_extraction() {
        let text = r#"```json
{"final_diagnosis": "x", "action_plan": {"immediate": "irrigate", "long_term": "mulch"}}
```"#;
        let v: Value = parse_payload(text).unwrap();
        assert_eq!(v["action_plan"]["immediate"], json!("irrigate"));
    }

    #[test]
    fn garbage_falls_back() {
        let v: Verdict = parse_or_else("I cannot answer that.", "test", || Verdict {
            diagnosis: "Unknown".into(),
            confidence: 0.0,
        });
        assert_eq!(v.diagnosis, "Unknown");
    }

    #[test]
    fn truncated_json_falls_back() {
        let v: Option<Value> = parse_payload(r#"{"diagnosis": "water"#);
        assert!(v.is_none());
    }

    #[test]
    fn strip_fences_leaves_plain_text_alone() {
        assert_eq!(strip_fences("  plain  "), "plain");
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
    }
}
