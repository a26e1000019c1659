/// Extraction of JSON objects from model output
use serde_json::Value;

/// Strip a surrounding Markdown code fence, if any
///
/// Handles ```` ```json ```` openers and a missing closing fence.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    // Drop the opener line, including any language tag
    let body = match trimmed.split_once('\n') {
        Some((_, rest)) => rest,
        None => return trimmed.trim_start_matches('`').trim(),
    };

    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parse a JSON object from model output, degrading to `fallback`
///
/// On failure the fallback is returned with `raw_response` holding the
/// original text.
pub fn parse_json_or(text: &str, fallback: Value) -> Value {
    match serde_json::from_str::<Value>(strip_code_fences(text)) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            tracing::warn!("Model output was not a JSON object, using fallback");
            let mut fallback = fallback;
            if let Value::Object(map) = &mut fallback {
                map.insert("raw_response".to_string(), Value::String(text.to_string()));
            }
            fallback
        }
    }
}

/// Render a JSON value for prompt text, strings without quotes
pub fn display_value(value: Option<&Value>, missing: &str) -> String {
    match value {
        None | Some(Value::Null) => missing.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fenced_json() {
        let parsed = parse_json_or("```json\n{\"health_score\": 80}\n```", json!({}));
        assert_eq!(parsed["health_score"], 80);
        assert!(parsed.get("raw_response").is_none());
    }

    #[test]
    fn test_parse_failure_returns_fallback_with_raw() {
        let parsed = parse_json_or("I cannot answer that", json!({"health_score": 50}));
        assert_eq!(parsed["health_score"], 50);
        assert_eq!(parsed["raw_response"], "I cannot answer that");
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        let parsed = parse_json_or("[1, 2, 3]", json!({"score": 5}));
        assert_eq!(parsed["score"], 5);
        assert_eq!(parsed["raw_response"], "[1, 2, 3]");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(Some(&json!("warm")), "--"), "warm");
        assert_eq!(display_value(Some(&json!(72)), "--"), "72");
        assert_eq!(display_value(None, "--"), "--");
        assert_eq!(display_value(Some(&Value::Null), "none"), "none");
    }
}
