//! Extraction of the first JSON object embedded in free-form model output.
//!
//! Models are asked for bare JSON but routinely wrap it in markdown fences
//! or surround it with prose. Every agent funnels raw completion text
//! through [`extract_object`] before interpreting it; `None` means "take the
//! rule-based path", exactly as a gateway fallback does.

use serde_json::Value;

/// Locate and parse the first balanced `{...}` region in `text`.
///
/// Markdown code fences are stripped first. Brace balancing is
/// string-aware, so braces inside JSON string literals do not confuse the
/// scanner. Returns `None` when no parseable object is present.
pub fn extract_object(text: &str) -> Option<Value> {
    let stripped = strip_code_fences(text);
    let candidate = first_balanced_object(stripped)?;
    serde_json::from_str(candidate).ok()
}

/// Read a string field out of an extracted object, treating blank values as
/// absent.
pub fn string_field(object: &Value, field: &str) -> Option<String> {
    let value = object.get(field)?;
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Read a numeric field, accepting both JSON numbers and numeric strings.
pub fn number_field(object: &Value, field: &str) -> Option<f64> {
    match object.get(field)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Read a list of strings, dropping non-string and blank entries.
pub fn string_list_field(object: &Value, field: &str) -> Vec<String> {
    object
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    let after_open = if let Some(rest) = find_fence(trimmed, "```json") {
        rest
    } else if let Some(rest) = find_fence(trimmed, "```") {
        rest
    } else {
        return trimmed;
    };

    match after_open.find("```") {
        Some(close) => after_open[..close].trim(),
        None => after_open.trim(),
    }
}

fn find_fence<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.find(marker).map(|at| &text[at + marker.len()..])
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[open..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..=open + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{extract_object, number_field, string_field, string_list_field};

    #[test]
    fn parses_bare_object() {
        let value = extract_object(r#"{"score": 7.5, "label": "good"}"#).expect("object");
        assert_eq!(number_field(&value, "score"), Some(7.5));
        assert_eq!(string_field(&value, "label").as_deref(), Some("good"));
    }

    #[test]
    fn strips_json_code_fence() {
        let text = "Here you go:\n```json\n{\"vision\": \"a future\"}\n```\nThanks!";
        let value = extract_object(text).expect("object inside fence");
        assert_eq!(string_field(&value, "vision").as_deref(), Some("a future"));
    }

    #[test]
    fn strips_anonymous_code_fence() {
        let text = "```\n{\"ok\": true}\n```";
        assert!(extract_object(text).is_some());
    }

    #[test]
    fn finds_object_inside_prose() {
        let text = "The assessment follows. {\"idea\": {\"score\": 6}} Let me know.";
        let value = extract_object(text).expect("embedded object");
        assert!(value.get("idea").is_some());
    }

    #[test]
    fn braces_inside_strings_do_not_break_balancing() {
        let text = r#"{"note": "uses {curly} braces and a \" quote", "n": 1}"#;
        let value = extract_object(text).expect("object with braces in string");
        assert_eq!(number_field(&value, "n"), Some(1.0));
    }

    #[test]
    fn unbalanced_object_yields_none() {
        assert!(extract_object(r#"{"open": "never closed""#).is_none());
    }

    #[test]
    fn text_without_object_yields_none() {
        assert!(extract_object("no json to be found here").is_none());
        assert!(extract_object("").is_none());
    }

    #[test]
    fn numeric_strings_are_accepted_for_number_fields() {
        let value = extract_object(r#"{"percentile": "62"}"#).expect("object");
        assert_eq!(number_field(&value, "percentile"), Some(62.0));
    }

    #[test]
    fn blank_strings_are_treated_as_absent() {
        let value = extract_object(r#"{"vision": "   "}"#).expect("object");
        assert_eq!(string_field(&value, "vision"), None);
    }

    #[test]
    fn string_lists_drop_blank_and_non_string_entries() {
        let value =
            extract_object(r#"{"strengths": ["clear", "", 7, "focused"]}"#).expect("object");
        assert_eq!(string_list_field(&value, "strengths"), vec!["clear", "focused"]);
    }
}
