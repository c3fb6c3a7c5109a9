//! Normalisation of the JSON documents stored in articles, roadmaps and mindmaps.
//!
//! Document bodies are opaque to the backend. The only structural rule is that
//! what gets stored is valid JSON.

use serde_json::{Value, json};

/// A rich-text document with a single paragraph holding `text`.
pub fn paragraph_doc(text: &str) -> Value {
    json!({
        "type": "doc",
        "content": [
            { "type": "paragraph", "content": [{ "type": "text", "text": text }] }
        ]
    })
}

pub fn empty_doc() -> Value {
    json!({ "type": "doc", "content": [] })
}

/// Default body of a tag article: the tag name as a heading followed by its
/// description.
pub fn tag_article_doc(name: &str, description: &str) -> Value {
    json!({
        "type": "doc",
        "content": [
            {
                "type": "heading",
                "attrs": { "level": 1 },
                "content": [{ "type": "text", "text": name }]
            },
            { "type": "paragraph", "content": [{ "type": "text", "text": description }] }
        ]
    })
}

/// Whether a submitted body counts as missing: null, or an empty string,
/// object or array.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Article bodies accept a JSON object, a string holding JSON, or plain text,
/// which is wrapped into a one-paragraph document.
pub fn normalize_rich_text(value: Value) -> Value {
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => paragraph_doc(&text),
        },
        object @ Value::Object(_) => object,
        _ => empty_doc(),
    }
}

/// Roadmap and mindmap bodies must be JSON; a string is parsed as JSON text.
pub fn parse_document(value: Value) -> Result<Value, String> {
    match value {
        Value::String(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| format!("Content is not valid JSON: {e}")),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_wrapped() {
        let doc = normalize_rich_text(Value::String("hello world".into()));
        assert_eq!(doc, paragraph_doc("hello world"));
        assert_eq!(doc["content"][0]["content"][0]["text"], "hello world");
    }

    #[test]
    fn test_json_string_is_parsed() {
        let doc = normalize_rich_text(Value::String(r#"{"type":"doc","content":[]}"#.into()));
        assert_eq!(doc, empty_doc());
    }

    #[test]
    fn test_json_scalar_string_is_treated_as_text() {
        let doc = normalize_rich_text(Value::String("42".into()));
        assert_eq!(doc, paragraph_doc("42"));
    }

    #[test]
    fn test_non_document_values_become_empty_doc() {
        assert_eq!(normalize_rich_text(json!([1, 2])), empty_doc());
        assert_eq!(normalize_rich_text(json!(true)), empty_doc());
    }

    #[test]
    fn test_blank_detection() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("  ")));
        assert!(is_blank(&json!({})));
        assert!(is_blank(&json!([])));
        assert!(!is_blank(&json!({"nodes": []})));
        assert!(!is_blank(&json!(0)));
    }

    #[test]
    fn test_parse_document() {
        assert_eq!(parse_document(json!({"a": 1})).unwrap(), json!({"a": 1}));
        assert_eq!(parse_document(json!(r#"{"a": 1}"#)).unwrap(), json!({"a": 1}));
        assert!(parse_document(json!("{not json")).is_err());
    }

    #[test]
    fn test_tag_article_doc_shape() {
        let doc = tag_article_doc("Rust", "Systems language");
        assert_eq!(doc["content"][0]["type"], "heading");
        assert_eq!(doc["content"][0]["content"][0]["text"], "Rust");
        assert_eq!(doc["content"][1]["content"][0]["text"], "Systems language");
    }
}
