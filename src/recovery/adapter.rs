//! Raw response adapter
//!
//! Providers return their message envelope in slightly different shapes: a
//! plain string, `{content: "..."}`, `{content: {text: "..."}}`, or a
//! synonym key (`text`, `message`, `output`, `response`). This stage
//! normalizes all of them into one [`AdaptedResponse`] so no later stage has
//! to know which provider answered.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Keys that may carry the generated text, checked in order
const TEXT_KEYS: [&str; 5] = ["content", "text", "message", "output", "response"];

/// Adaptation errors
#[derive(Error, Debug)]
pub enum AdaptationError {
    #[error("No text-bearing field found in response (structure: {0})")]
    NoTextField(String),

    #[error("Empty response")]
    Empty,
}

/// How the text was located inside the raw envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// The whole response was a plain string
    PlainString,
    /// A top-level string field such as `content`
    ContentString,
    /// A nested object such as `{content: {text: ...}}`
    NestedText,
}

/// Metadata describing where the text came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Shape the adapter matched
    pub shape: ResponseShape,
    /// Confidence that the extracted text is the intended payload
    pub confidence: f32,
    /// Short summary of the raw structure, for logs
    pub raw_structure: String,
}

/// A normalized response, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptedResponse {
    pub text: String,
    pub metadata: ResponseMetadata,
}

/// Summarize a JSON value's structure without its contents
fn structure_summary(value: &Value) -> String {
    match value {
        Value::String(_) => "string".to_string(),
        Value::Object(map) => {
            let mut keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
            keys.sort_unstable();
            format!("object{{{}}}", keys.join(", "))
        }
        Value::Array(items) => format!("array[{}]", items.len()),
        Value::Number(_) => "number".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Look up a string under any known text key of an object
fn string_field(value: &Value) -> Option<&str> {
    TEXT_KEYS
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
}

/// Normalize a raw provider envelope into an [`AdaptedResponse`].
///
/// Pure function: at most one level of unwrap is attempted before giving up
/// with [`AdaptationError::NoTextField`].
pub fn adapt(raw: &Value) -> Result<AdaptedResponse, AdaptationError> {
    let raw_structure = structure_summary(raw);

    // Whole response is the text
    if let Some(text) = raw.as_str() {
        if text.trim().is_empty() {
            return Err(AdaptationError::Empty);
        }
        return Ok(AdaptedResponse {
            text: text.to_string(),
            metadata: ResponseMetadata {
                shape: ResponseShape::PlainString,
                confidence: 1.0,
                raw_structure,
            },
        });
    }

    // Top-level string field: {content: "..."} and synonyms
    if let Some(text) = string_field(raw) {
        return Ok(AdaptedResponse {
            text: text.to_string(),
            metadata: ResponseMetadata {
                shape: ResponseShape::ContentString,
                confidence: 0.95,
                raw_structure,
            },
        });
    }

    // One level of nesting: {content: {text: "..."}}
    for key in TEXT_KEYS {
        if let Some(inner) = raw.get(key) {
            if let Some(text) = string_field(inner) {
                return Ok(AdaptedResponse {
                    text: text.to_string(),
                    metadata: ResponseMetadata {
                        shape: ResponseShape::NestedText,
                        confidence: 0.85,
                        raw_structure,
                    },
                });
            }
        }
    }

    Err(AdaptationError::NoTextField(raw_structure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string() {
        let adapted = adapt(&json!("hello")).unwrap();
        assert_eq!(adapted.text, "hello");
        assert_eq!(adapted.metadata.shape, ResponseShape::PlainString);
        assert_eq!(adapted.metadata.confidence, 1.0);
    }

    #[test]
    fn test_content_string() {
        let adapted = adapt(&json!({"role": "assistant", "content": "answer"})).unwrap();
        assert_eq!(adapted.text, "answer");
        assert_eq!(adapted.metadata.shape, ResponseShape::ContentString);
    }

    #[test]
    fn test_nested_text() {
        let adapted = adapt(&json!({"content": {"text": "nested answer"}})).unwrap();
        assert_eq!(adapted.text, "nested answer");
        assert_eq!(adapted.metadata.shape, ResponseShape::NestedText);
    }

    #[test]
    fn test_synonym_keys() {
        let adapted = adapt(&json!({"output": "from output"})).unwrap();
        assert_eq!(adapted.text, "from output");
    }

    #[test]
    fn test_no_text_field() {
        let err = adapt(&json!({"usage": {"tokens": 12}})).unwrap_err();
        assert!(matches!(err, AdaptationError::NoTextField(_)));
        assert!(err.to_string().contains("usage"));
    }

    #[test]
    fn test_empty_string_rejected() {
        assert!(matches!(adapt(&json!("   ")), Err(AdaptationError::Empty)));
    }

    #[test]
    fn test_structure_summary_sorted_keys() {
        let summary = structure_summary(&json!({"b": 1, "a": 2}));
        assert_eq!(summary, "object{a, b}");
    }
}
