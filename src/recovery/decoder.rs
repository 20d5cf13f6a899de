//! Structured decoder with layered fallback strategies
//!
//! Decoding is an ordered list of pure `text -> Result` attempts, evaluated
//! with short-circuit on first success. Each strategy carries a fixed
//! confidence, scaled by the adapter's own confidence in the extracted text.

use super::adapter::AdaptedResponse;
use super::cleaner::clean;
use super::validation::{validate, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One candidate decoding attempt, in escalation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// Parse the adapted text as-is
    Direct,
    /// Parse the cleaner's output
    Cleaned,
    /// Parse the cleaner's output after escaping raw control characters
    RepairedChars,
    /// Result came from a corrective model round-trip
    Repaired,
}

impl DecodeStrategy {
    /// Quality score for a result obtained through this strategy
    pub fn confidence(&self) -> f32 {
        match self {
            DecodeStrategy::Direct => 0.95,
            DecodeStrategy::Cleaned => 0.75,
            DecodeStrategy::RepairedChars => 0.60,
            DecodeStrategy::Repaired => 0.50,
        }
    }
}

/// Outcome of a decode attempt. Consumed once; not retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeResult {
    pub success: bool,
    pub data: Option<Value>,
    /// Strategy that produced `data`, when successful
    pub strategy: Option<DecodeStrategy>,
    pub confidence: f32,
    pub error: Option<String>,
    /// Repairs made by field validation
    pub validation_issues: Vec<ValidationIssue>,
    /// Strategies tried, in order, for instrumentation
    pub attempted: Vec<DecodeStrategy>,
}

impl DecodeResult {
    pub fn failure(error: impl Into<String>, attempted: Vec<DecodeStrategy>) -> Self {
        Self {
            success: false,
            data: None,
            strategy: None,
            confidence: 0.0,
            error: Some(error.into()),
            validation_issues: Vec::new(),
            attempted,
        }
    }
}

/// Parse candidate text as a canonical object. Scalars and arrays are not
/// acceptable analysis payloads, so they count as strategy failures.
fn parse_object(text: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(format!("expected object, got {}", type_name(&value)))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Null => "null",
    }
}

/// Escape raw control characters that appear inside string literals.
///
/// Already-escaped sequences are protected with placeholder bytes first and
/// restored afterwards, so `\n` in the input stays `\n` instead of becoming
/// `\\n`. Control characters between tokens (pretty-printing) are legal JSON
/// and left alone.
pub fn escape_control_chars(text: &str) -> String {
    const P_BACKSLASH: char = '\u{1}';
    const P_NEWLINE: char = '\u{2}';
    const P_TAB: char = '\u{3}';
    const P_RETURN: char = '\u{4}';
    const P_QUOTE: char = '\u{5}';

    let protected = text
        .replace("\\\\", &P_BACKSLASH.to_string())
        .replace("\\n", &P_NEWLINE.to_string())
        .replace("\\t", &P_TAB.to_string())
        .replace("\\r", &P_RETURN.to_string())
        .replace("\\\"", &P_QUOTE.to_string());

    let mut out = String::with_capacity(protected.len());
    let mut in_string = false;

    for c in protected.chars() {
        if in_string {
            match c {
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out.replace(P_QUOTE, "\\\"")
        .replace(P_RETURN, "\\r")
        .replace(P_TAB, "\\t")
        .replace(P_NEWLINE, "\\n")
        .replace(P_BACKSLASH, "\\\\")
}

/// Decode an adapted response by escalating through the strategy list,
/// stopping at the first success. Exhaustion is reported as an unsuccessful
/// result, not an error: the caller decides whether to invoke repair.
pub fn decode(adapted: &AdaptedResponse) -> DecodeResult {
    let strategies: [(DecodeStrategy, fn(&str) -> String); 3] = [
        (DecodeStrategy::Direct, |t| t.to_string()),
        (DecodeStrategy::Cleaned, |t| clean(t)),
        (DecodeStrategy::RepairedChars, |t| {
            escape_control_chars(&clean(t))
        }),
    ];

    let mut attempted = Vec::new();
    let mut last_error = String::new();

    for (strategy, prepare) in strategies {
        attempted.push(strategy);
        let candidate = prepare(&adapted.text);

        match parse_object(&candidate) {
            Ok(mut data) => {
                let validation_issues = validate(&mut data);
                return DecodeResult {
                    success: true,
                    data: Some(data),
                    strategy: Some(strategy),
                    confidence: strategy.confidence() * adapted.metadata.confidence,
                    error: None,
                    validation_issues,
                    attempted,
                };
            }
            Err(e) => {
                tracing::debug!(strategy = ?strategy, error = %e, "decode strategy failed");
                last_error = e;
            }
        }
    }

    DecodeResult::failure(
        format!("all decode strategies exhausted: {}", last_error),
        attempted,
    )
}
