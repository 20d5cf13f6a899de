//! Field validation for decoded analysis objects
//!
//! The policy is always-repair-don't-reject: out-of-range numbers are
//! clamped, numeric strings are parsed, non-coercible values fall to the
//! range minimum, and null list fields become empty lists. Every fix is
//! recorded as a [`ValidationIssue`]; an issue never fails the decode.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// List-valued fields that default to `[]` when missing or null
const LIST_FIELDS: [&str; 5] = [
    "issues",
    "suggestions",
    "recommendations",
    "warnings",
    "errors",
];

/// A field repaired during validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the repaired field
    pub field: String,
    /// Declared numeric range, `(min, max)`
    pub expected_range: (f64, f64),
    /// Original value, serialized for logs
    pub actual_value: String,
}

/// Clamp `v` into `[min, max]`; identity when already in range
pub fn clamp(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}

/// Declared range for a field name, if it is numeric-by-convention
fn declared_range(key: &str) -> Option<(f64, f64)> {
    let lower = key.to_lowercase();
    if lower.contains("confidence") {
        Some((0.0, 1.0))
    } else if lower.contains("score") {
        Some((0.0, 100.0))
    } else {
        None
    }
}

/// Coerce a JSON value into an f64: numbers pass through, numeric strings
/// are parsed, everything else is rejected.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn push_issue(issues: &mut Vec<ValidationIssue>, path: &str, range: (f64, f64), value: &Value) {
    issues.push(ValidationIssue {
        field: path.to_string(),
        expected_range: range,
        actual_value: value.to_string(),
    });
}

fn validate_node(value: &mut Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };

                if let Some(range) = declared_range(key) {
                    match coerce_number(child) {
                        Some(n) => {
                            let clamped = clamp(n, range.0, range.1);
                            if clamped != n || !child.is_number() {
                                push_issue(issues, &child_path, range, child);
                                *child = json!(clamped);
                            }
                        }
                        None => {
                            push_issue(issues, &child_path, range, child);
                            *child = json!(range.0);
                        }
                    }
                    continue;
                }

                if child.is_null() && LIST_FIELDS.contains(&key.to_lowercase().as_str()) {
                    push_issue(issues, &child_path, (0.0, 0.0), child);
                    *child = json!([]);
                    continue;
                }

                validate_node(child, &child_path, issues);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter_mut().enumerate() {
                let child_path = format!("{}[{}]", path, idx);
                validate_node(item, &child_path, issues);
            }
        }
        _ => {}
    }
}

/// Validate a decoded object in place, returning the repairs made
pub fn validate(value: &mut Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    validate_node(value, "", &mut issues);
    issues
}
