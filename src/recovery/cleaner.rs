//! Limpieza de texto generado por el modelo
//!
//! El modelo devuelve JSON envuelto en ruido de formato: fences de markdown,
//! comentarios en cualquier sintaxis de código, concatenación de strings,
//! comas colgantes, claves sin comillas, literales de Python. Este módulo
//! aplica una tubería determinista e idempotente de pasos independientes que
//! produce la mejor aproximación a JSON canónico.
//!
//! La limpieza nunca falla: un patrón ambiguo se deja intacto y se delega al
//! reintento por capas del decoder.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `"a" + b + "c"` — identifier spliced between two string literals
    static ref CONCAT_MIDDLE: Regex =
        Regex::new(r#""\s*\+\s*([A-Za-z_$][A-Za-z0-9_.$]*)\s*\+\s*""#).unwrap();
    /// `"a" . $b . "c"` — PHP-style splice
    static ref CONCAT_MIDDLE_PHP: Regex =
        Regex::new(r#""\s*\.\s*\$?([A-Za-z_][A-Za-z0-9_]*)\s*\.\s*""#).unwrap();
    /// `"a" + b` — trailing identifier after a literal
    static ref CONCAT_TRAILING: Regex =
        Regex::new(r#""\s*\+\s*([A-Za-z_$][A-Za-z0-9_.$]*)"#).unwrap();
    /// `b + "c"` — leading identifier before a literal
    static ref CONCAT_LEADING: Regex =
        Regex::new(r#"([A-Za-z_$][A-Za-z0-9_.$]*)\s*\+\s*""#).unwrap();
    /// `"a" + "b"` — adjacent literals
    static ref CONCAT_LITERALS: Regex = Regex::new(r#""\s*[+.]\s*""#).unwrap();
    /// `"..{}..".format(x)` — drop the format call, keep the placeholders
    static ref FORMAT_CALL: Regex = Regex::new(r"\.format\([^)]*\)").unwrap();
    /// f-string / interpolation prefixes: f"...", f'...'
    static ref FSTRING_PREFIX: Regex = Regex::new(r#"\bf(["'])"#).unwrap();
    /// Trailing comma before a closing brace or bracket
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([}\]])").unwrap();
    /// Bare identifier key: `key:` after `{` or `,`
    static ref BARE_KEY: Regex =
        Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap();
    static ref LITERAL_NONE: Regex = Regex::new(r"\b(?:None|undefined|nil)\b").unwrap();
    static ref LITERAL_TRUE: Regex = Regex::new(r"\bTrue\b").unwrap();
    static ref LITERAL_FALSE: Regex = Regex::new(r"\bFalse\b").unwrap();
}

/// Run the full cleaning pipeline, in order. Each step is independent and
/// skips itself when its pattern is absent. Idempotent: cleaning already
/// clean text is a no-op.
pub fn clean(text: &str) -> String {
    let step = strip_code_fence(text);
    let step = strip_comments(&step);
    let step = collapse_concatenation(&step);
    let step = extract_object_bounds(&step);
    let step = TRAILING_COMMA.replace_all(&step, "$1").into_owned();
    let step = BARE_KEY.replace_all(&step, "$1\"$2\":").into_owned();
    let step = normalize_quotes(&step);
    map_literal_tokens(&step)
}

/// Strip a single outer fenced code block, language tag optional
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return text.to_string();
    }

    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        // Opening fence with no body
        None => return text.to_string(),
    };

    let body = without_open
        .strip_suffix("```")
        .map(str::trim_end)
        .unwrap_or(without_open);

    body.to_string()
}

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Code,
    InString(char),
    LineComment,
    BlockComment,
    HtmlComment,
}

/// Remove line and block comments in any common source syntax, outside of
/// string literals. Both quote styles open a string at this stage because
/// quote normalization has not run yet.
fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Code;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match state {
            ScanState::Code => {
                if c == '"' || c == '\'' {
                    state = ScanState::InString(c);
                    out.push(c);
                    i += 1;
                } else if c == '/' && chars.get(i + 1) == Some(&'/') {
                    state = ScanState::LineComment;
                    i += 2;
                } else if c == '/' && chars.get(i + 1) == Some(&'*') {
                    state = ScanState::BlockComment;
                    i += 2;
                } else if c == '#' {
                    state = ScanState::LineComment;
                    i += 1;
                } else if c == '-' && chars.get(i + 1) == Some(&'-') {
                    state = ScanState::LineComment;
                    i += 2;
                } else if c == '<' && chars.get(i + 1..i + 4) == Some(&['!', '-', '-']) {
                    state = ScanState::HtmlComment;
                    i += 4;
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            ScanState::InString(quote) => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    state = ScanState::Code;
                }
                i += 1;
            }
            ScanState::LineComment => {
                if c == '\n' {
                    state = ScanState::Code;
                    out.push(c);
                }
                i += 1;
            }
            ScanState::BlockComment => {
                if c == '*' && chars.get(i + 1) == Some(&'/') {
                    state = ScanState::Code;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            ScanState::HtmlComment => {
                if c == '-' && chars.get(i + 1..i + 3) == Some(&['-', '>']) {
                    state = ScanState::Code;
                    i += 3;
                } else {
                    i += 1;
                }
            }
        }
    }

    out
}

/// Collapse string-concatenation idioms into inline `{placeholder}`
/// interpolation so each field holds a single literal string.
fn collapse_concatenation(text: &str) -> String {
    let step = FSTRING_PREFIX.replace_all(text, "$1").into_owned();
    let step = FORMAT_CALL.replace_all(&step, "").into_owned();
    // Ruby interpolation already carries braces
    let step = step.replace("#{", "{");
    let step = CONCAT_MIDDLE.replace_all(&step, "{$1}").into_owned();
    let step = CONCAT_MIDDLE_PHP.replace_all(&step, "{$1}").into_owned();
    let step = CONCAT_LITERALS.replace_all(&step, "").into_owned();
    let step = CONCAT_TRAILING.replace_all(&step, "{$1}\"").into_owned();
    CONCAT_LEADING.replace_all(&step, "\"{$1}").into_owned()
}

/// Extract the substring between the first `{` and the last `}`; text without
/// an object boundary passes through unchanged.
fn extract_object_bounds(text: &str) -> String {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

/// Normalize single-quoted string literals to double-quoted ones.
///
/// This is the one stage that needs a real state machine: a regex cannot know
/// whether the scanner is inside a string or whether the previous character
/// was an escape. Single quotes inside an already-double-quoted string are
/// left alone; double quotes inside a single-quoted string become escaped.
fn normalize_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        match in_string {
            None => {
                if c == '\'' {
                    in_string = Some('\'');
                    out.push('"');
                } else {
                    if c == '"' {
                        in_string = Some('"');
                    }
                    out.push(c);
                }
            }
            Some('"') => {
                if escaped {
                    escaped = false;
                    out.push(c);
                } else if c == '\\' {
                    escaped = true;
                    out.push(c);
                } else {
                    if c == '"' {
                        in_string = None;
                    }
                    out.push(c);
                }
            }
            Some(_) => {
                // Inside a single-quoted string being rewritten
                if escaped {
                    escaped = false;
                    // \' needs no escape once the delimiter is "
                    if c == '\'' {
                        out.push('\'');
                    } else {
                        out.push('\\');
                        out.push(c);
                    }
                } else if c == '\\' {
                    escaped = true;
                } else if c == '\'' {
                    in_string = None;
                    out.push('"');
                } else if c == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push(c);
                }
            }
        }
    }

    out
}

/// Map bareword literals (`None`, `True`, `False`, `undefined`, `nil`) to
/// canonical JSON, only outside string literals.
fn map_literal_tokens(text: &str) -> String {
    map_outside_strings(text, |segment| {
        let step = LITERAL_NONE.replace_all(segment, "null").into_owned();
        let step = LITERAL_TRUE.replace_all(&step, "true").into_owned();
        LITERAL_FALSE.replace_all(&step, "false").into_owned()
    })
}

/// Apply `f` to every run of text outside double-quoted strings. Assumes
/// quote normalization has already run, so `"` is the only delimiter.
fn map_outside_strings<F>(text: &str, f: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut segment = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            out.push_str(&f(&segment));
            segment.clear();
            out.push(c);
            in_string = true;
        } else {
            segment.push(c);
        }
    }

    out.push_str(&f(&segment));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_with_language_tag() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_without_tag() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(clean(input), "{\"a\": 1}");
    }

    #[test]
    fn test_line_comments_removed() {
        let input = "{\n  \"a\": 1, // comment\n  \"b\": 2 # another\n}";
        let cleaned = clean(input);
        assert!(!cleaned.contains("comment"));
        assert!(!cleaned.contains("another"));
        assert!(cleaned.contains("\"a\": 1"));
    }

    #[test]
    fn test_block_comments_removed() {
        let input = "{ /* block */ \"a\": 1, <!-- html --> \"b\": 2 }";
        let cleaned = clean(input);
        assert!(!cleaned.contains("block"));
        assert!(!cleaned.contains("html"));
    }

    #[test]
    fn test_comment_markers_inside_strings_preserved() {
        let input = r#"{"url": "http://example.com", "note": "a -- b # c"}"#;
        let cleaned = clean(input);
        assert!(cleaned.contains("http://example.com"));
        assert!(cleaned.contains("a -- b # c"));
    }

    #[test]
    fn test_trailing_commas_removed() {
        let input = r#"{"a": [1, 2,], "b": 3,}"#;
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"a": [1, 2], "b": 3}"#);
    }

    #[test]
    fn test_bare_keys_quoted() {
        let input = "{score: 85, issues: []}";
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"score": 85, "issues": []}"#);
    }

    #[test]
    fn test_single_quotes_normalized() {
        let input = "{'name': 'it\\'s fine'}";
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"name": "it's fine"}"#);
    }

    #[test]
    fn test_single_quote_inside_double_quoted_untouched() {
        let input = r#"{"note": "don't touch"}"#;
        assert_eq!(clean(input), input);
    }

    #[test]
    fn test_double_quote_inside_single_quoted_escaped() {
        let input = r#"{'quote': 'he said "hi"'}"#;
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"quote": "he said \"hi\""}"#);
    }

    #[test]
    fn test_python_literals_mapped() {
        let input = "{\"a\": None, \"b\": True, \"c\": False}";
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"a": null, "b": true, "c": false}"#);
    }

    #[test]
    fn test_literal_words_inside_strings_preserved() {
        let input = r#"{"msg": "True None False"}"#;
        assert_eq!(clean(input), input);
    }

    #[test]
    fn test_concatenation_middle_collapsed() {
        let input = r#"{"msg": "table " + name + " is slow"}"#;
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"msg": "table {name} is slow"}"#);
    }

    #[test]
    fn test_fstring_prefix_dropped() {
        let input = r#"{"msg": f"index {idx} unused"}"#;
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"msg": "index {idx} unused"}"#);
    }

    #[test]
    fn test_ruby_interpolation_collapsed() {
        let input = r#"{"msg": "rows #{count} scanned"}"#;
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"msg": "rows {count} scanned"}"#);
    }

    #[test]
    fn test_format_call_dropped() {
        let input = r#"{"msg": "join on {}".format(col)}"#;
        let cleaned = clean(input);
        assert_eq!(cleaned, r#"{"msg": "join on {}"}"#);
    }

    #[test]
    fn test_surrounding_prose_trimmed() {
        let input = "Here is the analysis:\n{\"score\": 50}\nHope that helps!";
        assert_eq!(clean(input), "{\"score\": 50}");
    }

    #[test]
    fn test_no_braces_passthrough() {
        let input = "no object here";
        assert_eq!(clean(input), "no object here");
    }

    #[test]
    fn test_idempotent_on_clean_output() {
        let inputs = [
            "```json\n{score: 85, 'msg': 'fine',} // done\n```",
            "{\"a\": None, b: True,}",
            r#"{"msg": "x " + y + " z", nested: {'k': 1,},}"#,
        ];
        for input in inputs {
            let once = clean(input);
            let twice = clean(&once);
            assert_eq!(once, twice, "clean not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_fenced_unquoted_trailing_comma_combined() {
        let input = "```json\n{score: 85, confidence: 0.9, issues: [],}\n```";
        let cleaned = clean(input);
        let parsed: serde_json::Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(parsed["score"], 85);
        assert_eq!(parsed["confidence"], 0.9);
        assert!(parsed["issues"].as_array().unwrap().is_empty());
    }
}
