//! Prompt builders for analysis dimensions and JSON repair
//!
//! Prompts are deliberately compact: the recovery pipeline tolerates sloppy
//! output, so the system prompt focuses on what to analyze rather than on
//! exhaustive formatting rules.

use crate::provider::ChatMessage;

/// System prompt shared by every analysis dimension
const ANALYST_SYSTEM: &str = "You are a senior SQL reviewer. \
Respond with a single JSON object and nothing else: no prose, no markdown \
fences, no comments. Keys: score (0-100), confidence (0-1), issues (array \
of strings), summary (string).";

/// Build the request for one analysis dimension
pub fn build_dimension_prompt(focus: &str, sql: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANALYST_SYSTEM),
        ChatMessage::user(format!(
            "Analyze the following SQL for {}.\n\nSQL:\n{}",
            focus, sql
        )),
    ]
}

/// Build the corrective follow-up for malformed model output.
///
/// Sent exactly once per failed decode; the retry policy lives in the
/// resilience layer, not here.
pub fn build_repair_prompt(malformed: &str, error: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You fix malformed JSON. Respond with the corrected JSON object \
             only, no explanation, no markdown fences.",
        ),
        ChatMessage::user(format!(
            "The following text was supposed to be a JSON object but failed \
             to parse ({}).\n\nReformat it as valid JSON, preserving every \
             field and value:\n\n{}",
            error, malformed
        )),
    ]
}
