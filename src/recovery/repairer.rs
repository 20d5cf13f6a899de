//! LLM-driven repair of undecodable output
//!
//! Invoked only after every decoder strategy has failed. Builds one
//! corrective follow-up request containing the malformed text, invokes the
//! collaborator exactly once, and feeds the new output back through the
//! adapter and decoder. Retry policy belongs to the resilience layer and is
//! not duplicated here.

use super::adapter::adapt;
use super::decoder::{decode, DecodeResult, DecodeStrategy};
use crate::prompts::build_repair_prompt;
use crate::provider::{GenerationOptions, TextGenerator};

/// Ask the model to reformat its own malformed output, then re-run the
/// decode pipeline on the answer.
///
/// Never panics and never propagates an error past this boundary: any
/// failure (provider, adaptation of the new output, decode) comes back as an
/// unsuccessful [`DecodeResult`], leaving the fallback decision to the
/// caller.
pub async fn repair(
    failed: &DecodeResult,
    original_text: &str,
    generator: &dyn TextGenerator,
) -> DecodeResult {
    let error = failed.error.as_deref().unwrap_or("unknown decode failure");
    let messages = build_repair_prompt(original_text, error);

    // Low temperature: we want reformatting, not creativity
    let options = GenerationOptions {
        temperature: Some(0.0),
        max_tokens: None,
    };

    let raw = match generator.invoke(&messages, &options).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "repair invocation failed");
            return DecodeResult::failure(
                format!("repair invocation failed: {}", e),
                failed.attempted.clone(),
            );
        }
    };

    let adapted = match adapt(&raw) {
        Ok(adapted) => adapted,
        Err(e) => {
            return DecodeResult::failure(
                format!("repair produced an unreadable response: {}", e),
                failed.attempted.clone(),
            );
        }
    };

    let mut result = decode(&adapted);
    if result.success {
        tracing::info!(strategy = ?result.strategy, "repair recovered a structured result");
        // The result only exists because of the corrective round-trip
        result.strategy = Some(DecodeStrategy::Repaired);
        result.confidence = DecodeStrategy::Repaired.confidence();
    } else {
        result.error = result
            .error
            .map(|e| format!("repair output still undecodable: {}", e));
    }

    result
}
