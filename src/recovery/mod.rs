//! Recuperación de resultados estructurados
//!
//! El modelo devuelve texto libre; este módulo lo convierte en un objeto
//! validado mediante cuatro etapas encadenadas:
//!
//! 1. [`adapter`] - normaliza el sobre de respuesta del proveedor
//! 2. [`cleaner`] - elimina el ruido de formato del texto
//! 3. [`decoder`] - decodifica con estrategias escalonadas
//! 4. [`repairer`] - último recurso: una ronda correctiva con el modelo
//!
//! Un fallo de decodificación no es fatal: se devuelve como
//! `DecodeResult { success: false }` para que el llamador decida entre
//! reparar, reintentar o usar un resultado por defecto.

pub mod adapter;
pub mod cleaner;
pub mod decoder;
pub mod repairer;
pub mod validation;

pub use adapter::{adapt, AdaptationError, AdaptedResponse, ResponseMetadata, ResponseShape};
pub use cleaner::clean;
pub use decoder::{decode, DecodeResult, DecodeStrategy};
pub use validation::{clamp, validate, ValidationIssue};

use crate::provider::TextGenerator;
use serde_json::Value;

/// Run the adapter and decoder over a raw provider response.
///
/// Adaptation failure (no text-bearing field at all) is the one fatal
/// condition and surfaces as an `Err`; everything downstream is reported
/// inside the [`DecodeResult`].
pub fn recover_structured(raw: &Value) -> Result<DecodeResult, AdaptationError> {
    let adapted = adapt(raw)?;
    Ok(decode(&adapted))
}

/// Full pipeline: adapt, decode, and on exhaustion run one corrective
/// round-trip through the collaborator.
pub async fn recover_structured_with_repair(
    raw: &Value,
    generator: &dyn TextGenerator,
) -> Result<DecodeResult, AdaptationError> {
    let adapted = adapt(raw)?;
    let result = decode(&adapted);

    if result.success {
        return Ok(result);
    }

    tracing::debug!("decoder exhausted, attempting model-driven repair");
    Ok(repairer::repair(&result, &adapted.text, generator).await)
}
