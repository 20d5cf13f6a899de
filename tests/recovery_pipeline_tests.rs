//! Tests de integración del pipeline de recuperación
//!
//! Ejercitan la cadena completa adaptador -> limpiador -> decodificador ->
//! validación sobre respuestas realistas de distintos proveedores, con el
//! ruido de formato que los modelos producen en la práctica.

use serde_json::json;
use sqlsage::recovery::{adapt, clean, decode, recover_structured, DecodeStrategy};

/// Respuesta estilo OpenAI con JSON limpio: estrategia directa
#[test]
fn test_openai_shape_clean_json() {
    let raw = json!({
        "content": "{\"score\": 72, \"confidence\": 0.85, \"issues\": [\"missing index\"], \"summary\": \"ok\"}"
    });

    let result = recover_structured(&raw).unwrap();

    assert!(result.success);
    assert_eq!(result.strategy, Some(DecodeStrategy::Direct));
    let data = result.data.unwrap();
    assert_eq!(data["score"], 72);
    assert_eq!(data["issues"][0], "missing index");
}

/// Respuesta envuelta en fences con claves sin comillas y coma colgante
#[test]
fn test_noisy_markdown_response() {
    let raw = json!({
        "message": {
            "content": "Here is the analysis:\n```json\n{score: 85, confidence: 0.9, issues: [],}\n```"
        }
    });

    let result = recover_structured(&raw).unwrap();

    assert!(result.success);
    assert_eq!(result.strategy, Some(DecodeStrategy::Cleaned));
    let data = result.data.unwrap();
    assert_eq!(data["score"], 85);
    assert_eq!(data["issues"], json!([]));
}

/// Salida con restos de concatenación y literales de otro lenguaje
#[test]
fn test_python_flavoured_output() {
    let raw = json!({
        "text": "{'score': 40, 'confidence': 0.5, 'issues': None, 'summary': 'weak', 'cacheable': True}"
    });

    let result = recover_structured(&raw).unwrap();

    assert!(result.success);
    let data = result.data.unwrap();
    assert_eq!(data["cacheable"], true);
    // issues es un campo de lista: null se convierte en lista vacía
    assert_eq!(data["issues"], json!([]));
}

/// Saltos de línea crudos dentro de una cadena requieren la tercera estrategia
#[test]
fn test_raw_control_chars_in_string() {
    let raw = json!({
        "content": "{\"score\": 10, \"summary\": \"line one\nline two\"}"
    });

    let result = recover_structured(&raw).unwrap();

    assert!(result.success);
    assert_eq!(result.strategy, Some(DecodeStrategy::RepairedChars));
    assert_eq!(result.data.unwrap()["summary"], "line one\nline two");
}

/// Valores fuera de rango se recortan, nunca se rechazan
#[test]
fn test_out_of_range_values_clamped() {
    let raw = json!({
        "content": "{\"score\": 250, \"confidence\": -3.5, \"issues\": []}"
    });

    let result = recover_structured(&raw).unwrap();

    assert!(result.success);
    let data = result.data.unwrap();
    assert_eq!(data["score"], 100.0);
    assert_eq!(data["confidence"], 0.0);
    assert_eq!(result.validation_issues.len(), 2);
}

/// La confianza refleja tanto la estrategia como la forma de la respuesta
#[test]
fn test_confidence_scales_with_shape() {
    let plain = json!("{\"score\": 50, \"issues\": []}");
    let nested = json!({"message": {"content": "{\"score\": 50, \"issues\": []}"}});

    let from_plain = recover_structured(&plain).unwrap();
    let from_nested = recover_structured(&nested).unwrap();

    assert!(from_plain.success && from_nested.success);
    assert!(from_plain.confidence > from_nested.confidence);
}

/// El limpiador es idempotente sobre su propia salida
#[test]
fn test_cleaner_idempotent_over_noisy_corpus() {
    let samples = [
        "```json\n{score: 1,}\n```",
        "{'a': 'it\\'s', \"b\": None} // trailing",
        "prefix { \"a\" : 1 , } suffix",
        "{\"joined\": \"a\" + \"b\", c: True}",
    ];

    for sample in samples {
        let once = clean(sample);
        let twice = clean(&once);
        assert_eq!(once, twice, "cleaner not idempotent for {:?}", sample);
    }
}

/// Para texto bien formado, limpiar antes de decodificar no cambia el resultado
#[test]
fn test_decode_agrees_with_cleaned_decode() {
    let well_formed = "{\"score\": 66, \"confidence\": 0.4, \"issues\": [\"x\"]}";

    let direct = decode(&adapt(&json!(well_formed)).unwrap());
    let cleaned = decode(&adapt(&json!(clean(well_formed))).unwrap());

    assert_eq!(direct.data, cleaned.data);
}

/// Un sobre sin campo de texto reconocible es el único fallo fatal
#[test]
fn test_unrecognized_envelope_is_fatal() {
    let raw = json!({"usage": {"total_tokens": 12}, "id": "resp_1"});
    assert!(recover_structured(&raw).is_err());
}

/// El agotamiento de estrategias se informa, no se lanza
#[test]
fn test_exhaustion_reports_all_attempts() {
    let raw = json!({"content": "I could not analyze this query, sorry."});

    let result = recover_structured(&raw).unwrap();

    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(
        result.attempted,
        vec![
            DecodeStrategy::Direct,
            DecodeStrategy::Cleaned,
            DecodeStrategy::RepairedChars,
        ]
    );
}
