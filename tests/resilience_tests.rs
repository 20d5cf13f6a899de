//! Tests de integración de la capa de resiliencia
//!
//! Verifican el contrato completo del ejecutor: cota de reintentos,
//! clasificación que decide el reintento, transiciones del circuit breaker
//! y registros de operación.

use sqlsage::config::{BreakerConfig, ResilienceConfig};
use sqlsage::errors::classify;
use sqlsage::resilience::{BreakerState, OperationStatus, ResilientExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn fast_resilience(max_retries: usize) -> ResilienceConfig {
    ResilienceConfig {
        operation_timeout_secs: 5,
        max_retries,
        retry_delay_ms: 1,
        record_retention_secs: 600,
    }
}

fn lenient_breaker() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 100,
        success_threshold: 1,
        recovery_timeout_secs: 30,
    }
}

/// El trabajo se invoca como máximo max_retries veces
#[tokio::test]
async fn test_retry_bound_is_hard() {
    let executor = ResilientExecutor::new(fast_resilience(4), lenient_breaker());
    let options = executor.options("bounded");
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_ref = calls.clone();
    let result: Result<(), _> = executor
        .execute(&options, move |_token| {
            let calls = calls_ref.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("ETIMEDOUT while contacting provider")
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

/// Un error de validación no consume reintentos
#[tokio::test]
async fn test_validation_error_never_retried() {
    let executor = ResilientExecutor::new(fast_resilience(4), lenient_breaker());
    let options = executor.options("validation");
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_ref = calls.clone();
    let result: Result<(), _> = executor
        .execute(&options, move |_token| {
            let calls = calls_ref.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("validation failed: empty statement")
            }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!err.classification.retryable);
}

/// Secuencia completa del breaker: Closed -> Open -> HalfOpen -> Closed
#[tokio::test]
async fn test_breaker_full_transition_sequence() {
    let executor = ResilientExecutor::new(
        fast_resilience(1),
        BreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            recovery_timeout_secs: 0,
        },
    );
    let options = executor.options("cycling");

    // Dos fallos consecutivos abren el circuito
    for _ in 0..2 {
        let _ = executor
            .execute(&options, |_t| async {
                anyhow::bail!("connection refused") as anyhow::Result<()>
            })
            .await;
    }
    assert_eq!(executor.breakers().state("cycling"), BreakerState::Open);

    // Con recovery_timeout 0 la siguiente llamada es la sonda, y al tener
    // éxito el circuito vuelve a cerrarse
    let probe = executor
        .execute(&options, |_t| async { Ok::<_, anyhow::Error>(1) })
        .await;

    assert_eq!(probe.unwrap(), 1);
    assert_eq!(executor.breakers().state("cycling"), BreakerState::Closed);
}

/// Mientras el circuito está abierto, el trabajo nunca se invoca
#[tokio::test]
async fn test_open_breaker_short_circuits() {
    let executor = ResilientExecutor::new(
        fast_resilience(1),
        BreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            recovery_timeout_secs: 3600,
        },
    );
    let options = executor.options("tripped");

    let _ = executor
        .execute(&options, |_t| async {
            anyhow::bail!("connection refused") as anyhow::Result<()>
        })
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let calls_ref = calls.clone();
        let result: Result<(), _> = executor
            .execute(&options, move |_t| {
                let calls = calls_ref.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        assert!(result.is_err());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// El fallback convierte el agotamiento de reintentos en un resultado
#[tokio::test]
async fn test_fallback_returns_default() {
    let executor = ResilientExecutor::new(fast_resilience(2), lenient_breaker());
    let options = executor.options("degradable");

    let result = executor
        .execute_with_fallback(
            &options,
            |_t| async { anyhow::bail!("connection reset by peer") as anyhow::Result<String> },
            || "default".to_string(),
        )
        .await;

    assert_eq!(result.unwrap(), "default");
}

/// El timeout dispara el token y marca el registro como Timeout
#[tokio::test]
async fn test_timeout_marks_record() {
    let executor = ResilientExecutor::new(fast_resilience(1), lenient_breaker());
    let options = executor
        .options("stuck")
        .with_timeout(Duration::from_millis(10));

    let result: Result<(), _> = executor
        .execute(&options, |token| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(()),
                _ = token.cancelled() => anyhow::bail!("cancelled"),
            }
        })
        .await;

    assert!(result.is_err());
    let records = executor.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, OperationStatus::Timeout);
    assert!(records[0].completed_at.is_some());
}

/// Los registros de operaciones completadas quedan consultables
#[tokio::test]
async fn test_records_track_attempts() {
    let executor = ResilientExecutor::new(fast_resilience(3), lenient_breaker());
    let options = executor.options("flaky");
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_ref = calls.clone();
    let result = executor
        .execute(&options, move |_t| {
            let calls = calls_ref.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("connection refused")
                }
                Ok(42)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    let records = executor.records();
    assert_eq!(records[0].status, OperationStatus::Completed);
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].name, "flaky");
}

/// La clasificación de un rechazo de conexión es reintentable y de severidad alta
#[test]
fn test_refused_connection_classification() {
    let classification = classify(
        "connect ECONNREFUSED 127.0.0.1:11434",
        Some("ECONNREFUSED"),
        Some("analyze_syntax"),
    );

    assert!(classification.retryable);
    assert!(classification.technical_message.contains("analyze_syntax"));
}
