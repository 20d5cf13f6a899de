//! Ejecución resiliente de unidades de trabajo
//!
//! Envuelve cualquier operación asíncrona con timeout, reintentos acotados
//! con backoff exponencial más jitter, circuit breaking y fallback opcional.
//! La decisión de reintentar la toma la clasificación del error, no el
//! llamador.

use super::breaker::BreakerRegistry;
use crate::config::{BreakerConfig, ResilienceConfig};
use crate::errors::{classify, classify_error, ErrorClassification, RecoveryAction};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Maximum backoff delay regardless of attempt count
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Status of one submitted unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

/// Record of one submitted unit of work, retained for a configurable window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub name: String,
    pub status: OperationStatus,
    pub attempts: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-call execution options
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Name used for the circuit breaker and the operation record
    pub operation_name: String,
    /// Overall deadline for a single attempt
    pub timeout: Duration,
    /// Maximum invocations of the unit of work
    pub max_retries: usize,
    /// Base delay for exponential backoff
    pub retry_delay: Duration,
}

impl ExecutionOptions {
    pub fn new(operation_name: impl Into<String>, config: &ResilienceConfig) -> Self {
        Self {
            operation_name: operation_name.into(),
            timeout: Duration::from_secs(config.operation_timeout_secs),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Error enriched with the last classification seen by the retry loop
#[derive(Error, Debug)]
#[error("operation '{operation}' failed after {attempts} attempt(s): {}", classification.user_message)]
pub struct EnrichedError {
    pub operation: String,
    pub attempts: usize,
    pub classification: ErrorClassification,
}

/// Executor owning the breaker registry and the operation records.
///
/// Created once at process start and shared; all mutable state lives here,
/// never in module-level globals.
pub struct ResilientExecutor {
    defaults: ResilienceConfig,
    breakers: BreakerRegistry,
    records: Mutex<HashMap<Uuid, OperationRecord>>,
    retention: Duration,
}

impl ResilientExecutor {
    pub fn new(resilience: ResilienceConfig, breaker: BreakerConfig) -> Self {
        let retention = Duration::from_secs(resilience.record_retention_secs);
        Self {
            defaults: resilience,
            breakers: BreakerRegistry::new(breaker),
            records: Mutex::new(HashMap::new()),
            retention,
        }
    }

    pub fn options(&self, operation_name: impl Into<String>) -> ExecutionOptions {
        ExecutionOptions::new(operation_name, &self.defaults)
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Execute a unit of work under timeout, bounded retry and the named
    /// circuit breaker.
    ///
    /// The work receives a [`CancellationToken`]. On timeout the race drops
    /// the work future, which aborts anything the future was driving
    /// directly; the token is cancelled as well so inner tasks the work may
    /// have spawned, which survive the drop, can stop their in-flight calls.
    /// A spawned task that ignores the token keeps running until its
    /// transport's own timeout fires, a documented leak risk rather than
    /// something forcibly terminated here.
    ///
    /// Within one call, attempts are strictly sequential: attempt N+1 never
    /// starts before attempt N's outcome is known.
    pub async fn execute<T, F, Fut>(
        &self,
        options: &ExecutionOptions,
        work: F,
    ) -> Result<T, EnrichedError>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.sweep_expired_records();

        let record_id = self.register(&options.operation_name);

        if let Err(e) = self.breakers.acquire(&options.operation_name) {
            self.finish(record_id, OperationStatus::Cancelled, 0);
            return Err(EnrichedError {
                operation: options.operation_name.clone(),
                attempts: 0,
                classification: classify(&e.to_string(), None, Some("circuit breaker")),
            });
        }

        let mut last_classification: Option<ErrorClassification> = None;

        for attempt in 1..=options.max_retries {
            self.mark_running(record_id, attempt);

            let token = CancellationToken::new();
            let outcome = timeout(options.timeout, work(token.clone())).await;

            match outcome {
                Ok(Ok(value)) => {
                    self.breakers.record_success(&options.operation_name);
                    self.finish(record_id, OperationStatus::Completed, attempt);
                    return Ok(value);
                }
                Ok(Err(error)) => {
                    self.breakers.record_failure(&options.operation_name);
                    let classification =
                        classify_error(&error, Some(&options.operation_name));

                    // Console gets the redacted message; the file log keeps
                    // the technical one
                    tracing::warn!(
                        operation = %options.operation_name,
                        attempt,
                        kind = ?classification.kind,
                        retryable = classification.retryable,
                        "attempt failed: {}",
                        classification.user_message
                    );
                    crate::logging::log_failure(&options.operation_name, &classification);

                    let should_retry = classification.retryable
                        && classification.action == RecoveryAction::Retry
                        && attempt < options.max_retries;

                    if !should_retry {
                        self.finish(record_id, OperationStatus::Failed, attempt);
                        return Err(EnrichedError {
                            operation: options.operation_name.clone(),
                            attempts: attempt,
                            classification,
                        });
                    }

                    let delay = classification
                        .retry_delay
                        .unwrap_or_else(|| backoff_delay(attempt, options.retry_delay));
                    last_classification = Some(classification);
                    sleep(with_jitter(delay)).await;
                }
                Err(_elapsed) => {
                    // The work future is already dropped by the timeout race;
                    // this only reaches tasks the work spawned
                    token.cancel();
                    self.breakers.record_failure(&options.operation_name);

                    let classification = classify(
                        &format!(
                            "operation timed out after {}s",
                            options.timeout.as_secs_f64()
                        ),
                        None,
                        Some(&options.operation_name),
                    );
                    crate::logging::log_failure(&options.operation_name, &classification);

                    if attempt >= options.max_retries {
                        self.finish(record_id, OperationStatus::Timeout, attempt);
                        return Err(EnrichedError {
                            operation: options.operation_name.clone(),
                            attempts: attempt,
                            classification,
                        });
                    }

                    let delay = backoff_delay(attempt, options.retry_delay);
                    last_classification = Some(classification);
                    sleep(with_jitter(delay)).await;
                }
            }
        }

        // Reachable only when max_retries is 0
        self.finish(record_id, OperationStatus::Failed, 0);
        Err(EnrichedError {
            operation: options.operation_name.clone(),
            attempts: 0,
            classification: last_classification.unwrap_or_else(|| {
                classify("operation not attempted: max_retries is 0", None, None)
            }),
        })
    }

    /// Like [`execute`](Self::execute), but fall back to the caller-supplied
    /// default instead of surfacing retryable-but-exhausted failures.
    /// Fail-fast classifications still surface: retrying or defaulting
    /// cannot fix a structurally invalid input or a broken setup.
    pub async fn execute_with_fallback<T, F, Fut>(
        &self,
        options: &ExecutionOptions,
        work: F,
        fallback: impl FnOnce() -> T,
    ) -> Result<T, EnrichedError>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.execute(options, work).await {
            Ok(value) => Ok(value),
            Err(e)
                if matches!(
                    e.classification.action,
                    RecoveryAction::FailFast | RecoveryAction::UserIntervention
                ) =>
            {
                Err(e)
            }
            Err(e) => {
                tracing::info!(
                    operation = %e.operation,
                    "falling back to default result after {} attempt(s)",
                    e.attempts
                );
                Ok(fallback())
            }
        }
    }

    // ------------------------------------------------------------------
    // Operation records
    // ------------------------------------------------------------------

    fn register(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let record = OperationRecord {
            id,
            name: name.to_string(),
            status: OperationStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        self.records.lock().unwrap().insert(id, record);
        id
    }

    fn mark_running(&self, id: Uuid, attempt: usize) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = OperationStatus::Running;
            record.attempts = attempt;
            if record.started_at.is_none() {
                record.started_at = Some(Utc::now());
            }
        }
    }

    fn finish(&self, id: Uuid, status: OperationStatus, attempts: usize) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = status;
            record.attempts = attempts;
            record.completed_at = Some(Utc::now());
        }
    }

    fn sweep_expired_records(&self) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::zero());
        self.records.lock().unwrap().retain(|_, record| {
            record
                .completed_at
                .map(|done| done > cutoff)
                .unwrap_or(true)
        });
    }

    /// Snapshot of the retained operation records
    pub fn records(&self) -> Vec<OperationRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    /// Test hook: drop all records and breaker state
    pub fn reset(&self) {
        self.records.lock().unwrap().clear();
        self.breakers.reset();
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped
fn backoff_delay(attempt: usize, base: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1) as u32);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Add up to 50% random jitter so simultaneous retries do not align
fn with_jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let max_jitter = delay.as_secs_f64() / 2.0;
    let jitter = rand::thread_rng().gen_range(0.0..max_jitter);
    delay + Duration::from_secs_f64(jitter)
}
