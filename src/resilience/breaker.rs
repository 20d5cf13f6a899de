//! Circuit breaker per named operation
//!
//! Protects the provider from being hammered while it is failing. States:
//! `Closed -> Open -> HalfOpen -> Closed`. The registry is the only
//! cross-call mutable state in the crate and sits behind a mutex because
//! parallel dimension runs may share one operation name.

use crate::config::BreakerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BreakerError {
    #[error("circuit breaker '{name}' is open, retry in {remaining_ms}ms")]
    Open { name: String, remaining_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker for one named operation
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: usize,
    success_threshold: usize,
    recovery_timeout: Duration,
    consecutive_failures: usize,
    consecutive_successes: usize,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(
        failure_threshold: usize,
        success_threshold: usize,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_threshold,
            success_threshold,
            recovery_timeout,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Ask permission to run. While open, calls are rejected without
    /// invoking the work; after the recovery timeout one probe is let
    /// through in half-open.
    pub fn acquire(&mut self, name: &str) -> Result<(), BreakerError> {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(self.recovery_timeout);

                if elapsed >= self.recovery_timeout {
                    tracing::info!(operation = name, "circuit breaker half-open, probing");
                    self.state = BreakerState::HalfOpen;
                    self.consecutive_successes = 0;
                    Ok(())
                } else {
                    Err(BreakerError::Open {
                        name: name.to_string(),
                        remaining_ms: (self.recovery_timeout - elapsed).as_millis() as u64,
                    })
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            BreakerState::Closed => {
                self.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.success_threshold {
                    self.state = BreakerState::Closed;
                    self.consecutive_failures = 0;
                    self.opened_at = None;
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&mut self) {
        match self.state {
            BreakerState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.failure_threshold {
                    self.state = BreakerState::Open;
                    self.opened_at = Some(Instant::now());
                }
            }
            // A failed probe reopens immediately
            BreakerState::HalfOpen => {
                self.state = BreakerState::Open;
                self.opened_at = Some(Instant::now());
            }
            BreakerState::Open => {}
        }
    }
}

/// Registry of breakers keyed by operation name.
///
/// Created once per executor at process start; reset only through the
/// explicit [`BreakerRegistry::reset`] test hook.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    fn with_breaker<R>(&self, name: &str, f: impl FnOnce(&mut CircuitBreaker) -> R) -> R {
        let mut breakers = self.breakers.lock().unwrap();
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            CircuitBreaker::new(
                self.config.failure_threshold,
                self.config.success_threshold,
                Duration::from_secs(self.config.recovery_timeout_secs),
            )
        });
        f(breaker)
    }

    pub fn acquire(&self, name: &str) -> Result<(), BreakerError> {
        self.with_breaker(name, |b| b.acquire(name))
    }

    pub fn record_success(&self, name: &str) {
        self.with_breaker(name, |b| b.record_success());
    }

    pub fn record_failure(&self, name: &str) {
        self.with_breaker(name, |b| b.record_failure());
    }

    pub fn state(&self, name: &str) -> BreakerState {
        self.with_breaker(name, |b| b.state())
    }

    /// Test hook: drop all breaker state
    pub fn reset(&self) {
        self.breakers.lock().unwrap().clear();
    }
}
