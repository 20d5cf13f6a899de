//! Clasificación de errores
//!
//! Cada fallo del pipeline o del transporte se mapea a una tupla
//! `(kind, severity, action, retryable)` mediante una tabla ordenada de
//! patrones sobre el mensaje y el código del error. La primera coincidencia
//! gana, así que el orden importa: un patrón de dependencia faltante debe
//! evaluarse antes que el genérico "not found", que es substring de muchos
//! mensajes de dependencias.
//!
//! La clasificación es una función pura del mensaje: sin estado, recalculada
//! en cada llamada, nunca persistida.

pub mod redaction;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use redaction::redact;

/// Category of a classified error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResourceExhaustion,
    Dependency,
    Configuration,
    PermissionDenied,
    ResourceBusy,
    FileNotFound,
    NetworkRefused,
    NetworkTimeout,
    RateLimit,
    QuotaExceeded,
    Validation,
    DataNotFound,
    SystemError,
}

/// How bad it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What the resilience layer should do about it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Ignore,
    LogOnly,
    Retry,
    Fallback,
    FailFast,
    UserIntervention,
}

/// Full classification of one error occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub action: RecoveryAction,
    pub retryable: bool,
    /// Minimum delay before the next attempt, when retryable with a policy
    /// other than standard backoff (rate limits)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<Duration>,
    /// Sanitized, human-readable message. Never contains credentials or PII.
    pub user_message: String,
    /// Raw message for logs and audits. May contain sensitive values.
    pub technical_message: String,
    pub suggested_actions: Vec<String>,
}

/// One row of the classification table
struct Rule {
    patterns: &'static [&'static str],
    kind: ErrorKind,
    severity: Severity,
    action: RecoveryAction,
    retryable: bool,
    retry_delay: Option<Duration>,
    user_message: &'static str,
    suggested_actions: &'static [&'static str],
}

/// Ordered rule table, first match wins. Dependency patterns sit above the
/// generic not-found rule on purpose.
const RULES: &[Rule] = &[
    Rule {
        patterns: &[
            "out of memory",
            "cannot allocate",
            "resource exhausted",
            "oom killed",
            "enomem",
        ],
        kind: ErrorKind::ResourceExhaustion,
        severity: Severity::Critical,
        action: RecoveryAction::FailFast,
        retryable: false,
        retry_delay: None,
        user_message: "The system ran out of memory or another resource",
        suggested_actions: &[
            "Reduce the size of the SQL being analyzed",
            "Close other processes and try again",
        ],
    },
    Rule {
        patterns: &[
            "module not found",
            "cannot find module",
            "dependency not found",
            "missing dependency",
            "unresolved import",
            "no matching package",
        ],
        kind: ErrorKind::Dependency,
        severity: Severity::Critical,
        action: RecoveryAction::FailFast,
        retryable: false,
        retry_delay: None,
        user_message: "A required dependency is missing",
        suggested_actions: &[
            "Reinstall the application",
            "Check the installation instructions",
        ],
    },
    Rule {
        patterns: &[
            "invalid configuration",
            "missing configuration",
            "config file not found",
            "misconfigured",
            "environment variable not set",
        ],
        kind: ErrorKind::Configuration,
        severity: Severity::Critical,
        action: RecoveryAction::FailFast,
        retryable: false,
        retry_delay: None,
        user_message: "The configuration is invalid or incomplete",
        suggested_actions: &[
            "Review the config file",
            "Run with --config pointing to a valid file",
        ],
    },
    Rule {
        patterns: &["permission denied", "eacces", "eperm", "access denied"],
        kind: ErrorKind::PermissionDenied,
        severity: Severity::High,
        action: RecoveryAction::UserIntervention,
        retryable: false,
        retry_delay: None,
        user_message: "Access to a file or resource was denied",
        suggested_actions: &["Check file permissions", "Run with the appropriate user"],
    },
    Rule {
        patterns: &["ebusy", "resource busy", "file is locked", "eagain", "try again"],
        kind: ErrorKind::ResourceBusy,
        severity: Severity::Medium,
        action: RecoveryAction::Retry,
        retryable: true,
        retry_delay: None,
        user_message: "A resource is temporarily busy",
        suggested_actions: &["Wait a moment and retry"],
    },
    Rule {
        patterns: &["enoent", "no such file or directory"],
        kind: ErrorKind::FileNotFound,
        severity: Severity::Medium,
        action: RecoveryAction::FailFast,
        retryable: false,
        retry_delay: None,
        user_message: "A required file does not exist",
        suggested_actions: &["Check the path and try again"],
    },
    Rule {
        patterns: &[
            "econnrefused",
            "connection refused",
            "econnreset",
            "connection reset",
            "network unreachable",
            "dns error",
        ],
        kind: ErrorKind::NetworkRefused,
        severity: Severity::High,
        action: RecoveryAction::Retry,
        retryable: true,
        retry_delay: None,
        user_message: "Could not reach the model provider",
        suggested_actions: &[
            "Check that the provider is running",
            "Verify the configured API URL",
        ],
    },
    Rule {
        patterns: &["etimedout", "timed out", "timeout", "deadline exceeded"],
        kind: ErrorKind::NetworkTimeout,
        severity: Severity::High,
        action: RecoveryAction::Retry,
        retryable: true,
        retry_delay: None,
        user_message: "The model provider took too long to answer",
        suggested_actions: &["Retry, or raise operation_timeout_secs"],
    },
    Rule {
        patterns: &["rate limit", "too many requests", "429", "throttled"],
        kind: ErrorKind::RateLimit,
        severity: Severity::Medium,
        action: RecoveryAction::Retry,
        retryable: true,
        retry_delay: Some(Duration::from_secs(30)),
        user_message: "The provider is rate-limiting requests",
        suggested_actions: &["Wait before retrying", "Reduce request volume"],
    },
    Rule {
        patterns: &["quota exceeded", "insufficient_quota", "billing", "payment required"],
        kind: ErrorKind::QuotaExceeded,
        severity: Severity::High,
        action: RecoveryAction::UserIntervention,
        retryable: false,
        retry_delay: None,
        user_message: "The provider account has exhausted its quota",
        suggested_actions: &["Check the provider account billing and limits"],
    },
    Rule {
        patterns: &[
            "validation",
            "invalid input",
            "schema mismatch",
            "expected object",
            "must be a",
        ],
        kind: ErrorKind::Validation,
        severity: Severity::Medium,
        action: RecoveryAction::FailFast,
        retryable: false,
        retry_delay: None,
        user_message: "The input did not pass validation",
        suggested_actions: &["Fix the reported field and try again"],
    },
    Rule {
        patterns: &["not found", "no rows", "404", "does not exist"],
        kind: ErrorKind::DataNotFound,
        severity: Severity::Low,
        action: RecoveryAction::LogOnly,
        retryable: false,
        retry_delay: None,
        user_message: "The requested data was not found",
        suggested_actions: &["Verify the identifier and try again"],
    },
];

/// Classify an error by its message and optional code.
///
/// Pure function over the inputs; context is only folded into the technical
/// message for logs.
pub fn classify(message: &str, code: Option<&str>, context: Option<&str>) -> ErrorClassification {
    let haystack = match code {
        Some(code) => format!("{} {}", code, message).to_lowercase(),
        None => message.to_lowercase(),
    };

    let technical_message = match context {
        Some(ctx) => format!("{} (context: {})", message, ctx),
        None => message.to_string(),
    };

    for rule in RULES {
        if rule.patterns.iter().any(|p| haystack.contains(p)) {
            return ErrorClassification {
                kind: rule.kind,
                severity: rule.severity,
                action: rule.action,
                retryable: rule.retryable,
                retry_delay: rule.retry_delay,
                user_message: format!("{}: {}", rule.user_message, redact(message)),
                technical_message,
                suggested_actions: rule
                    .suggested_actions
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            };
        }
    }

    // No match: conservative default, never silently swallowed
    ErrorClassification {
        kind: ErrorKind::SystemError,
        severity: Severity::Medium,
        action: RecoveryAction::FailFast,
        retryable: false,
        retry_delay: None,
        user_message: format!("An unexpected error occurred: {}", redact(message)),
        technical_message,
        suggested_actions: vec!["Check the logs for details".to_string()],
    }
}

/// Convenience wrapper for classifying an `anyhow::Error` chain
pub fn classify_error(error: &anyhow::Error, context: Option<&str>) -> ErrorClassification {
    classify(&format!("{:#}", error), None, context)
}
