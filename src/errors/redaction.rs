//! Redaction of sensitive values from user-facing messages
//!
//! Provider errors often echo back the request, including credentials.
//! Anything user-facing goes through [`redact`]; the raw message is kept
//! only in the audit-only technical field.

use lazy_static::lazy_static;
use regex::Regex;

const PLACEHOLDER: &str = "[REDACTED]";

lazy_static! {
    /// Credential-like tokens: sk-..., ghp_..., xoxb-..., long opaque keys
    static ref API_KEY: Regex =
        Regex::new(r"\b(?:sk|pk|rk)-[A-Za-z0-9_-]{8,}|\bghp_[A-Za-z0-9]{20,}|\bxox[bpars]-[A-Za-z0-9-]{10,}").unwrap();
    /// Bearer tokens and explicit key=value assignments
    static ref ASSIGNED_SECRET: Regex = Regex::new(
        r#"(?i)\b(?:bearer\s+[A-Za-z0-9._~+/-]{8,}=*|(?:api[_-]?key|token|secret|password|passwd)\s*[:=]\s*\S+)"#
    ).unwrap();
    static ref EMAIL: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    /// Phone numbers with separators, 7+ digits
    static ref PHONE: Regex =
        Regex::new(r"\+?\d{1,3}[-. (]?\d{2,4}[-. )]?\d{3,4}[-. ]?\d{3,4}\b").unwrap();
}

/// Replace known sensitive-value patterns with a placeholder
pub fn redact(text: &str) -> String {
    let step = ASSIGNED_SECRET.replace_all(text, PLACEHOLDER);
    let step = API_KEY.replace_all(&step, PLACEHOLDER);
    let step = EMAIL.replace_all(&step, PLACEHOLDER);
    PHONE.replace_all(&step, PLACEHOLDER).into_owned()
}

/// Whether redaction would change the text
#[cfg(test)]
fn contains_sensitive(text: &str) -> bool {
    API_KEY.is_match(text)
        || ASSIGNED_SECRET.is_match(text)
        || EMAIL.is_match(text)
        || PHONE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_redacted() {
        let msg = "auth failed for key sk-abc123def456ghi789";
        let redacted = redact(msg);
        assert!(!redacted.contains("sk-abc123"));
        assert!(redacted.contains("[REDACTED]"));
    }

    #[test]
    fn test_bearer_token_redacted() {
        let msg = "header was: Bearer eyJhbGciOiJIUzI1NiJ9.payload";
        assert!(!redact(msg).contains("eyJhbGci"));
    }

    #[test]
    fn test_assignment_redacted() {
        let msg = "invalid config: api_key=topsecret123";
        assert!(!redact(msg).contains("topsecret123"));
    }

    #[test]
    fn test_email_redacted() {
        let msg = "user admin@example.com not authorized";
        let redacted = redact(msg);
        assert!(!redacted.contains("admin@example.com"));
        assert!(redacted.contains("not authorized"));
    }

    #[test]
    fn test_phone_redacted() {
        let msg = "contact +1 555-123-4567 for support";
        assert!(!redact(msg).contains("555-123-4567"));
    }

    #[test]
    fn test_clean_text_untouched() {
        let msg = "connection refused by host";
        assert_eq!(redact(msg), msg);
        assert!(!contains_sensitive(msg));
    }
}
