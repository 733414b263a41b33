//! Error classification logic

use crate::transport::TransportError;
use once_cell::sync::Lazy;
use regex::Regex;

/// How the retry-fetcher should treat a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The backend will not produce data for this request; publish an empty result.
    Permanent,
    /// Expected to clear up on its own (timeouts, dropped connections, warm-up).
    Transient,
    /// Anything else; retried a bounded number of times.
    Other,
}

/// Structured backend codes meaning "no data will ever come back".
const PERMANENT_CODES: &[&str] = &[
    "authentication_failed",
    "db_authentication_failed",
    "sasl_authentication_failed",
];

/// Structured backend codes meaning "not ready yet".
const TRANSIENT_CODES: &[&str] = &["timeout", "warming_up", "not_ready"];

// Backends without structured codes report the database auth failure only in prose.
static PERMANENT_BODY_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)sasl authentication failed").ok());

pub fn classify(err: &TransportError) -> FailureClass {
    match err {
        TransportError::Timeout { .. } | TransportError::Network(_) => FailureClass::Transient,
        TransportError::Http { body, .. } => {
            if let Some(code) = err.backend_code() {
                if PERMANENT_CODES.contains(&code.as_str()) {
                    return FailureClass::Permanent;
                }
                if TRANSIENT_CODES.contains(&code.as_str()) {
                    return FailureClass::Transient;
                }
            }
            let sniffed = PERMANENT_BODY_PATTERN
                .as_ref()
                .map(|re| re.is_match(body))
                .unwrap_or(false);
            if sniffed {
                FailureClass::Permanent
            } else {
                FailureClass::Other
            }
        }
        TransportError::Decode(_) | TransportError::Other(_) => FailureClass::Other,
    }
}
