//! 传输层：单次 GET 请求，带超时与底层重试。
//!
//! HTTP transport layer.
//!
//! The transport issues one GET per call with a fixed timeout and a small
//! number of low-level re-sends for connection failures. It knows nothing about
//! caching or the application-level retry policy layered above it.

mod http;

pub use http::{HttpTransport, HttpTransportConfig};

use crate::cache::RequestKey;
use async_trait::async_trait;
use serde_json::Value;

/// Error taxonomy shared by the transport and the fetch-cache client.
///
/// `Clone` so one settled in-flight call can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid JSON body: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// The `error` string of a `{"error": "..."}` body, if the backend sent one.
    pub fn backend_message(&self) -> Option<String> {
        self.body_json()?
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Structured error code (`{"code": "..."}` or `{"error": {"code": "..."}}`).
    pub fn backend_code(&self) -> Option<String> {
        let json = self.body_json()?;
        json.get("code")
            .or_else(|| json.get("error").and_then(|e| e.get("code")))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Message suitable for a consumer: the backend's own message when present.
    pub fn user_message(&self) -> String {
        self.backend_message().unwrap_or_else(|| self.to_string())
    }

    fn body_json(&self) -> Option<Value> {
        match self {
            TransportError::Http { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

/// A source of JSON documents addressed by [`RequestKey`].
///
/// [`HttpTransport`] is the production implementation; tests plug in scripted
/// transports to observe call counts and timing.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, key: &RequestKey) -> Result<Value, TransportError>;
}
