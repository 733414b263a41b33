//! 重试取数器：按消费者维护重试/退避状态，区分“暂时为空”与“确认为空”。
//!
//! # Stateful Retry-Fetcher
//!
//! One [`RetryFetcher`] per consumer (a dashboard panel, a CLI command). It
//! owns the retry/backoff state for the consumer's current [`crate::cache::RequestKey`]
//! and publishes a [`FetchSnapshot`] of `data / loading / error / is_validating`.
//!
//! The backend answers `{}` both while its aggregates warm up and when there
//! is nothing to show. The fetcher treats an empty answer as "not yet" and
//! re-attempts with a linearly growing delay until real data arrives or the
//! attempt cap is hit. Once data has been seen, later empty answers keep the
//! previous data.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RetryFetcher`] | Runtime glue: calls, timers, snapshot channel |
//! | [`state::reduce`] | Pure state transition function |
//! | [`RetryPolicy`] | Backoff step and caps |
//! | [`FetchError`] | The only error a consumer ever sees |

pub mod policy;
mod retry_fetcher;
pub mod state;

pub use policy::RetryPolicy;
pub use retry_fetcher::RetryFetcher;
pub use state::{Effect, FetchEvent, FetchPhase, FetchState, Outcome};

use serde::Serialize;
use serde_json::Value;

pub const TIMED_OUT_MESSAGE: &str = "Request timed out";

/// Terminal failure surfaced to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The attempt cap was reached without data.
    pub fn timed_out() -> Self {
        Self::new(TIMED_OUT_MESSAGE)
    }
}

/// What a consumer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchSnapshot {
    pub data: Option<Value>,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub is_validating: bool,
}

impl FetchSnapshot {
    pub fn from_state(state: &FetchState) -> Self {
        Self {
            data: state.data.clone(),
            loading: state.loading,
            error: state.error.clone(),
            is_validating: state.is_call_in_flight
                || matches!(state.phase, FetchPhase::AmbiguousEmpty(_)),
        }
    }
}

impl Default for FetchSnapshot {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            is_validating: false,
        }
    }
}
