//! 环境配置：后端地址、缓存 TTL、超时与重试参数。
//!
//! Engine configuration, read from environment variables with documented
//! fallbacks. Every value can also be overridden through
//! [`crate::FetchClientBuilder`].
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `JSINFO_REST_URL` | `http://localhost:8081` | Backend REST base URL |
//! | `JSINFO_CACHE_TTL_SECS` | `20` | Cache entry time-to-live |
//! | `JSINFO_CACHE_TIMEOUT_MS` | `25000` | Per-request transport timeout |
//! | `JSINFO_CACHE_RETRY_COUNT` | `3` | Transport-level re-sends |
//! | `JSINFO_FETCH_RETRY_STEP_MS` | `100` | Backoff growth per retry-fetcher attempt |
//! | `JSINFO_FETCH_MAX_RETRIES` | `50` | Retry-fetcher attempt cap |
//! | `JSINFO_FETCH_MAX_ERRORS` | `5` | Tolerated non-transient failures |

use crate::fetcher::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_REST_URL: &str = "http://localhost:8081";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 20;
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 25_000;
pub const DEFAULT_CACHE_RETRY_COUNT: u32 = 3;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: String,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub transport_retries: u32,
    pub retry_policy: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REST_URL.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_timeout: Duration::from_millis(DEFAULT_CACHE_TIMEOUT_MS),
            transport_retries: DEFAULT_CACHE_RETRY_COUNT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset or unparsable values fall back.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let policy = defaults.retry_policy.clone();

        let retry_policy = RetryPolicy {
            step: parse_var(&lookup, "JSINFO_FETCH_RETRY_STEP_MS")
                .map(Duration::from_millis)
                .unwrap_or(policy.step),
            max_retries: parse_var(&lookup, "JSINFO_FETCH_MAX_RETRIES")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(policy.max_retries),
            max_errors: parse_var(&lookup, "JSINFO_FETCH_MAX_ERRORS").unwrap_or(policy.max_errors),
            ..policy
        };

        Self {
            base_url: lookup("JSINFO_REST_URL")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.base_url),
            cache_ttl: parse_var(&lookup, "JSINFO_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            request_timeout: parse_var(&lookup, "JSINFO_CACHE_TIMEOUT_MS")
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            transport_retries: parse_var(&lookup, "JSINFO_CACHE_RETRY_COUNT")
                .unwrap_or(defaults.transport_retries),
            retry_policy,
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = raw.as_str(), "ignoring unparsable value");
            None
        }
    }
}
