use crate::cache::CacheStore;
use crate::client::core::FetchClient;
use crate::config::EngineConfig;
use crate::fetcher::RetryPolicy;
use crate::inflight::InflightRegistry;
use crate::transport::{HttpTransport, HttpTransportConfig, Transport};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`FetchClient`].
///
/// Unset stores default to the process-wide instances; unset transport
/// defaults to an [`HttpTransport`] built from the configuration.
pub struct FetchClientBuilder {
    config: EngineConfig,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<CacheStore>>,
    inflight: Option<Arc<InflightRegistry>>,
    response_key: Option<String>,
}

impl FetchClientBuilder {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Start from `JSINFO_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(EngineConfig::from_env())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            transport: None,
            cache: None,
            inflight: None,
            response_key: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// TTL for cached responses. Zero disables writes.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn transport_retries(mut self, retries: u32) -> Self {
        self.config.transport_retries = retries;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Top-level field holding the payload, used to detect empty answers.
    pub fn response_key(mut self, key: impl Into<String>) -> Self {
        self.response_key = Some(key.into());
        self
    }

    /// Replace the HTTP transport (primarily for testing).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn inflight(mut self, inflight: Arc<InflightRegistry>) -> Self {
        self.inflight = Some(inflight);
        self
    }

    /// Isolated cache and in-flight registry instead of the global ones.
    pub fn isolated(self) -> Self {
        let ttl = self.config.cache_ttl;
        self.cache(Arc::new(CacheStore::in_memory(ttl)))
            .inflight(Arc::new(InflightRegistry::new()))
    }

    pub fn build(self) -> Result<FetchClient> {
        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(HttpTransportConfig {
                base_url: self.config.base_url.clone(),
                timeout: self.config.request_timeout,
                retries: self.config.transport_retries,
                retry_delay: Duration::ZERO,
            })?),
        };

        Ok(FetchClient {
            transport,
            cache: self.cache.unwrap_or_else(CacheStore::global),
            inflight: self.inflight.unwrap_or_else(InflightRegistry::global),
            cache_ttl: self.config.cache_ttl,
            response_key: self.response_key,
            retry_policy: self.config.retry_policy,
        })
    }
}

impl Default for FetchClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
