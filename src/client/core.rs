use crate::cache::{CacheStore, RequestKey};
use crate::fetcher::RetryPolicy;
use crate::inflight::InflightRegistry;
use crate::transport::{Transport, TransportError};
use crate::Result;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::builder::FetchClientBuilder;
use super::payload::is_ambiguous_empty;

static GLOBAL: OnceCell<Arc<FetchClient>> = OnceCell::new();

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemCountBody {
    item_count: u64,
}

/// Cache-first, deduplicating GET client.
///
/// Stateless across calls; all shared state lives in the [`CacheStore`] and
/// the [`InflightRegistry`] it was built with.
pub struct FetchClient {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: Arc<CacheStore>,
    pub(crate) inflight: Arc<InflightRegistry>,
    pub(crate) cache_ttl: Duration,
    pub(crate) response_key: Option<String>,
    pub(crate) retry_policy: RetryPolicy,
}

impl FetchClient {
    pub fn builder() -> FetchClientBuilder {
        FetchClientBuilder::new()
    }

    /// Process-wide client configured from the environment, sharing the
    /// global cache and in-flight registry.
    pub fn global() -> Result<Arc<FetchClient>> {
        GLOBAL
            .get_or_try_init(|| FetchClientBuilder::from_env().build().map(Arc::new))
            .map(Arc::clone)
    }

    /// Fetch `key`, answering from cache when possible and joining any
    /// pending call for the same key otherwise.
    ///
    /// Failures are never cached. Empty payloads are not cached either, so a
    /// re-attempt after an ambiguous empty answer reaches the backend.
    pub async fn get(&self, key: &RequestKey) -> std::result::Result<Value, TransportError> {
        match self.cache.get(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "cache lookup failed, treating as miss"),
        }

        let transport = Arc::clone(&self.transport);
        let cache = Arc::clone(&self.cache);
        let ttl = self.cache_ttl;
        let response_key = self.response_key.clone();
        let request = key.clone();

        // Cache is written inside the shared call, before the in-flight entry
        // goes away. A caller that missed the cache just before that write and
        // then finds no entry starts a new shared call, which re-checks the
        // cache before going to the backend.
        self.inflight
            .get_or_create(key, move || async move {
                if let Ok(Some(value)) = cache.get(&request).await {
                    debug!(key = %request, "filled while waiting, skipping backend");
                    return Ok(value);
                }
                debug!(key = %request, "fetching from backend");
                let value = transport.get_json(&request).await?;
                if !is_ambiguous_empty(&value, response_key.as_deref()) {
                    if let Err(e) = cache.set_with_ttl(&request, value.clone(), ttl).await {
                        warn!(key = %request, error = %e, "cache store failed");
                    }
                }
                Ok(value)
            })
            .await
    }

    /// Row count for a paginated resource, from the `item-count/<path>`
    /// companion endpoint. The pagination parameter itself is not forwarded.
    pub async fn item_count(&self, key: &RequestKey) -> Result<u64> {
        let count_key = key
            .params()
            .iter()
            .filter(|(name, _)| name != crate::query::PAGINATION_PARAM)
            .fold(
                RequestKey::new(format!("item-count/{}", key.path())),
                |k, (name, value)| k.with_param(name.as_str(), value.as_str()),
            );

        let body: ItemCountBody = serde_json::from_value(self.get(&count_key).await?)?;
        Ok(body.item_count)
    }

    /// Drop any cached response for `key`.
    pub async fn invalidate(&self, key: &RequestKey) -> Result<bool> {
        self.cache.delete(key).await
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn inflight(&self) -> &Arc<InflightRegistry> {
        &self.inflight
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn response_key(&self) -> Option<&str> {
        self.response_key.as_deref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}
