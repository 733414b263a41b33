//! Cache store.

use super::backend::{CacheBackend, MemoryCache};
use super::key::RequestKey;
use crate::Result;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(20),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

static GLOBAL: Lazy<Arc<CacheStore>> = Lazy::new(|| {
    Arc::new(CacheStore::new(
        CacheConfig::default(),
        Box::new(MemoryCache::new()),
    ))
});

/// Response cache keyed by [`RequestKey`], with per-entry TTL.
pub struct CacheStore {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    stats: AtomicStats,
}

impl CacheStore {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: AtomicStats::default(),
        }
    }

    /// In-memory store with the given default TTL.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(
            CacheConfig::new().with_ttl(ttl),
            Box::new(MemoryCache::new()),
        )
    }

    /// Process-wide default instance.
    pub fn global() -> Arc<CacheStore> {
        GLOBAL.clone()
    }

    pub async fn get(&self, key: &RequestKey) -> Result<Option<Value>> {
        if !self.config.enabled {
            return Ok(None);
        }
        match self.backend.get(&key.canonical()).await {
            Ok(Some(value)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "cache hit");
                Ok(Some(value))
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub async fn set(&self, key: &RequestKey, value: Value) -> Result<()> {
        self.set_with_ttl(key, value, self.config.default_ttl).await
    }

    pub async fn set_with_ttl(&self, key: &RequestKey, value: Value, ttl: Duration) -> Result<()> {
        if !self.config.enabled || ttl.is_zero() {
            return Ok(());
        }
        match self.backend.set(&key.canonical(), value, ttl).await {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub async fn delete(&self, key: &RequestKey) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        let deleted = self.backend.delete(&key.canonical()).await?;
        if deleted {
            self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(deleted)
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await
    }

    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
