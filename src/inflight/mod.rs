//! 在途请求登记表：相同请求键的并发调用共享同一次网络请求。
//!
//! # In-Flight Request Registry
//!
//! Deduplicates concurrent requests: while a call for a [`RequestKey`] is
//! pending, every further caller for the same key joins it and observes the
//! same value or error. N simultaneous callers produce exactly one call.
//!
//! The underlying call is spawned onto the runtime, so it settles (and its
//! entry is removed) even if every waiter is dropped. Removal happens before
//! waiters are woken, and is tied to the entry id so a settling call never
//! removes a newer entry registered under the same key.

use crate::cache::RequestKey;
use crate::transport::TransportError;
use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A pending call that any number of waiters can await.
pub type SharedCall = Shared<BoxFuture<'static, Result<Value, TransportError>>>;

struct Entry {
    id: u64,
    call: SharedCall,
}

type EntryMap = Arc<Mutex<HashMap<String, Entry>>>;

/// Removes the registry entry when the spawned call finishes or unwinds.
struct Removal {
    entries: EntryMap,
    key: String,
    id: u64,
}

impl Drop for Removal {
    fn drop(&mut self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.get(&self.key).map(|e| e.id) == Some(self.id) {
            entries.remove(&self.key);
        }
    }
}

static GLOBAL: Lazy<Arc<InflightRegistry>> = Lazy::new(|| Arc::new(InflightRegistry::new()));

pub struct InflightRegistry {
    entries: EntryMap,
    next_id: AtomicU64,
    started: AtomicU64,
    joined: AtomicU64,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            started: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        }
    }

    /// Process-wide default instance.
    pub fn global() -> Arc<InflightRegistry> {
        GLOBAL.clone()
    }

    /// Join the pending call for `key`, or start one with `factory`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_or_create<F, Fut>(&self, key: &RequestKey, factory: F) -> SharedCall
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        let canonical = key.canonical();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = entries.get(&canonical) {
            self.joined.fetch_add(1, Ordering::Relaxed);
            debug!(key = %canonical, "joining in-flight request");
            return entry.call.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let removal = Removal {
            entries: Arc::clone(&self.entries),
            key: canonical.clone(),
            id,
        };
        let fut = factory();
        let handle = tokio::spawn(async move {
            let _removal = removal;
            fut.await
        });
        let call = async move {
            handle.await.unwrap_or_else(|e| {
                Err(TransportError::Other(format!("in-flight request aborted: {}", e)))
            })
        }
        .boxed()
        .shared();

        entries.insert(
            canonical,
            Entry {
                id,
                call: call.clone(),
            },
        );
        self.started.fetch_add(1, Ordering::Relaxed);
        call
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&key.canonical())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of underlying calls started so far.
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Number of callers that joined an already-pending call.
    pub fn joined(&self) -> u64 {
        self.joined.load(Ordering::Relaxed)
    }
}

impl Default for InflightRegistry {
    fn default() -> Self {
        Self::new()
    }
}
