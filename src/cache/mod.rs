//! 响应缓存模块：按请求键缓存后端 JSON 响应，带 TTL 过期。
//!
//! # Response Cache Module
//!
//! Process-wide response cache with per-entry time-to-live. Entries are
//! readable while `now < stored_at + ttl`; expired entries behave exactly like
//! absent ones and are evicted lazily when looked up.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheStore`] | TTL-aware store with statistics and a global default instance |
//! | [`CacheConfig`] | Default TTL and enable switch |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`MemoryCache`] | In-memory map backend |
//! | [`NullCache`] | No-op backend for disabling caching |
//! | [`RequestKey`] | Path + query identity of a logical request |
//!
//! ```rust
//! use jsinfo_fetch::cache::{CacheStore, RequestKey};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let store = CacheStore::in_memory(Duration::from_secs(20));
//! let key = RequestKey::new("providers");
//! store.set(&key, serde_json::json!({"providers": []})).await.unwrap();
//! assert!(store.get(&key).await.unwrap().is_some());
//! # });
//! ```

mod backend;
mod key;
mod store;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use key::RequestKey;
pub use store::{CacheConfig, CacheStats, CacheStore};
