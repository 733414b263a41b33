//! 取数客户端：缓存优先、在途去重的 GET 客户端。
//!
//! Fetch-cache client: composes the [`crate::cache::CacheStore`], the
//! [`crate::inflight::InflightRegistry`] and a [`crate::transport::Transport`]
//! into a single `get(key)` operation.

mod builder;
mod core;
pub mod error_classification;
mod payload;

pub use self::builder::FetchClientBuilder;
pub use self::core::FetchClient;
pub use self::error_classification::{classify, FailureClass};
pub use self::payload::is_ambiguous_empty;
