//! # jsinfo-fetch
//!
//! 面向 JSINFO 后端的异步取数引擎：请求去重、TTL 缓存、以及区分“暂时为空”与“确认为空”的重试状态机。
//!
//! Data-fetching engine for a dashboard backend whose aggregates are computed
//! lazily: a freshly requested view may answer `{}` for a while before real
//! data appears.
//!
//! ## Overview
//!
//! Two layers sit between a consumer and the backend:
//!
//! - **Fetch-Cache Client**: [`FetchClient`] collapses concurrent identical
//!   requests into one backend call and serves repeats from a TTL cache.
//! - **Retry-Fetcher**: [`RetryFetcher`] keeps per-consumer retry state and
//!   keeps asking until real data arrives, the backend says the failure is
//!   permanent, or the attempt cap is reached.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jsinfo_fetch::{FetchClient, RequestKey, RetryFetcher};
//!
//! #[tokio::main]
//! async fn main() -> jsinfo_fetch::Result<()> {
//!     let client = FetchClient::global()?;
//!     let fetcher = RetryFetcher::for_key(client, RequestKey::new("index"));
//!     let snapshot = fetcher.settled().await;
//!     println!("{:?}", snapshot.data);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Fetch-cache client, builder, failure classification |
//! | [`fetcher`] | Per-consumer retry state machine |
//! | [`cache`] | Request keys and TTL cache backends |
//! | [`inflight`] | Shared in-flight call registry |
//! | [`transport`] | HTTP transport and transport errors |
//! | [`query`] | Pagination and date-range composition |
//! | [`config`] | Environment-driven configuration |

pub mod cache;
pub mod client;
pub mod config;
pub mod fetcher;
pub mod inflight;
pub mod query;
pub mod transport;

pub use cache::{CacheStore, RequestKey};
pub use client::{FetchClient, FetchClientBuilder};
pub use config::EngineConfig;
pub use fetcher::{FetchError, FetchSnapshot, RetryFetcher, RetryPolicy};
pub use transport::{Transport, TransportError};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
