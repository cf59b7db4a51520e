//! An in-process cache that sits in front of a value producer.
//!
//! [`RefreshCache`] maps string keys to values computed by a [`Producer`] and
//! adds the things a plain memoizing map lacks:
//!
//! - **Request deduplication**: concurrent misses for the same key share one
//!   producer call.
//! - **Refresh-ahead**: a hit on an entry older than `refresh_after` returns the
//!   cached value immediately and recomputes it in the background.
//! - **Expiry**: entries older than `max_age` are dropped on the next lookup.
//! - **Bounded size**: the cache holds at most `max_size` entries and evicts
//!   the one populated longest ago.
//! - **Jitter**: a random offset spreads out the expiry of entries populated
//!   together.
//!
//! ## Quick Start
//!
//! ```rust
//! use refresh_lru::{Produced, ProducerError, RefreshCache, RefreshCacheConfig};
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = RefreshCacheConfig {
//!     max_size: NonZeroUsize::new(1000).unwrap(),
//!     max_age: Some(Duration::from_secs(300)),
//!     refresh_after: Some(Duration::from_secs(240)),
//!     jitter: Some(Duration::from_secs(10)),
//!     cache_undefined: true,
//! };
//!
//! let cache = RefreshCache::init(config, |key: &str, _: ()| -> Result<Produced<String>, ProducerError> {
//!     let key = key.to_owned();
//!     Ok(Produced::future(async move {
//!         // e.g. an HTTP request or a database query
//!         Ok(Some(key.to_uppercase()))
//!     }))
//! })
//! .unwrap();
//!
//! assert_eq!(cache.get("hello", ()).await.unwrap().as_deref(), Some("HELLO"));
//! # }
//! ```
//!
//! ## Hits and Misses
//!
//! A lookup answered from a settled value is a hit; every other lookup,
//! including one that joins an in-flight producer call, is a miss.
//! [`RefreshCache::hits_and_misses`] returns both counts and resets them in one
//! step, so it can be polled periodically to report rates:
//!
//! ```rust
//! # use refresh_lru::{Produced, ProducerError, RefreshCache};
//! # let cache = RefreshCache::new(|_: &str, _: ()| -> Result<Produced<u32>, ProducerError> {
//! #     Ok(Produced::Value(Some(1)))
//! # });
//! let (hits, misses) = cache.hits_and_misses();
//! let lookups = hits + misses;
//! if lookups > 0 {
//!     println!("hit rate: {:.1}%", 100.0 * hits as f64 / lookups as f64);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: The cache itself
//! - [`config`]: Configuration and its validation
//! - [`producer`]: The producer trait and its result type
//! - [`error`]: Error types
//! - [`metrics`]: Counters and metrics reporting

/// Per-key cache state.
///
/// Holds the key, the settled value, the population timestamp, the in-flight
/// producer call and the refresh flag.
pub(crate) mod entry;

/// Arena-backed doubly linked list ordering entries by population time.
///
/// **Note**: This module is internal infrastructure. Nodes are addressed by
/// generational handles, so a stale handle is detected instead of aliasing a
/// reused slot.
pub(crate) mod list;

/// The key index and recency list behind the cache lock.
pub(crate) mod segment;

/// Coordination of in-flight producer calls and background refreshes.
pub(crate) mod flight;

/// Cache configuration.
pub mod config;

/// Error types returned by the cache and by producers.
pub mod error;

/// The producer trait.
pub mod producer;

/// The refresh-ahead LRU cache.
pub mod cache;

/// Cache metrics system.
///
/// Provides the consume-on-read hit/miss counters and the lifetime counters
/// reported through [`CacheMetrics`](metrics::CacheMetrics).
pub mod metrics;

pub use cache::RefreshCache;
pub use config::RefreshCacheConfig;
pub use error::{ConfigError, Error, ProducerError};
pub use flight::LookupFuture;
pub use metrics::{CacheMetrics, HitMissCounters};
pub use producer::{Produced, Producer};
