//! Cache Metrics System
//!
//! Two kinds of counters live here:
//!
//! - [`HitMissCounters`]: the consume-on-read hit/miss pair. Reading it through
//!   [`RefreshCache::hits_and_misses`](crate::RefreshCache::hits_and_misses)
//!   resets it.
//! - [`CacheCounters`]: lifetime counters for producer calls, evictions,
//!   expirations and refreshes. They are never reset.
//!
//! Both are reported through the [`CacheMetrics`] trait as a `BTreeMap`.
//!
//! # Why BTreeMap over HashMap?
//!
//! BTreeMap keeps the metric keys in a deterministic order, which keeps logs and
//! test assertions stable. With a dozen keys the O(log n) lookup is irrelevant.

use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;

pub mod stats;

pub use stats::HitMissCounters;

/// Lifetime counters tracked by a cache.
///
/// All counters are monotonically increasing atomics, safe to bump from any
/// thread without holding the cache lock.
#[derive(Debug, Default)]
pub struct CacheCounters {
    /// Number of times the producer was invoked from the miss path
    pub producer_calls: AtomicU64,

    /// Number of miss-path producer calls that failed
    pub producer_failures: AtomicU64,

    /// Number of entries evicted because the cache was over `max_size`
    pub evictions: AtomicU64,

    /// Number of entries expired because they were older than `max_age`
    pub expirations: AtomicU64,

    /// Number of background refreshes started
    pub refreshes: AtomicU64,

    /// Number of background refreshes that failed and were discarded
    pub refresh_failures: AtomicU64,
}

impl CacheCounters {
    /// Adds `n` to `counter`.
    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Convert counters to BTreeMap for reporting
    ///
    /// # Returns
    /// A BTreeMap containing all lifetime counters with consistent key ordering
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed) as f64;

        metrics.insert("evictions".to_string(), load(&self.evictions));
        metrics.insert("expirations".to_string(), load(&self.expirations));
        metrics.insert("producer_calls".to_string(), load(&self.producer_calls));
        metrics.insert(
            "producer_failures".to_string(),
            load(&self.producer_failures),
        );
        metrics.insert("refresh_failures".to_string(), load(&self.refresh_failures));
        metrics.insert("refreshes".to_string(), load(&self.refreshes));

        metrics
    }
}

/// Trait for reporting cache metrics
///
/// Provides a uniform way to dump a cache's counters, e.g. into logs or an
/// external monitoring system.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order
    ///
    /// Reading metrics never resets the hit/miss pair.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Algorithm name for identification
    fn algorithm_name(&self) -> &'static str;
}
