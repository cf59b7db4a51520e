//! Hit/Miss Counters
//!
//! The consume-on-read hit/miss pair exposed by
//! [`RefreshCache::hits_and_misses`](crate::RefreshCache::hits_and_misses).

use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;

/// Hit and miss counters that are read and reset together.
///
/// Increments are lock-free with respect to each other: they only take the
/// shared side of a tiny `RwLock` that exists to keep them out of the way of
/// [`take`](Self::take). `take` holds the exclusive side while swapping both
/// counters, so a snapshot never contains a hit without the miss recorded just
/// before it (or vice versa). None of this touches the cache's main lock.
#[derive(Debug, Default)]
pub struct HitMissCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    reset: RwLock<()>,
}

impl HitMissCounters {
    /// Creates a new pair of zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a lookup answered from a settled value.
    #[inline]
    pub fn record_hit(&self) {
        let _shared = self.reset.read();
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lookup that had to wait on the producer.
    #[inline]
    pub fn record_miss(&self) {
        let _shared = self.reset.read();
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current `(hits, misses)` without resetting them.
    pub fn peek(&self) -> (u64, u64) {
        let _exclusive = self.reset.write();
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Returns `(hits, misses)` and resets both to zero.
    pub fn take(&self) -> (u64, u64) {
        let _exclusive = self.reset.write();
        (
            self.hits.swap(0, Ordering::Relaxed),
            self.misses.swap(0, Ordering::Relaxed),
        )
    }
}
