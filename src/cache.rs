//! Refresh-Ahead LRU Cache
//!
//! [`RefreshCache`] sits in front of a [`Producer`] and remembers what it
//! produced, keyed by string.
//!
//! # How a lookup is answered
//!
//! Every [`get`](RefreshCache::get) first expires entries older than `max_age`,
//! then looks at the entry for the key:
//!
//! | Entry state | Counted as | Result |
//! |-------------|------------|--------|
//! | settled value | hit | the value right away; a background refresh starts if the entry is older than `refresh_after` |
//! | producer call in flight | miss | joins the in-flight call |
//! | none | miss | calls the producer and returns its future |
//!
//! Concurrent misses for the same key share one producer call. A failed call
//! is not cached: every waiter sees the error and the next lookup calls the
//! producer again.
//!
//! # Eviction
//!
//! Entries are kept in population order. A hit does **not** move an entry, so
//! the entry evicted when the cache grows above `max_size` is the one populated
//! longest ago, however often it was read since. A successful refresh counts as
//! a population and moves the entry to the young end.
//!
//! ```text
//!   oldest ◄──────────────────────────► youngest
//!   [a: t0] [b: t1] [c: t2] ... [z: tn]
//!      ▲                            ▲
//!      │ expired/evicted first      │ new entries and refreshes
//! ```
//!
//! # Jitter
//!
//! With `jitter` configured, every timestamp set by the producer path is pushed
//! into the future by a random offset in `[0, jitter)`, so entries populated
//! together do not all expire or refresh together. `put` does not jitter.
//!
//! # Thread Safety
//!
//! A single `parking_lot::Mutex` guards the index and the list. It is never held
//! while the producer runs or while waiters are woken. The hit/miss counters
//! live outside of it.
//!
//! # Runtime
//!
//! Inside a Tokio runtime, a miss calls the producer on the blocking pool and
//! awaits a future it answers with on a spawned task, so `get` returns before
//! the producer runs. Background refreshes run on spawned tasks.
//!
//! Producers answering synchronously also work without any runtime. A miss
//! then calls the producer before `get` returns, and a refresh runs on a
//! dedicated thread.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, FutureExt};
use parking_lot::Mutex;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::{RefreshCacheConfig, DEFAULT_MAX_SIZE};
use crate::entry::{Cached, Entry};
use crate::error::{ConfigError, Error};
use crate::flight::{self, LookupFuture, MissFlight, RefreshFlight};
use crate::list::Handle;
use crate::metrics::{CacheCounters, CacheMetrics, HitMissCounters};
use crate::producer::Producer;
use crate::segment::Segment;

/// State shared between a cache, its clones and its in-flight producer calls.
pub(crate) struct Inner<V, A> {
    pub(crate) config: RefreshCacheConfig,
    pub(crate) producer: Box<dyn Producer<V, A>>,
    pub(crate) segment: Mutex<Segment<V>>,
    pub(crate) stats: HitMissCounters,
    pub(crate) counters: CacheCounters,
}

impl<V, A> Inner<V, A> {
    fn new(config: RefreshCacheConfig, producer: Box<dyn Producer<V, A>>) -> Self {
        // The index grows on demand past this.
        let capacity = config.max_size.get().min(DEFAULT_MAX_SIZE);
        Self {
            config,
            producer,
            segment: Mutex::new(Segment::with_capacity(capacity)),
            stats: HitMissCounters::new(),
            counters: CacheCounters::default(),
        }
    }

    /// Returns the timestamp for an entry populated by the producer at `now`.
    pub(crate) fn stamp(&self, now: Instant) -> Option<Instant> {
        if !self.config.tracks_age() {
            return None;
        }
        match self.config.jitter {
            Some(jitter) if !jitter.is_zero() => {
                Some(now + rand::thread_rng().gen_range(Duration::ZERO..jitter))
            }
            _ => Some(now),
        }
    }

    /// Expires entries populated more than `max_age` before `now`.
    fn expire(&self, segment: &mut Segment<V>, now: Instant) {
        let Some(max_age) = self.config.max_age else {
            return;
        };
        let Some(deadline) = now.checked_sub(max_age) else {
            return;
        };
        let expired = segment.expire_before(deadline);
        if expired > 0 {
            CacheCounters::add(&self.counters.expirations, expired as u64);
            debug!(expired, "expired stale entries");
        }
    }

    /// Evicts the oldest entries while the cache is above `max_size`.
    fn evict(&self, segment: &mut Segment<V>) {
        let evicted = segment.evict_to(self.config.max_size.get());
        if evicted > 0 {
            CacheCounters::add(&self.counters.evictions, evicted as u64);
            trace!(evicted, "evicted oldest entries");
        }
    }

    /// Returns true if a hit on `entry` at `now` should start a refresh.
    fn needs_refresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        match (self.config.refresh_after, entry.timestamp) {
            (Some(refresh_after), Some(timestamp)) => {
                !entry.refreshing && now.saturating_duration_since(timestamp) > refresh_after
            }
            _ => false,
        }
    }
}

/// An in-process cache with request deduplication, refresh-ahead and LRU
/// eviction.
///
/// `V` is the cached value type and `A` the type of the extra arguments
/// forwarded to the producer. Cloning a `RefreshCache` is cheap and yields a
/// handle to the same cache.
///
/// # Examples
///
/// ```
/// use refresh_lru::{Produced, ProducerError, RefreshCache, RefreshCacheConfig};
///
/// # futures::executor::block_on(async {
/// let cache = RefreshCache::init(
///     RefreshCacheConfig::default(),
///     |key: &str, _: ()| -> Result<Produced<usize>, ProducerError> { Ok(key.len().into()) },
/// )
/// .unwrap();
///
/// assert_eq!(cache.get("four", ()).await.unwrap(), Some(4));
/// assert_eq!(cache.get_if_present("four"), Some(4));
/// assert_eq!(cache.hits_and_misses(), (0, 1));
/// # });
/// ```
pub struct RefreshCache<V, A = ()> {
    inner: Arc<Inner<V, A>>,
}

impl<V, A> RefreshCache<V, A> {
    /// Creates a cache in front of `producer`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configured durations are inconsistent,
    /// see [`RefreshCacheConfig::validate`].
    pub fn init<P>(config: RefreshCacheConfig, producer: P) -> Result<Self, ConfigError>
    where
        P: Producer<V, A>,
    {
        config.validate()?;
        debug!(?config, "initialized cache");

        Ok(Self {
            inner: Arc::new(Inner::new(config, Box::new(producer))),
        })
    }

    /// Creates a cache with the default configuration: up to
    /// [`DEFAULT_MAX_SIZE`](crate::config::DEFAULT_MAX_SIZE) entries, no age
    /// expiry, no refresh, absent values cached.
    pub fn new<P>(producer: P) -> Self
    where
        P: Producer<V, A>,
    {
        Self {
            inner: Arc::new(Inner::new(RefreshCacheConfig::default(), Box::new(producer))),
        }
    }

    /// Returns the configuration the cache was built with.
    pub fn config(&self) -> &RefreshCacheConfig {
        &self.inner.config
    }

    /// Returns the maximum number of entries.
    #[inline]
    pub fn max_size(&self) -> usize {
        self.inner.config.max_size.get()
    }

    /// Returns the number of entries, including pending ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.segment.lock().len()
    }

    /// Returns true if the cache holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.segment.lock().is_empty()
    }

    /// Returns true if the cache holds an entry for `key`, pending or settled.
    ///
    /// Unlike the lookups this does not expire anything.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.segment.lock().handle(key).is_some()
    }

    /// Removes the entry for `key`.
    ///
    /// Callers already waiting on a producer call for `key` still receive its
    /// result, but the result is not cached.
    pub fn remove(&self, key: &str) {
        if self.inner.segment.lock().remove(key).is_some() {
            trace!(key, "removed entry");
        }
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.inner.segment.lock().clear();
        debug!("cleared cache");
    }

    /// Returns the hits and misses recorded since the last call, and resets
    /// both to zero.
    pub fn hits_and_misses(&self) -> (u64, u64) {
        self.inner.stats.take()
    }
}

impl<V, A> RefreshCache<V, A>
where
    V: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Looks up `key`, calling the producer with `args` on a miss.
    ///
    /// The returned future resolves to the cached or produced value, `None`
    /// for an absent value, or the producer's error. It does not need to be
    /// polled for the producer call to make progress, and dropping it does not
    /// cancel the call.
    ///
    /// On a hit that starts a refresh, `args` is forwarded to the refresh call.
    pub fn get(&self, key: &str, args: A) -> LookupFuture<V> {
        let inner = &self.inner;
        let now = Instant::now();
        let mut segment = inner.segment.lock();
        inner.expire(&mut segment, now);

        if let Some(handle) = segment.handle(key) {
            if let Some(entry) = segment.entry_mut(handle) {
                if let (Cached::Vacant, Some(pending)) = (&entry.value, &entry.pending) {
                    inner.stats.record_miss();
                    trace!(key, "joining in-flight producer call");
                    return pending.clone().boxed();
                }

                inner.stats.record_hit();
                let value = entry.value.as_value().cloned();
                let refresh = inner.needs_refresh(entry, now);
                if refresh {
                    entry.refreshing = true;
                }
                drop(segment);

                if refresh {
                    self.refresh(key, handle, args);
                }
                let hit: Result<Option<V>, Error> = Ok(value);
                return future::ready(hit).boxed();
            }
        }

        inner.stats.record_miss();
        let (sender, pending) = flight::channel();
        let entry = Entry::pending(key.to_owned(), inner.stamp(now), pending.clone());
        let handle = segment.insert(entry);
        inner.evict(&mut segment);
        drop(segment);

        MissFlight::new(Arc::clone(inner), key.to_owned(), handle, sender).fly(args);
        pending.boxed()
    }

    /// Returns the settled value for `key`, without calling the producer.
    ///
    /// Returns `None` if there is no entry, the producer call is still in
    /// flight, or the cached value is absent. Expires stale entries like
    /// [`get`](Self::get) but does not count hits or misses.
    pub fn get_if_present(&self, key: &str) -> Option<V> {
        let mut segment = self.inner.segment.lock();
        self.inner.expire(&mut segment, Instant::now());
        segment.get(key).and_then(|entry| entry.value.as_value().cloned())
    }

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// A new entry is stamped with the current time, without jitter. An
    /// existing entry keeps its timestamp and position. May evict the oldest
    /// entry.
    pub fn put(&self, key: &str, value: V) {
        let inner = &self.inner;
        let mut segment = inner.segment.lock();

        if let Some(entry) = segment.handle(key).and_then(|handle| segment.entry_mut(handle)) {
            entry.value = Cached::Present(Some(value));
            trace!(key, "overwrote entry");
            return;
        }

        let timestamp = inner.config.tracks_age().then(Instant::now);
        segment.insert(Entry::settled(key.to_owned(), Some(value), timestamp));
        inner.evict(&mut segment);
        trace!(key, "inserted entry");
    }

    /// Starts a background refresh of the settled entry behind `handle`.
    fn refresh(&self, key: &str, handle: Handle, args: A) {
        CacheCounters::add(&self.inner.counters.refreshes, 1);
        debug!(key, "refreshing entry");

        let flight = RefreshFlight::new(Arc::clone(&self.inner), key.to_owned(), handle);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(flight.fly(args));
            }
            Err(_) => {
                let spawned = std::thread::Builder::new()
                    .name("refresh-lru-refresh".to_owned())
                    .spawn(move || flight.fly_blocking(args));
                if let Err(error) = spawned {
                    warn!(key, %error, "failed to spawn refresh thread");
                }
            }
        }
    }
}

impl<V, A> Clone for RefreshCache<V, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, A> CacheMetrics for RefreshCache<V, A> {
    fn metrics(&self) -> std::collections::BTreeMap<String, f64> {
        let mut metrics = self.inner.counters.to_btreemap();
        let (hits, misses) = self.inner.stats.peek();
        metrics.insert("entries".to_string(), self.len() as f64);
        metrics.insert("hits".to_string(), hits as f64);
        metrics.insert("max_size".to_string(), self.max_size() as f64);
        metrics.insert("misses".to_string(), misses as f64);
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "RefreshLRU"
    }
}

impl<V, A> fmt::Debug for RefreshCache<V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCache")
            .field("config", &self.inner.config)
            .field("len", &self.len())
            .finish()
    }
}
