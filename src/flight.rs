//! In-flight producer calls.
//!
//! A miss creates a shareable channel and stores the receiving half in the
//! entry. Every lookup that finds the entry pending clones the receiver instead
//! of calling the producer again. The sending half lives in a [`MissFlight`],
//! which settles the entry and then resolves all waiters:
//!
//! ```text
//!   get("a") ──miss──► channel() ──► Entry { pending: rx.shared() }
//!        │                                   ▲
//!        ▼                                   │ clone
//!   MissFlight ──produce──► land(result)     get("a") ──pending──► waits
//!        │                     │
//!        │                     ├─ lock, install or remove entry, unlock
//!        │                     └─ send(result) ──► every waiter resolves
//!        ▼
//!   dropped without landing ──► entry removed, waiters get Error::Abandoned
//! ```
//!
//! A [`RefreshFlight`] does the same for a background refresh of a settled
//! entry, except that nobody waits on it: the old value keeps being served
//! until the refresh lands.

use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::cache::Inner;
use crate::entry::Cached;
use crate::error::{Error, ProducerError};
use crate::list::Handle;
use crate::metrics::CacheCounters;
use crate::producer::Produced;
use crate::segment::Segment;

/// The outcome every waiter of a producer call receives.
pub(crate) type Settled<V> = Result<Option<V>, Error>;

/// The shareable receiving half of a producer call, stored in a pending entry.
pub(crate) type PendingValue<V> = Shared<BoxFuture<'static, Settled<V>>>;

/// The future returned by [`RefreshCache::get`](crate::RefreshCache::get).
///
/// Resolves to the value, `None` for an absent value, or the error of the
/// producer call it waited on.
pub type LookupFuture<V> = BoxFuture<'static, Result<Option<V>, Error>>;

/// Creates the channel of a new producer call.
///
/// If the sender is dropped without sending, the waiters resolve to
/// [`Error::Abandoned`].
pub(crate) fn channel<V>() -> (oneshot::Sender<Settled<V>>, PendingValue<V>)
where
    V: Clone + Send + Sync + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let pending = receiver
        .map(|received| received.unwrap_or_else(|_canceled| Err(Error::Abandoned)))
        .boxed()
        .shared();
    (sender, pending)
}

/// Clears the pending future of the entry behind `handle`.
///
/// An entry that never got a value is removed. An entry that was `put` while
/// the call was in flight keeps that value.
fn unpend<V>(segment: &mut Segment<V>, handle: Handle) {
    let keep = match segment.entry_mut(handle) {
        Some(entry) if entry.value.is_present() => {
            entry.pending = None;
            true
        }
        Some(_) => false,
        None => true,
    };
    if !keep {
        segment.remove_handle(handle);
    }
}

/// The owner of a miss-path producer call.
///
/// Dropping it without calling [`land`](Self::land) (e.g. because the producer
/// panicked) removes the pending entry and fails all waiters with
/// [`Error::Abandoned`].
pub(crate) struct MissFlight<V, A> {
    inner: Arc<Inner<V, A>>,
    key: String,
    handle: Handle,
    sender: Option<oneshot::Sender<Settled<V>>>,
}

impl<V, A> MissFlight<V, A> {
    pub(crate) fn new(
        inner: Arc<Inner<V, A>>,
        key: String,
        handle: Handle,
        sender: oneshot::Sender<Settled<V>>,
    ) -> Self {
        Self {
            inner,
            key,
            handle,
            sender: Some(sender),
        }
    }
}

impl<V, A> MissFlight<V, A>
where
    V: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Calls the producer and settles the call.
    ///
    /// Inside a Tokio runtime the producer is called on the blocking pool, so
    /// neither the caller nor a worker thread waits for it, and a future it
    /// answers with is awaited on a spawned task. Without a runtime the
    /// producer is called before this returns and a future is abandoned.
    pub(crate) fn fly(self, args: A) {
        CacheCounters::add(&self.inner.counters.producer_calls, 1);
        trace!(key = %self.key, "calling producer");

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let spawner = runtime.clone();
                runtime.spawn_blocking(move || self.produce(args, Some(&spawner)));
            }
            Err(_) => self.produce(args, None),
        }
    }

    fn produce(self, args: A, runtime: Option<&tokio::runtime::Handle>) {
        let produced = self.inner.producer.produce(&self.key, args);
        match produced {
            Ok(Produced::Value(value)) => self.land(Ok(value)),
            Ok(Produced::Future(future)) => match runtime {
                Some(runtime) => {
                    runtime.spawn(async move {
                        let result = future.await;
                        self.land(result);
                    });
                }
                None => {
                    warn!(key = %self.key, "producer returned a future outside of a Tokio runtime");
                }
            },
            Err(error) => self.land(Err(error)),
        }
    }

    /// Settles the entry with the producer's result and resolves every waiter.
    pub(crate) fn land(mut self, result: Result<Option<V>, ProducerError>) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        let settled = {
            let mut segment = self.inner.segment.lock();
            match result {
                Ok(value) if value.is_some() || self.inner.config.cache_undefined => {
                    if let Some(entry) = segment.entry_mut(self.handle) {
                        entry.settle(value.clone());
                        entry.timestamp = self.inner.stamp(Instant::now());
                        segment.relink(self.handle);
                    }
                    Ok(value)
                }
                Ok(_) => {
                    unpend(&mut segment, self.handle);
                    Ok(None)
                }
                Err(error) => {
                    unpend(&mut segment, self.handle);
                    CacheCounters::add(&self.inner.counters.producer_failures, 1);
                    warn!(key = %self.key, error = %error, "producer failed");
                    Err(Error::producer(error))
                }
            }
        };

        // Waiters may all have gone away; that is fine.
        let _ = sender.send(settled);
    }
}

impl<V, A> Drop for MissFlight<V, A> {
    fn drop(&mut self) {
        if self.sender.is_none() {
            return;
        }
        unpend(&mut self.inner.segment.lock(), self.handle);
        warn!(key = %self.key, "producer call dropped before settling");
    }
}

/// The owner of a background refresh of a settled entry.
///
/// Dropping it without landing only clears the entry's refresh flag, so the
/// next stale hit can try again.
pub(crate) struct RefreshFlight<V, A> {
    inner: Arc<Inner<V, A>>,
    key: String,
    handle: Handle,
    landed: bool,
}

impl<V, A> RefreshFlight<V, A> {
    pub(crate) fn new(inner: Arc<Inner<V, A>>, key: String, handle: Handle) -> Self {
        Self {
            inner,
            key,
            handle,
            landed: false,
        }
    }
}

impl<V, A> RefreshFlight<V, A>
where
    V: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Calls the producer and awaits its result.
    pub(crate) async fn fly(self, args: A) {
        let produced = self.inner.producer.produce(&self.key, args);
        match produced {
            Ok(Produced::Value(value)) => self.land(Ok(value)),
            Ok(Produced::Future(future)) => {
                let result = future.await;
                self.land(result);
            }
            Err(error) => self.land(Err(error)),
        }
    }

    /// Calls the producer and lands its plain result.
    ///
    /// Runs on a dedicated thread when no Tokio runtime is available. A
    /// producer that answers with a future cannot be refreshed this way.
    pub(crate) fn fly_blocking(self, args: A) {
        let produced = self.inner.producer.produce(&self.key, args);
        match produced {
            Ok(Produced::Value(value)) => self.land(Ok(value)),
            Ok(Produced::Future(_)) => {
                warn!(key = %self.key, "cannot refresh outside of a Tokio runtime");
            }
            Err(error) => self.land(Err(error)),
        }
    }

    /// Installs the refreshed value, or keeps the old one if the refresh failed.
    pub(crate) fn land(mut self, result: Result<Option<V>, ProducerError>) {
        self.landed = true;

        let mut segment = self.inner.segment.lock();
        let Some(entry) = segment.entry_mut(self.handle) else {
            debug!(key = %self.key, "refreshed entry is gone, discarding the result");
            return;
        };
        entry.refreshing = false;

        match result {
            Ok(value) if value.is_some() || self.inner.config.cache_undefined => {
                entry.value = Cached::Present(value);
                entry.timestamp = self.inner.stamp(Instant::now());
                segment.relink(self.handle);
                trace!(key = %self.key, "refreshed entry");
            }
            Ok(_) => {
                segment.remove_handle(self.handle);
                debug!(key = %self.key, "refresh produced no value, dropping entry");
            }
            Err(error) => {
                drop(segment);
                CacheCounters::add(&self.inner.counters.refresh_failures, 1);
                warn!(key = %self.key, error = %error, "refresh failed, keeping the previous value");
            }
        }
    }
}

impl<V, A> Drop for RefreshFlight<V, A> {
    fn drop(&mut self) {
        if self.landed {
            return;
        }
        if let Some(entry) = self.inner.segment.lock().entry_mut(self.handle) {
            entry.refreshing = false;
        }
        debug!(key = %self.key, "refresh dropped before settling");
    }
}
