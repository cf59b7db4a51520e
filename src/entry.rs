//! Cache Entry Type
//!
//! This module provides the `Entry<V>` structure holding the per-key state of a
//! [`RefreshCache`](crate::RefreshCache): the key, the value slot, the population
//! timestamp, the in-flight producer future and the refresh flag.
//!
//! # Value Slot
//!
//! A value slot distinguishes three states:
//!
//! - **Vacant**: the producer has not settled yet (a pending future exists)
//! - **Present(Some(v))**: a settled value
//! - **Present(None)**: a settled *absent* value, only kept when the cache is
//!   configured with `cache_undefined = true`
//!
//! # Recency Links
//!
//! Entries do not carry their own recency links. Each entry lives in a node of
//! the recency list arena, and the node holds the `older`/`younger` links. The
//! index maps keys to the node handle.
//!
//! # Thread Safety
//!
//! Entries are plain data. They are only ever mutated while the owning cache's
//! exclusive lock is held, and no reference to an entry escapes the cache API.

use core::fmt;

use tokio::time::Instant;

use crate::flight::PendingValue;

/// The value slot of an [`Entry`].
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum Cached<V> {
    /// No value has been settled yet.
    Vacant,
    /// A settled value, which may itself be absent.
    Present(Option<V>),
}

impl<V> Cached<V> {
    /// Returns the settled value, flattening an absent value into `None`.
    pub(crate) fn as_value(&self) -> Option<&V> {
        match self {
            Cached::Present(value) => value.as_ref(),
            Cached::Vacant => None,
        }
    }

    /// Returns true once a value (possibly absent) has been settled.
    pub(crate) fn is_present(&self) -> bool {
        matches!(self, Cached::Present(_))
    }
}

/// Per-key cache state.
///
/// # Design Decisions
///
/// - `timestamp`: `None` when neither max-age nor refresh-after is configured,
///   since nothing reads it then.
/// - `pending`: the shared future of the in-flight producer call. A second miss
///   for the same key clones it instead of calling the producer again.
/// - `refreshing`: set while a background refresh is running, so overlapping
///   hits do not start another one.
pub(crate) struct Entry<V> {
    /// The cache key, immutable after creation.
    pub(crate) key: String,

    /// The settled value, if any.
    pub(crate) value: Cached<V>,

    /// Point in time of the last successful (re)population.
    pub(crate) timestamp: Option<Instant>,

    /// The in-flight producer call for this key.
    pub(crate) pending: Option<PendingValue<V>>,

    /// True while a background refresh for this entry is in flight.
    pub(crate) refreshing: bool,
}

impl<V> Entry<V> {
    /// Creates an entry waiting on a producer call.
    pub(crate) fn pending(key: String, timestamp: Option<Instant>, pending: PendingValue<V>) -> Self {
        Self {
            key,
            value: Cached::Vacant,
            timestamp,
            pending: Some(pending),
            refreshing: false,
        }
    }

    /// Creates an entry holding a settled value.
    pub(crate) fn settled(key: String, value: Option<V>, timestamp: Option<Instant>) -> Self {
        Self {
            key,
            value: Cached::Present(value),
            timestamp,
            pending: None,
            refreshing: false,
        }
    }

    /// Returns true if this entry has a producer call in flight.
    #[inline]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Installs a settled value and clears the pending future.
    #[inline]
    pub(crate) fn settle(&mut self, value: Option<V>) {
        self.value = Cached::Present(value);
        self.pending = None;
    }

    /// Returns true if the entry was populated strictly before `deadline`.
    ///
    /// Entries without a timestamp are never considered stale.
    #[inline]
    pub(crate) fn populated_before(&self, deadline: Instant) -> bool {
        self.timestamp.map_or(false, |timestamp| timestamp < deadline)
    }
}

impl<V: fmt::Debug> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match &self.value {
            Cached::Vacant => None,
            Cached::Present(value) => Some(value),
        };
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("value", &value)
            .field("timestamp", &self.timestamp)
            .field("pending", &self.is_pending())
            .field("refreshing", &self.refreshing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_settled_entry() {
        let entry = Entry::settled("key".to_string(), Some(42), None);
        assert_eq!(entry.key, "key");
        assert_eq!(entry.value.as_value(), Some(&42));
        assert!(entry.value.is_present());
        assert!(!entry.is_pending());
        assert!(!entry.refreshing);
    }

    #[test]
    fn test_absent_value_is_present_but_empty() {
        let entry: Entry<i32> = Entry::settled("key".to_string(), None, None);
        assert!(entry.value.is_present());
        assert_eq!(entry.value.as_value(), None);
    }

    #[test]
    fn test_populated_before() {
        let now = Instant::now();
        let entry = Entry::settled("key".to_string(), Some(1), Some(now));
        assert!(entry.populated_before(now + Duration::from_secs(1)));
        assert!(!entry.populated_before(now));

        let untracked = Entry::settled("key".to_string(), Some(1), None);
        assert!(!untracked.populated_before(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_debug_impl() {
        let entry = Entry::settled("key".to_string(), Some(42), None);
        let debug_str = format!("{:?}", entry);
        assert!(debug_str.contains("Entry"));
        assert!(debug_str.contains("key"));
        assert!(debug_str.contains("42"));
    }
}
