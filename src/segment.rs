//! The lock-protected cache state.
//!
//! A [`Segment`] pairs the key index with the recency list and implements the
//! structural operations on both: linking, unlinking and the two expiry sweeps.
//! It knows nothing about producers, futures or counters; the
//! [`RefreshCache`](crate::RefreshCache) wraps it in a mutex and drives it.
//!
//! # Invariants
//!
//! - A key is in `map` iff its entry is linked in `list`, and the handle stored
//!   in `map` is the handle of that entry.
//! - `list` is ordered by population: new entries are appended at the youngest
//!   end and the sweeps consume from the oldest end.

use core::fmt;

use tokio::time::Instant;

use crate::entry::Entry;
use crate::list::{Handle, List};

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// Index and recency list of a cache.
pub(crate) struct Segment<V> {
    map: HashMap<String, Handle>,
    list: List<Entry<V>>,
}

impl<V> Segment<V> {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Segment {
            map: HashMap::with_capacity(cap),
            list: List::with_capacity(cap),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Returns the handle of the entry stored under `key`.
    #[inline]
    pub(crate) fn handle(&self, key: &str) -> Option<Handle> {
        self.map.get(key).copied()
    }

    /// Returns the entry stored under `key`.
    pub(crate) fn get(&self, key: &str) -> Option<&Entry<V>> {
        let handle = self.handle(key)?;
        self.list.get(handle)
    }

    /// Returns the entry behind `handle`, unless it has been removed since.
    #[inline]
    pub(crate) fn entry_mut(&mut self, handle: Handle) -> Option<&mut Entry<V>> {
        self.list.get_mut(handle)
    }

    /// Links a new entry at the youngest end and indexes it.
    ///
    /// An existing entry for the same key is unlinked first.
    pub(crate) fn insert(&mut self, entry: Entry<V>) -> Handle {
        let key = entry.key.clone();
        if let Some(previous) = self.map.remove(&key) {
            self.list.remove(previous);
        }
        let handle = self.list.push_youngest(entry);
        self.map.insert(key, handle);
        debug_assert_eq!(self.map.len(), self.list.len());
        handle
    }

    /// Unlinks and returns the entry stored under `key`.
    pub(crate) fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let handle = self.map.remove(key)?;
        self.list.remove(handle)
    }

    /// Unlinks and returns the entry behind `handle`.
    ///
    /// Does nothing if the entry was already removed, even if a newer entry for
    /// the same key exists.
    pub(crate) fn remove_handle(&mut self, handle: Handle) -> Option<Entry<V>> {
        let entry = self.list.remove(handle)?;
        if self.map.get(entry.key.as_str()) == Some(&handle) {
            self.map.remove(entry.key.as_str());
        }
        Some(entry)
    }

    /// Moves the entry behind `handle` to the youngest end.
    #[inline]
    pub(crate) fn relink(&mut self, handle: Handle) -> bool {
        self.list.move_to_youngest(handle)
    }

    /// Evicts the oldest entries until at most `max_size` remain.
    ///
    /// Returns the number of evicted entries.
    pub(crate) fn evict_to(&mut self, max_size: usize) -> usize {
        let mut evicted = 0;
        while self.map.len() > max_size {
            match self.list.pop_oldest() {
                Some(entry) => {
                    self.map.remove(entry.key.as_str());
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    /// Expires entries from the oldest end while they were populated before
    /// `deadline`.
    ///
    /// The sweep stops at the first entry that is not stale, so it relies on the
    /// list being ordered by population time. A stale entry still waiting for its
    /// producer call is moved to the youngest end instead; it gets a fresh
    /// timestamp when the call lands.
    ///
    /// Returns the number of expired entries.
    pub(crate) fn expire_before(&mut self, deadline: Instant) -> usize {
        let mut expired = 0;
        let mut deferred = 0;
        while deferred < self.list.len() {
            let awaiting = match self.list.oldest() {
                Some(entry) if entry.populated_before(deadline) => !entry.value.is_present(),
                _ => break,
            };
            let Some(handle) = self.list.oldest_handle() else {
                break;
            };
            if awaiting {
                self.list.move_to_youngest(handle);
                deferred += 1;
            } else if let Some(entry) = self.list.remove(handle) {
                self.map.remove(entry.key.as_str());
                expired += 1;
            }
        }
        expired
    }

    /// Drops every entry.
    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
    }

    /// Iterates over the keys from oldest to youngest.
    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.list.iter().map(|entry| entry.key.as_str())
    }
}

impl<V> fmt::Debug for Segment<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("len", &self.map.len())
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
