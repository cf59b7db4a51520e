//! Error types.
//!
//! Only two things can go wrong from a caller's point of view: the cache was
//! configured inconsistently ([`ConfigError`], returned from
//! [`RefreshCache::init`](crate::RefreshCache::init)), or the producer failed
//! while filling a miss ([`Error`], returned through the lookup future).

use std::sync::Arc;
use std::time::Duration;

/// The error type producers return.
pub type ProducerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A cache configuration that cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `refresh_after` must be strictly less than `max_age`.
    #[error("refresh_after ({refresh_after:?}) must be less than max_age ({max_age:?})")]
    RefreshNotBeforeMaxAge {
        /// The configured refresh-after duration.
        refresh_after: Duration,
        /// The configured maximum age.
        max_age: Duration,
    },
    /// `jitter` must be strictly less than the refresh-after or max-age bound.
    #[error("jitter ({jitter:?}) must be less than {bound:?}")]
    JitterTooLarge {
        /// The configured jitter.
        jitter: Duration,
        /// The duration the jitter was checked against.
        bound: Duration,
    },
    /// `jitter` only makes sense together with `max_age` or `refresh_after`.
    #[error("jitter requires max_age or refresh_after to be set")]
    JitterWithoutExpiry,
}

/// The error a lookup future fails with.
///
/// This is cloneable so that every caller sharing a deduplicated producer call
/// receives the same failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The producer failed. Carries the producer's original error.
    #[error("producer failed")]
    Producer(#[source] Arc<dyn std::error::Error + Send + Sync + 'static>),
    /// The producer call was dropped before it settled, for example because it
    /// panicked or its runtime shut down.
    #[error("producer call was dropped before it settled")]
    Abandoned,
}

impl Error {
    pub(crate) fn producer(error: ProducerError) -> Self {
        Error::Producer(Arc::from(error))
    }

    /// Returns the producer's original error, if this is a producer failure.
    pub fn producer_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Producer(error) => Some(error.as_ref()),
            Error::Abandoned => None,
        }
    }
}
