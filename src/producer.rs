//! The producer seam.
//!
//! A [`Producer`] computes the value for a key on a cache miss (and again on a
//! refresh-ahead). It either answers synchronously with [`Produced::Value`] or
//! hands back a future with [`Produced::Future`], which the cache awaits on a
//! detached task. Failing synchronously and failing through the future are
//! treated the same way.
//!
//! Any `Fn(&str, A) -> Result<Produced<V>, ProducerError>` closure is a producer:
//!
//! ```
//! use refresh_lru::{Produced, ProducerError};
//!
//! let producer = |key: &str, multiplier: usize| -> Result<Produced<usize>, ProducerError> {
//!     Ok(Produced::Value(Some(key.len() * multiplier)))
//! };
//! # let _ = producer;
//! ```

use core::fmt;
use core::future::Future;

use futures::future::BoxFuture;

use crate::error::ProducerError;

/// The outcome of invoking a [`Producer`].
pub enum Produced<V> {
    /// A value that is available right away. `None` is an absent value.
    Value(Option<V>),
    /// A value that will be available once the future resolves.
    Future(BoxFuture<'static, Result<Option<V>, ProducerError>>),
}

impl<V> Produced<V> {
    /// Wraps a future that resolves to the produced value.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Option<V>, ProducerError>> + Send + 'static,
    {
        Produced::Future(Box::pin(future))
    }
}

impl<V> From<V> for Produced<V> {
    fn from(value: V) -> Self {
        Produced::Value(Some(value))
    }
}

impl<V: fmt::Debug> fmt::Debug for Produced<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Produced::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Produced::Future(_) => f.write_str("Future(..)"),
        }
    }
}

/// Computes values for a [`RefreshCache`](crate::RefreshCache).
///
/// `A` carries the extra arguments a caller passes to
/// [`RefreshCache::get`](crate::RefreshCache::get); they are forwarded verbatim.
/// The producer is called without any cache lock held, so it may be slow or
/// call back into the cache.
pub trait Producer<V, A = ()>: Send + Sync + 'static {
    /// Produces the value for `key`.
    fn produce(&self, key: &str, args: A) -> Result<Produced<V>, ProducerError>;
}

impl<V, A, F> Producer<V, A> for F
where
    F: Fn(&str, A) -> Result<Produced<V>, ProducerError> + Send + Sync + 'static,
{
    #[inline]
    fn produce(&self, key: &str, args: A) -> Result<Produced<V>, ProducerError> {
        self(key, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Length;

    impl Producer<usize> for Length {
        fn produce(&self, key: &str, _args: ()) -> Result<Produced<usize>, ProducerError> {
            Ok(key.len().into())
        }
    }

    #[test]
    fn test_struct_producer() {
        match Length.produce("four", ()) {
            Ok(Produced::Value(value)) => assert_eq!(value, Some(4)),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_closure_producer_with_args() {
        let producer = |key: &str, suffix: &'static str| -> Result<Produced<String>, ProducerError> {
            Ok(format!("{key}{suffix}").into())
        };
        match producer.produce("a", "!") {
            Ok(Produced::Value(value)) => assert_eq!(value.as_deref(), Some("a!")),
            _ => panic!("expected a value"),
        }
    }

    #[tokio::test]
    async fn test_future_producer() {
        let produced: Produced<u32> = Produced::future(async { Ok(Some(7)) });
        assert!(format!("{produced:?}").starts_with("Future"));
        match produced {
            Produced::Future(future) => assert_eq!(future.await.ok().flatten(), Some(7)),
            Produced::Value(_) => panic!("expected a future"),
        }
    }
}
