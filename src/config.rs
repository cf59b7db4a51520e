//! Cache Configuration Module
//!
//! This module provides [`RefreshCacheConfig`], the configuration for a
//! [`RefreshCache`](crate::RefreshCache).
//!
//! # Design Philosophy
//!
//! Configuration structs have all public fields for simple instantiation, and a
//! `Default` impl for the common case:
//!
//! - **Simple**: Just create the struct and override what you need
//! - **Validated once**: Inconsistent durations are rejected when the cache is
//!   built, never at lookup time
//!
//! # Durations
//!
//! | Field | Effect |
//! |-------|--------|
//! | `max_age` | Entries populated longer ago than this are expired on the next lookup |
//! | `refresh_after` | A hit on an entry older than this starts a background refresh |
//! | `jitter` | A random offset in `[0, jitter)` added to every timestamp |
//!
//! The relationships are checked by [`RefreshCacheConfig::validate`]:
//!
//! ```text
//! jitter < refresh_after < max_age
//! ```
//!
//! Jitter desynchronizes entries that were populated at the same moment, so that
//! they do not all expire (or refresh) in the same instant.
//!
//! # Examples
//!
//! ```
//! use refresh_lru::config::RefreshCacheConfig;
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! let config = RefreshCacheConfig {
//!     max_size: NonZeroUsize::new(10_000).unwrap(),
//!     max_age: Some(Duration::from_secs(300)),
//!     refresh_after: Some(Duration::from_secs(240)),
//!     jitter: Some(Duration::from_secs(30)),
//!     ..RefreshCacheConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use core::fmt;
use core::num::NonZeroUsize;
use std::time::Duration;

use crate::error::ConfigError;

/// Default maximum number of entries.
pub const DEFAULT_MAX_SIZE: usize = 1024;

/// Configuration for a [`RefreshCache`](crate::RefreshCache).
///
/// # Fields
///
/// - `max_size`: Maximum number of entries. The oldest entries are evicted
///   once a lookup or insertion pushes the cache above it.
/// - `max_age`: Optional maximum age of an entry. `None` disables age expiry.
/// - `refresh_after`: Optional age after which a hit triggers a background
///   refresh. Must be less than `max_age` when both are set.
/// - `jitter`: Optional upper bound of the random offset added to timestamps.
///   Must be less than `refresh_after` and `max_age`, and requires one of them.
/// - `cache_undefined`: Whether an absent value returned by the producer is
///   cached. When `false`, the absent value is handed to the caller but the next
///   lookup calls the producer again.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RefreshCacheConfig {
    /// Maximum number of entries the cache can hold.
    pub max_size: NonZeroUsize,
    /// Maximum age of an entry, or `None` for no age expiry.
    pub max_age: Option<Duration>,
    /// Age after which a hit refreshes the entry in the background.
    pub refresh_after: Option<Duration>,
    /// Upper bound of the random offset added to entry timestamps.
    pub jitter: Option<Duration>,
    /// Whether absent producer results are cached.
    pub cache_undefined: bool,
}

impl RefreshCacheConfig {
    /// Creates a configuration with the given maximum number of entries and no
    /// age expiry or refresh.
    pub fn new(max_size: NonZeroUsize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    /// Checks the relationships between the configured durations.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::RefreshNotBeforeMaxAge`] if `refresh_after >= max_age`
    /// - [`ConfigError::JitterTooLarge`] if `jitter` is not below the
    ///   refresh-after or max-age bound
    /// - [`ConfigError::JitterWithoutExpiry`] if `jitter` is set on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(refresh_after), Some(max_age)) = (self.refresh_after, self.max_age) {
            if refresh_after >= max_age {
                return Err(ConfigError::RefreshNotBeforeMaxAge {
                    refresh_after,
                    max_age,
                });
            }
        }

        if let Some(jitter) = self.jitter {
            if self.refresh_after.is_none() && self.max_age.is_none() {
                return Err(ConfigError::JitterWithoutExpiry);
            }
            for bound in [self.refresh_after, self.max_age].into_iter().flatten() {
                if jitter >= bound {
                    return Err(ConfigError::JitterTooLarge { jitter, bound });
                }
            }
        }

        Ok(())
    }

    /// Returns true if entries need a timestamp, i.e. age expiry or refresh is on.
    #[inline]
    pub fn tracks_age(&self) -> bool {
        self.max_age.is_some() || self.refresh_after.is_some()
    }
}

impl Default for RefreshCacheConfig {
    fn default() -> Self {
        Self {
            max_size: NonZeroUsize::new(DEFAULT_MAX_SIZE).unwrap_or(NonZeroUsize::MIN),
            max_age: None,
            refresh_after: None,
            jitter: None,
            cache_undefined: true,
        }
    }
}

impl fmt::Debug for RefreshCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCacheConfig")
            .field("max_size", &self.max_size)
            .field("max_age", &self.max_age)
            .field("refresh_after", &self.refresh_after)
            .field("jitter", &self.jitter)
            .field("cache_undefined", &self.cache_undefined)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Option<Duration> {
        Some(Duration::from_secs(n))
    }

    #[test]
    fn test_default_config() {
        let config = RefreshCacheConfig::default();
        assert_eq!(config.max_size.get(), 1024);
        assert!(config.max_age.is_none());
        assert!(config.refresh_after.is_none());
        assert!(config.jitter.is_none());
        assert!(config.cache_undefined);
        assert!(!config.tracks_age());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_config() {
        let config = RefreshCacheConfig::new(NonZeroUsize::new(2).unwrap());
        assert_eq!(config.max_size.get(), 2);
        assert!(config.cache_undefined);
    }

    #[test]
    fn test_refresh_must_precede_max_age() {
        let config = RefreshCacheConfig {
            max_age: secs(10),
            refresh_after: secs(10),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RefreshNotBeforeMaxAge {
                refresh_after: Duration::from_secs(10),
                max_age: Duration::from_secs(10),
            })
        );

        let config = RefreshCacheConfig {
            max_age: secs(10),
            refresh_after: secs(5),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.tracks_age());
    }

    #[test]
    fn test_refresh_without_max_age_is_valid() {
        let config = RefreshCacheConfig {
            refresh_after: secs(5),
            jitter: secs(1),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RefreshCacheConfig {
            max_age: secs(10),
            jitter: secs(10),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::JitterTooLarge {
                jitter: Duration::from_secs(10),
                bound: Duration::from_secs(10),
            })
        );

        // checked against refresh_after too when both are set
        let config = RefreshCacheConfig {
            max_age: secs(10),
            refresh_after: secs(4),
            jitter: secs(5),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::JitterTooLarge {
                jitter: Duration::from_secs(5),
                bound: Duration::from_secs(4),
            })
        );

        let config = RefreshCacheConfig {
            max_age: secs(10),
            refresh_after: secs(6),
            jitter: secs(5),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jitter_requires_expiry() {
        let config = RefreshCacheConfig {
            jitter: secs(1),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::JitterWithoutExpiry));
    }
}
