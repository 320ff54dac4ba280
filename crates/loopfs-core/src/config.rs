//! Filesystem configuration.
//!
//! The backing root itself is handed to the [`BackingStore`](crate::BackingStore)
//! once at construction and never changes afterwards; this struct carries
//! the remaining tunables that shape replies.

use crate::attr::{DEFAULT_ATTR_TTL, GENERATION};
use std::time::Duration;

/// Configuration options for the loopback core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsConfig {
    /// Validity hint attached to `getattr` replies.
    ///
    /// Default: 5 seconds.
    pub attr_ttl: Duration,

    /// Validity hint attached to `lookup` replies (name and attributes).
    ///
    /// Default: 5 seconds.
    pub entry_ttl: Duration,

    /// Generation number reported with entries. Default: 1.
    pub generation: u64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            attr_ttl: DEFAULT_ATTR_TTL,
            entry_ttl: DEFAULT_ATTR_TTL,
            generation: GENERATION,
        }
    }
}

impl FsConfig {
    /// Creates a configuration with the same TTL for attributes and entries.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            attr_ttl: ttl,
            entry_ttl: ttl,
            ..Default::default()
        }
    }

    /// Sets the attribute TTL.
    #[must_use]
    pub fn attr_ttl(mut self, ttl: Duration) -> Self {
        self.attr_ttl = ttl;
        self
    }

    /// Sets the entry TTL.
    #[must_use]
    pub fn entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }
}
