//! Cache configuration.
//!
//! Controls the cache backend and per-view TTLs via the `[cache]` settings section.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_LIST_TTL_SECS: u64 = 300;
const DEFAULT_DETAIL_TTL_SECS: u64 = 600;
const DEFAULT_THREAD_TTL_SECS: u64 = 300;

/// Cache configuration resolved from settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve reads through the cache and invalidate on writes.
    pub enabled: bool,
    /// Maximum entries held by the in-process store.
    pub memory_capacity: usize,
    /// TTL (seconds) for list views; 0 keeps entries until invalidated.
    pub list_ttl_secs: u64,
    /// TTL (seconds) for detail views; 0 keeps entries until invalidated.
    pub detail_ttl_secs: u64,
    /// TTL (seconds) for comment threads; 0 keeps entries until invalidated.
    pub thread_ttl_secs: u64,
    /// Also delete every `<ns>:list:` key found by prefix listing, not only the well-known views.
    pub sweep_list_prefix: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            list_ttl_secs: DEFAULT_LIST_TTL_SECS,
            detail_ttl_secs: DEFAULT_DETAIL_TTL_SECS,
            thread_ttl_secs: DEFAULT_THREAD_TTL_SECS,
            sweep_list_prefix: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            memory_capacity: settings.memory_capacity.get(),
            list_ttl_secs: settings.list_ttl.as_secs(),
            detail_ttl_secs: settings.detail_ttl.as_secs(),
            thread_ttl_secs: settings.thread_ttl.as_secs(),
            sweep_list_prefix: settings.sweep_list_prefix,
        }
    }
}

impl CacheConfig {
    pub fn list_ttl(&self) -> Option<Duration> {
        ttl_from_secs(self.list_ttl_secs)
    }

    pub fn detail_ttl(&self) -> Option<Duration> {
        ttl_from_secs(self.detail_ttl_secs)
    }

    pub fn thread_ttl(&self) -> Option<Duration> {
        ttl_from_secs(self.thread_ttl_secs)
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

fn ttl_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
