//! Read-cache backends for usage counters.
//!
//! The cache is a read optimization only; correctness never depends on it.
//! The trait is async so an external shared cache (e.g. Redis) can slot in
//! without touching evaluator logic.

pub mod memory;

pub use memory::InMemoryCacheStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::ScopeRef;

/// Cache key for one scope's counter in one window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Scope the counter belongs to.
    pub scope: ScopeRef,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Window start in seconds since the epoch.
    pub window_start: u64,
}

impl CacheKey {
    /// Build a cache key.
    pub const fn new(scope: ScopeRef, window_secs: u64, window_start: u64) -> Self {
        Self {
            scope,
            window_secs,
            window_start,
        }
    }
}

/// A cached counter value with its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCount {
    /// Counter value at read time.
    pub count: u64,
    /// Absolute expiry in seconds since the epoch; never served at or
    /// beyond this instant.
    pub expires_at: u64,
}

/// Pluggable TTL cache over usage counters.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch an entry, expired or not; the caller checks `expires_at`.
    async fn get(&self, key: &CacheKey) -> Option<CachedCount>;

    /// Insert or replace an entry.
    async fn set(&self, key: CacheKey, entry: CachedCount);

    /// Drop every entry for one scope, across all windows.
    async fn invalidate_scope(&self, scope: &ScopeRef);

    /// Drop everything. Subsequent reads are forced to storage.
    async fn clear_all(&self);
}
