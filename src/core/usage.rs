//! TTL-bounded read path over the usage store.

use std::sync::Arc;

use crate::core::{EngineError, ScopeRef};
use crate::infra::cache::{CacheKey, CacheStore, CachedCount};
use crate::infra::store::UsageStore;
use crate::util::clock::Clock;

/// Short-TTL read cache over a [`UsageStore`].
///
/// Serves fresh cache hits, falls through to the store on miss or expiry,
/// and repopulates. Staleness of a single-check decision is bounded by one
/// TTL interval; the store stays the source of truth throughout. Store
/// errors are propagated, never cached.
pub struct CacheLayer {
    store: Arc<dyn UsageStore>,
    cache: Arc<dyn CacheStore>,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl CacheLayer {
    /// Wire a cache over a store with the given TTL.
    pub fn new(
        store: Arc<dyn UsageStore>,
        cache: Arc<dyn CacheStore>,
        ttl_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            ttl_secs,
            clock,
        }
    }

    /// Current count for a scope's window, cached for up to one TTL.
    pub async fn count(
        &self,
        scope: &ScopeRef,
        window_secs: u64,
        window_start: u64,
    ) -> Result<u64, EngineError> {
        let now = self.clock.now();
        let key = CacheKey::new(scope.clone(), window_secs, window_start);
        if let Some(hit) = self.cache.get(&key).await {
            if hit.expires_at > now {
                return Ok(hit.count);
            }
        }
        let live = self.store.get(scope, window_secs, window_start).await?;
        tracing::trace!(
            scope_id = %scope.scope_id,
            window_start,
            count = live,
            "usage cache fall-through"
        );
        self.cache
            .set(
                key,
                CachedCount {
                    count: live,
                    expires_at: now + self.ttl_secs,
                },
            )
            .await;
        Ok(live)
    }

    /// Drop cached entries for one scope. Callers invalidate after
    /// committing an increment to bound staleness.
    pub async fn invalidate(&self, scope: &ScopeRef) {
        self.cache.invalidate_scope(scope).await;
    }

    /// Drop every cached entry; subsequent reads hit storage.
    pub async fn clear(&self) {
        self.cache.clear_all().await;
        tracing::debug!("usage cache cleared");
    }

    /// The underlying source-of-truth store.
    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }
}
