//! In-memory usage store for development and testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{EngineError, ScopeRef};
use crate::infra::store::UsageStore;

type WindowKey = (ScopeRef, u64, u64);

/// Usage counters held in a process-local map.
///
/// Increments are atomic under the interior mutex, which satisfies the
/// store contract within a single process. The `set_failing` toggle lets
/// tests exercise the engine's fail-closed path.
#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    counts: Mutex<HashMap<WindowKey, u64>>,
    failing: AtomicBool,
}

impl InMemoryUsageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load a counter, replacing any existing value.
    pub fn seed(&self, scope: ScopeRef, window_secs: u64, window_start: u64, count: u64) {
        self.counts
            .lock()
            .insert((scope, window_secs, window_start), count);
    }

    /// Toggle simulated outage: while set, every operation fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    fn check_available(&self) -> Result<(), EngineError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(EngineError::StoreUnavailable(
                "in-memory store marked failing".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn get(
        &self,
        scope: &ScopeRef,
        window_secs: u64,
        window_start: u64,
    ) -> Result<u64, EngineError> {
        self.check_available()?;
        let counts = self.counts.lock();
        Ok(counts
            .get(&(scope.clone(), window_secs, window_start))
            .copied()
            .unwrap_or(0))
    }

    async fn increment(
        &self,
        scope: &ScopeRef,
        window_secs: u64,
        window_start: u64,
    ) -> Result<u64, EngineError> {
        self.check_available()?;
        let mut counts = self.counts.lock();
        let entry = counts
            .entry((scope.clone(), window_secs, window_start))
            .or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn known_scopes(&self) -> Result<Vec<ScopeRef>, EngineError> {
        self.check_available()?;
        let counts = self.counts.lock();
        let distinct: HashSet<ScopeRef> = counts.keys().map(|(s, _, _)| s.clone()).collect();
        let mut scopes: Vec<ScopeRef> = distinct.into_iter().collect();
        scopes.sort_by(|a, b| a.scope_id.cmp(&b.scope_id));
        Ok(scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScopeType;

    fn account(id: &str) -> ScopeRef {
        ScopeRef::new(ScopeType::Account, id)
    }

    #[tokio::test]
    async fn increment_returns_new_count() {
        let store = InMemoryUsageStore::new();
        let scope = account("a1");
        assert_eq!(store.get(&scope, 3600, 0).await.unwrap(), 0);
        assert_eq!(store.increment(&scope, 3600, 0).await.unwrap(), 1);
        assert_eq!(store.increment(&scope, 3600, 0).await.unwrap(), 2);
        assert_eq!(store.get(&scope, 3600, 0).await.unwrap(), 2);
        // A different window length at the same start is a separate counter.
        assert_eq!(store.get(&scope, 86_400, 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn known_scopes_deduplicates() {
        let store = InMemoryUsageStore::new();
        let scope = account("a1");
        store.increment(&scope, 3600, 0).await.unwrap();
        store.increment(&scope, 86_400, 0).await.unwrap();
        store
            .increment(&account("a2"), 3600, 0)
            .await
            .unwrap();
        let scopes = store.known_scopes().await.unwrap();
        assert_eq!(scopes.len(), 2);
    }

    #[tokio::test]
    async fn failing_store_errors_every_operation() {
        let store = InMemoryUsageStore::new();
        store.set_failing(true);
        let scope = account("a1");
        assert!(matches!(
            store.get(&scope, 3600, 0).await,
            Err(EngineError::StoreUnavailable(_))
        ));
        assert!(store.increment(&scope, 3600, 0).await.is_err());
        store.set_failing(false);
        assert!(store.get(&scope, 3600, 0).await.is_ok());
    }
}
