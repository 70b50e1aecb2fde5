//! Process-local cache store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::ScopeRef;
use crate::infra::cache::{CacheKey, CacheStore, CachedCount};

/// In-process map-backed cache store.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<CacheKey, CachedCount>>,
}

impl InMemoryCacheStore {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resident entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Option<CachedCount> {
        self.entries.lock().get(key).copied()
    }

    async fn set(&self, key: CacheKey, entry: CachedCount) {
        self.entries.lock().insert(key, entry);
    }

    async fn invalidate_scope(&self, scope: &ScopeRef) {
        self.entries.lock().retain(|k, _| k.scope != *scope);
    }

    async fn clear_all(&self) {
        self.entries.lock().clear();
    }
}
