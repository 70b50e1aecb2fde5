//! Infrastructure adapters for usage counters and read caches.

pub mod cache;
pub mod store;

pub use cache::{CacheKey, CacheStore, CachedCount, InMemoryCacheStore};
pub use store::{InMemoryUsageStore, PostgresUsageStore, UsageStore};
