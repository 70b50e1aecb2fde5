//! Usage-counter backends.
//!
//! The store is the source of truth for per-scope, per-window action counts.
//! It is owned by the persistence layer; this crate only consumes the
//! contract and ships an in-memory implementation for tests and a Postgres
//! schema stub for integration layers to wire up.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryUsageStore;
pub use postgres::PostgresUsageStore;

use async_trait::async_trait;

use crate::core::{EngineError, ScopeRef};

/// Durable counter storage keyed by `(scope, window_secs, window_start)`.
///
/// Both window fields are part of the key: windows of different lengths can
/// start at the same instant (an hour and a day both begin at midnight) and
/// must not share a counter.
///
/// `increment` must be atomic under concurrent callers; that guarantee is
/// the storage layer's contract, not something this engine can add on top.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Current count for a scope's window. Missing windows read as 0.
    async fn get(
        &self,
        scope: &ScopeRef,
        window_secs: u64,
        window_start: u64,
    ) -> Result<u64, EngineError>;

    /// Atomically add one action to a scope's window and return the new
    /// count. Called by the posting pipeline after it commits an action,
    /// never by the engine itself.
    async fn increment(
        &self,
        scope: &ScopeRef,
        window_secs: u64,
        window_start: u64,
    ) -> Result<u64, EngineError>;

    /// Every scope with any recorded usage. Drives the health sweep.
    async fn known_scopes(&self) -> Result<Vec<ScopeRef>, EngineError>;
}
