//! Postgres-backed usage store (schema and interface stubs).

use async_trait::async_trait;

use crate::core::{EngineError, ScopeRef};
use crate::infra::store::UsageStore;

/// Postgres usage-store adapter placeholder.
///
/// Ships the schema and the atomic upsert statement; actual I/O requires a
/// database client and is left to the integration layer.
#[derive(Debug, Default)]
pub struct PostgresUsageStore;

impl PostgresUsageStore {
    /// Create a new adapter.
    pub fn new() -> Self {
        Self
    }

    /// Migration statements for the usage-window counters.
    pub fn migrations() -> &'static [&'static str] {
        &[
            r#"
CREATE TABLE IF NOT EXISTS postgate_usage_windows (
    scope_type TEXT NOT NULL,
    scope_id TEXT NOT NULL,
    window_secs BIGINT NOT NULL,
    window_start BIGINT NOT NULL,
    count BIGINT NOT NULL DEFAULT 0 CHECK (count >= 0),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (scope_type, scope_id, window_secs, window_start)
);
CREATE INDEX IF NOT EXISTS idx_postgate_usage_windows_scope ON postgate_usage_windows (scope_type, scope_id);
CREATE INDEX IF NOT EXISTS idx_postgate_usage_windows_start ON postgate_usage_windows (window_start);
"#,
        ]
    }

    /// Atomic compare-and-increment as a single upsert. The RETURNING value
    /// is the new count, matching [`UsageStore::increment`].
    pub const fn increment_sql() -> &'static str {
        r"
INSERT INTO postgate_usage_windows (scope_type, scope_id, window_secs, window_start, count)
VALUES ($1, $2, $3, $4, 1)
ON CONFLICT (scope_type, scope_id, window_secs, window_start)
DO UPDATE SET count = postgate_usage_windows.count + 1, updated_at = NOW()
RETURNING count
"
    }
}

#[async_trait]
impl UsageStore for PostgresUsageStore {
    async fn get(
        &self,
        _scope: &ScopeRef,
        _window_secs: u64,
        _window_start: u64,
    ) -> Result<u64, EngineError> {
        Err(EngineError::Backend(
            "postgres usage store not wired to database client".into(),
        ))
    }

    async fn increment(
        &self,
        _scope: &ScopeRef,
        _window_secs: u64,
        _window_start: u64,
    ) -> Result<u64, EngineError> {
        Err(EngineError::Backend(
            "postgres usage store not wired to database client".into(),
        ))
    }

    async fn known_scopes(&self) -> Result<Vec<ScopeRef>, EngineError> {
        Err(EngineError::Backend(
            "postgres usage store not wired to database client".into(),
        ))
    }
}
