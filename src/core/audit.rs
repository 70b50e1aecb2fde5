//! Audit sink implementations.
//!
//! Provides in-memory logging and Postgres schema definitions for decision
//! audit persistence.

use std::collections::VecDeque;

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Scope summary the event relates to (account id, or "batch").
    pub scope: String,
    /// Action taken (check_allow, check_deny, bulk_check, config_import,
    /// cache_clear).
    pub action: String,
    /// Timestamp in seconds since the epoch.
    pub created_at: u64,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Postgres-backed audit sink (schema-only; DB I/O not wired).
pub struct PostgresAuditSink;

impl PostgresAuditSink {
    /// Returns SQL migration statements for the decision audit log.
    pub fn migrations() -> &'static [&'static str] {
        &[
            r#"
CREATE TABLE IF NOT EXISTS postgate_audit_events (
    event_id TEXT PRIMARY KEY,
    scope TEXT NOT NULL,
    action TEXT NOT NULL,
    detail JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_postgate_audit_events_scope_created ON postgate_audit_events (scope, created_at);
CREATE INDEX IF NOT EXISTS idx_postgate_audit_events_action ON postgate_audit_events (action);
"#,
        ]
    }
}

impl AuditSink for PostgresAuditSink {
    fn record(&mut self, _event: AuditEvent) {
        // Stub: actual DB writes require a runtime + client; left to integration layer.
    }
}

/// Helper to build an audit event from context. `at` is engine time from
/// the injected clock, never wall time read directly.
pub fn build_audit_event(
    scope: impl Into<String>,
    action: impl Into<String>,
    at: u64,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        scope: scope.into(),
        action: action.into(),
        created_at: at,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_records_events() {
        let mut sink = InMemoryAuditSink::new(10);
        sink.record(build_audit_event("a1", "check_allow", 1_000, None));
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].scope, "a1");
        assert_eq!(events[0].action, "check_allow");
        assert_eq!(events[0].created_at, 1_000);
    }

    #[test]
    fn sink_overflow_drops_oldest() {
        let mut sink = InMemoryAuditSink::new(2);
        sink.record(build_audit_event("a1", "check_allow", 1, None));
        sink.record(build_audit_event("a2", "check_deny", 2, None));
        sink.record(build_audit_event("a3", "check_allow", 3, None));
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].scope, "a2");
        assert_eq!(events[1].scope, "a3");
    }
}
