//! Core admission-control abstractions and decision logic.

pub mod audit;
pub mod bulk;
pub mod error;
pub mod evaluator;
pub mod health;
pub mod rules;
pub mod usage;

pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink, PostgresAuditSink};
pub use bulk::{
    BlockedPost, BulkEvaluator, BulkLimits, BulkResult, BulkSummary, CandidatePost,
    SuggestedAlternative,
};
pub use error::{AppResult, EngineError};
pub use evaluator::{CapacityDecision, CapacityEvaluator, DenyReason, UsageOverlay, Violation};
pub use health::{DashboardStatus, HealthMonitor, HealthSummary, LimitStatus, StatusFilter};
pub use rules::{
    validate_rule, validate_rule_set, LimitRule, RuleFilter, RuleRegistry, ScopeRef, ScopeType,
};
pub use usage::CacheLayer;
