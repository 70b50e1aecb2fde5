//! Single-candidate capacity evaluation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::audit::{build_audit_event, AuditSink};
use crate::core::rules::{LimitRule, RuleRegistry, ScopeRef, ScopeType};
use crate::core::usage::CacheLayer;
use crate::core::EngineError;
use crate::util::clock::Clock;

/// A rule whose usage meets or exceeds its limit for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The violated rule.
    pub rule: LimitRule,
    /// The scope the rule was evaluated against.
    pub scope: ScopeRef,
    /// Effective count at evaluation time.
    pub current_count: u64,
    /// The rule's limit.
    pub limit: u64,
    /// Start of the violated window.
    pub window_start: u64,
    /// Instant the window resets and capacity returns.
    pub resets_at: u64,
}

/// Why a check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// One or more limit rules are violated.
    LimitViolation,
    /// The usage store could not be read; the engine fails closed.
    StoreUnavailable,
}

/// Outcome of a capacity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityDecision {
    /// Whether the candidate may be scheduled.
    pub allowed: bool,
    /// Every violated rule across every scope in the request.
    pub violations: Vec<Violation>,
    /// Earliest window-reset time among violated rules, when denied.
    pub retry_after: Option<u64>,
    /// Why the check was denied, when it was.
    pub reason: Option<DenyReason>,
    /// Minimum headroom across applicable rules, when allowed and at least
    /// one rule applied.
    pub remaining_slots: Option<u64>,
}

impl CapacityDecision {
    fn denied(violations: Vec<Violation>) -> Self {
        let retry_after = violations.iter().map(|v| v.resets_at).min();
        Self {
            allowed: false,
            violations,
            retry_after,
            reason: Some(DenyReason::LimitViolation),
            remaining_slots: None,
        }
    }

    fn allowed(remaining_slots: Option<u64>) -> Self {
        Self {
            allowed: true,
            violations: Vec::new(),
            retry_after: None,
            reason: None,
            remaining_slots,
        }
    }

    /// Denied decision that carries no violations: the store was unreadable
    /// and the safe default is to refuse admission.
    pub const fn fail_closed() -> Self {
        Self {
            allowed: false,
            violations: Vec::new(),
            retry_after: None,
            reason: Some(DenyReason::StoreUnavailable),
            remaining_slots: None,
        }
    }
}

/// Request-scoped provisional usage deltas for batch evaluation.
///
/// Keyed like the store, by `(scope, window_secs, window_start)`. The
/// overlay lives only for the duration of one bulk call and is never
/// persisted or shared.
#[derive(Debug, Default)]
pub struct UsageOverlay {
    deltas: HashMap<(ScopeRef, u64, u64), u64>,
}

impl UsageOverlay {
    /// Create an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisional delta for one scope window.
    pub fn delta(&self, scope: &ScopeRef, window_secs: u64, window_start: u64) -> u64 {
        self.deltas
            .get(&(scope.clone(), window_secs, window_start))
            .copied()
            .unwrap_or(0)
    }

    /// Record one provisionally admitted action against every window the
    /// candidate touches. Windows are deduplicated so two rules sharing a
    /// window length count the action once.
    pub fn bump(&mut self, scopes: &[ScopeRef], rules_per_scope: &[Vec<LimitRule>], at: u64) {
        let mut touched: HashSet<(ScopeRef, u64, u64)> = HashSet::new();
        for (scope, rules) in scopes.iter().zip(rules_per_scope) {
            for rule in rules {
                touched.insert((scope.clone(), rule.window_secs, rule.window_start(at)));
            }
        }
        for key in touched {
            *self.deltas.entry(key).or_insert(0) += 1;
        }
    }
}

/// Shared handle to an optional audit sink.
pub(crate) type SharedAuditSink = Arc<Mutex<Box<dyn AuditSink>>>;

/// Read-only allow/deny decision engine for one candidate post.
///
/// Combines the active rules with cached usage reads. Never mutates usage;
/// incrementing happens in the posting pipeline after the action commits,
/// so checks are safe to run speculatively.
pub struct CapacityEvaluator {
    rules: Arc<RuleRegistry>,
    usage: Arc<CacheLayer>,
    clock: Arc<dyn Clock>,
    audit: Option<SharedAuditSink>,
}

impl CapacityEvaluator {
    /// Create an evaluator over a registry and a cached usage read path.
    pub fn new(rules: Arc<RuleRegistry>, usage: Arc<CacheLayer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            usage,
            clock,
            audit: None,
        }
    }

    /// Attach an audit sink recording allow/deny outcomes.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Check whether one more post may be admitted right now for an
    /// account, optionally inside a group and against an app integration.
    ///
    /// Composite semantics are AND across scopes and AND across rules
    /// within a scope: any single violation denies the whole request. A
    /// store failure also denies, with [`DenyReason::StoreUnavailable`].
    pub async fn check(
        &self,
        account_id: &str,
        group_id: Option<&str>,
        app_id: Option<&str>,
    ) -> Result<CapacityDecision, EngineError> {
        let scopes = scopes_for(account_id, group_id, app_id)?;
        let decision = match self.evaluate_at(&scopes, self.clock.now(), None).await {
            Ok(decision) => decision,
            Err(EngineError::StoreUnavailable(e) | EngineError::Backend(e)) => {
                tracing::warn!(account_id, error = %e, "usage store unreadable, failing closed");
                CapacityDecision::fail_closed()
            }
            Err(e) => return Err(e),
        };

        if decision.allowed {
            tracing::debug!(account_id, "capacity check allowed");
            self.record_audit(account_id, "check_allow", None);
        } else {
            tracing::info!(
                account_id,
                violations = decision.violations.len(),
                reason = ?decision.reason,
                "capacity check denied"
            );
            self.record_audit(
                account_id,
                "check_deny",
                Some(format!("violations={}", decision.violations.len())),
            );
        }
        Ok(decision)
    }

    /// Evaluate a scope set at an arbitrary instant, optionally against a
    /// provisional overlay. Shared by single checks, batch evaluation, and
    /// alternative-time probing.
    pub(crate) async fn evaluate_at(
        &self,
        scopes: &[ScopeRef],
        at: u64,
        overlay: Option<&UsageOverlay>,
    ) -> Result<CapacityDecision, EngineError> {
        let mut violations = Vec::new();
        let mut headroom: Option<u64> = None;

        for scope in scopes {
            for rule in self.rules.rules_for(scope) {
                let window_start = rule.window_start(at);
                let live = self.usage.count(scope, rule.window_secs, window_start).await?;
                let provisional =
                    overlay.map_or(0, |o| o.delta(scope, rule.window_secs, window_start));
                let effective = live + provisional;

                if effective >= rule.max_actions {
                    violations.push(Violation {
                        scope: scope.clone(),
                        current_count: effective,
                        limit: rule.max_actions,
                        window_start,
                        resets_at: window_start + rule.window_secs,
                        rule,
                    });
                } else {
                    let slack = rule.max_actions - effective;
                    headroom = Some(headroom.map_or(slack, |h| h.min(slack)));
                }
            }
        }

        if violations.is_empty() {
            Ok(CapacityDecision::allowed(headroom))
        } else {
            Ok(CapacityDecision::denied(violations))
        }
    }

    /// Violations for a single scope at `at`. Used by the health sweep.
    pub async fn violations_for_scope(
        &self,
        scope: &ScopeRef,
        at: u64,
    ) -> Result<Vec<Violation>, EngineError> {
        let decision = self
            .evaluate_at(std::slice::from_ref(scope), at, None)
            .await?;
        Ok(decision.violations)
    }

    /// Rule snapshots per scope, aligned with `scopes` by index.
    pub(crate) fn rules_per_scope(&self, scopes: &[ScopeRef]) -> Vec<Vec<LimitRule>> {
        scopes.iter().map(|s| self.rules.rules_for(s)).collect()
    }

    #[allow(dead_code)]
    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn record_audit(&self, scope: &str, action: &str, detail: Option<String>) {
        if let Some(audit) = &self.audit {
            let mut sink = audit.lock();
            sink.record(build_audit_event(scope, action, self.clock.now(), detail));
        }
    }
}

/// Build the scope set present in a request: account always, group and app
/// only when provided. Empty identifiers are rejected before evaluation.
pub(crate) fn scopes_for(
    account_id: &str,
    group_id: Option<&str>,
    app_id: Option<&str>,
) -> Result<Vec<ScopeRef>, EngineError> {
    ensure_id("account_id", account_id)?;
    let mut scopes = vec![ScopeRef::new(ScopeType::Account, account_id)];
    if let Some(group) = group_id {
        ensure_id("group_id", group)?;
        scopes.push(ScopeRef::new(ScopeType::Group, group));
    }
    if let Some(app) = app_id {
        ensure_id("app_id", app)?;
        scopes.push(ScopeRef::new(ScopeType::App, app));
    }
    Ok(scopes)
}

fn ensure_id(field: &str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_set_includes_optional_levels() {
        let scopes = scopes_for("a1", Some("g1"), Some("app1")).unwrap();
        assert_eq!(scopes.len(), 3);
        assert_eq!(scopes[0].scope_type, ScopeType::Account);
        assert_eq!(scopes[1].scope_type, ScopeType::Group);
        assert_eq!(scopes[2].scope_type, ScopeType::App);

        let account_only = scopes_for("a1", None, None).unwrap();
        assert_eq!(account_only.len(), 1);
    }

    #[test]
    fn empty_ids_are_rejected() {
        assert!(scopes_for("", None, None).is_err());
        assert!(scopes_for("a1", Some("  "), None).is_err());
        assert!(scopes_for("a1", None, Some("")).is_err());
    }

    #[test]
    fn overlay_deduplicates_shared_windows() {
        let scope = ScopeRef::new(ScopeType::Account, "a1");
        let hourly = LimitRule {
            id: "hourly".into(),
            scope_type: ScopeType::Account,
            window_secs: 3600,
            max_actions: 5,
            priority: 1,
            scope_id_filter: None,
        };
        let hourly_narrow = LimitRule {
            scope_id_filter: Some("a1".into()),
            id: "hourly-a1".into(),
            ..hourly.clone()
        };

        let mut overlay = UsageOverlay::new();
        overlay.bump(
            std::slice::from_ref(&scope),
            &[vec![hourly.clone(), hourly_narrow]],
            100,
        );
        // Both rules share the hour window; the action counts once.
        assert_eq!(overlay.delta(&scope, 3600, 0), 1);

        overlay.bump(std::slice::from_ref(&scope), &[vec![hourly]], 200);
        assert_eq!(overlay.delta(&scope, 3600, 0), 2);
        assert_eq!(overlay.delta(&scope, 3600, 3600), 0);
    }
}
