//! Limit rules, scopes, and the active-rule registry.

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::EngineError;

/// Level at which a quota is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    /// A single social account.
    Account,
    /// A group of accounts managed together.
    Group,
    /// An application-level integration shared by many accounts.
    App,
}

/// A concrete scope a candidate post counts against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeRef {
    /// Scope level.
    pub scope_type: ScopeType,
    /// Identifier within that level.
    pub scope_id: String,
}

impl ScopeRef {
    /// Build a scope reference.
    pub fn new(scope_type: ScopeType, scope_id: impl Into<String>) -> Self {
        Self {
            scope_type,
            scope_id: scope_id.into(),
        }
    }
}

/// A time-windowed quota definition.
///
/// At most one rule may be active per `(scope_type, window_secs,
/// scope_id_filter)` key; the registry enforces this on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    /// Stable rule identifier, unique within the active set.
    pub id: String,
    /// Scope level the rule applies to.
    pub scope_type: ScopeType,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Maximum actions allowed per window.
    pub max_actions: u64,
    /// Priority, 1 = most critical. Drives listing order and health penalties.
    pub priority: u8,
    /// Restrict the rule to one scope id instead of every scope of its type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id_filter: Option<String>,
}

impl LimitRule {
    /// Start of the window containing `at` for this rule's window length.
    ///
    /// `window_secs` is validated non-zero before a rule enters the registry.
    pub const fn window_start(&self, at: u64) -> u64 {
        (at / self.window_secs) * self.window_secs
    }

    /// Whether this rule applies to `scope`.
    pub fn applies_to(&self, scope: &ScopeRef) -> bool {
        self.scope_type == scope.scope_type
            && self
                .scope_id_filter
                .as_ref()
                .is_none_or(|id| *id == scope.scope_id)
    }

    fn key(&self) -> (ScopeType, u64, Option<&str>) {
        (
            self.scope_type,
            self.window_secs,
            self.scope_id_filter.as_deref(),
        )
    }
}

/// Optional constraints for [`RuleRegistry::list`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFilter {
    /// Only rules at this scope level.
    pub scope_type: Option<ScopeType>,
    /// Only rules at least this critical (priority <= `max_priority`).
    pub max_priority: Option<u8>,
}

/// Validate a single rule's fields.
pub fn validate_rule(rule: &LimitRule) -> Result<(), EngineError> {
    if rule.id.trim().is_empty() {
        return Err(EngineError::Validation("rule id must not be empty".into()));
    }
    if rule.window_secs == 0 {
        return Err(EngineError::Validation(format!(
            "rule `{}`: window_secs must be greater than 0",
            rule.id
        )));
    }
    if rule.max_actions == 0 {
        return Err(EngineError::Validation(format!(
            "rule `{}`: max_actions must be greater than 0",
            rule.id
        )));
    }
    if rule.priority == 0 {
        return Err(EngineError::Validation(format!(
            "rule `{}`: priority must be at least 1",
            rule.id
        )));
    }
    if rule
        .scope_id_filter
        .as_ref()
        .is_some_and(|f| f.trim().is_empty())
    {
        return Err(EngineError::Validation(format!(
            "rule `{}`: scope_id_filter must not be empty when present",
            rule.id
        )));
    }
    Ok(())
}

/// Validate a full rule set: every rule individually, plus id and
/// `(scope_type, window_secs, scope_id_filter)` uniqueness across the set.
pub fn validate_rule_set(rules: &[LimitRule]) -> Result<(), EngineError> {
    let mut ids = HashSet::new();
    let mut keys = HashSet::new();
    for rule in rules {
        validate_rule(rule)?;
        if !ids.insert(rule.id.as_str()) {
            return Err(EngineError::RuleConflict(format!(
                "duplicate rule id `{}`",
                rule.id
            )));
        }
        if !keys.insert(rule.key()) {
            return Err(EngineError::RuleConflict(format!(
                "rule `{}` duplicates an existing (scope_type, window_secs, filter) key",
                rule.id
            )));
        }
    }
    Ok(())
}

/// Holds the active rule set and swaps it atomically.
///
/// Readers always observe a complete set: `replace_all` validates the whole
/// incoming set before taking the write lock, so a mixed old/new view is
/// never possible.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: RwLock<Vec<LimitRule>>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single rule, rejecting invalid fields and key conflicts.
    pub fn register(&self, rule: LimitRule) -> Result<(), EngineError> {
        validate_rule(&rule)?;
        let mut rules = self.rules.write();
        if rules.iter().any(|r| r.id == rule.id) {
            return Err(EngineError::RuleConflict(format!(
                "duplicate rule id `{}`",
                rule.id
            )));
        }
        if rules.iter().any(|r| r.key() == rule.key()) {
            return Err(EngineError::RuleConflict(format!(
                "rule `{}` duplicates an active (scope_type, window_secs, filter) key",
                rule.id
            )));
        }
        tracing::debug!(rule_id = %rule.id, "rule registered");
        rules.push(rule);
        Ok(())
    }

    /// List active rules matching `filter`, most critical first (ascending
    /// priority, ties by id).
    pub fn list(&self, filter: &RuleFilter) -> Vec<LimitRule> {
        let rules = self.rules.read();
        let mut out: Vec<LimitRule> = rules
            .iter()
            .filter(|r| filter.scope_type.is_none_or(|t| r.scope_type == t))
            .filter(|r| filter.max_priority.is_none_or(|p| r.priority <= p))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Snapshot of the rules applicable to one scope, priority ascending.
    pub fn rules_for(&self, scope: &ScopeRef) -> Vec<LimitRule> {
        let rules = self.rules.read();
        let mut out: Vec<LimitRule> = rules
            .iter()
            .filter(|r| r.applies_to(scope))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Replace the entire active set atomically. The previous set stays
    /// active if any incoming rule is invalid.
    pub fn replace_all(&self, rules: Vec<LimitRule>) -> Result<(), EngineError> {
        validate_rule_set(&rules)?;
        let count = rules.len();
        *self.rules.write() = rules;
        tracing::info!(rule_count = count, "active rule set replaced");
        Ok(())
    }

    /// Cloned copy of the full active set in insertion order.
    pub fn snapshot(&self) -> Vec<LimitRule> {
        self.rules.read().clone()
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Whether no rules are active.
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}
