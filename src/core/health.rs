//! Violation aggregation and health scoring.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::evaluator::{CapacityEvaluator, Violation};
use crate::core::rules::{RuleRegistry, ScopeRef, ScopeType};
use crate::core::EngineError;
use crate::infra::store::UsageStore;
use crate::util::clock::Clock;

/// Optional constraints for a status sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusFilter {
    /// Only scopes at this level.
    pub scope_type: Option<ScopeType>,
    /// Only this scope id.
    pub scope_id: Option<String>,
}

/// Dashboard classification derived from the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardStatus {
    /// Score 80 or above.
    Healthy,
    /// Score 60 to 79.
    Degraded,
    /// Score below 60.
    Critical,
}

impl DashboardStatus {
    /// Classify a 0-100 health score.
    pub const fn from_score(score: u8) -> Self {
        if score >= 80 {
            Self::Healthy
        } else if score >= 60 {
            Self::Degraded
        } else {
            Self::Critical
        }
    }
}

/// Aggregate figures for a status sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// 0-100 aggregate; 100 means no active violations.
    pub health_score: u8,
    /// Rules evaluated across all checked scopes.
    pub total_rules: usize,
    /// Rules currently violated.
    pub violated_rules: usize,
    /// Dashboard classification of the score.
    pub status: DashboardStatus,
}

/// Current violations plus an aggregate health score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitStatus {
    /// Every active violation across the checked scopes.
    pub violations: Vec<Violation>,
    /// Scopes included in the sweep.
    pub checked_scopes: Vec<ScopeRef>,
    /// Aggregate figures.
    pub summary: HealthSummary,
}

/// Recomputes violations across known scopes and scores overall health.
pub struct HealthMonitor {
    evaluator: Arc<CapacityEvaluator>,
    rules: Arc<RuleRegistry>,
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
}

impl HealthMonitor {
    /// Create a monitor over the evaluator and the store's scope inventory.
    pub fn new(
        evaluator: Arc<CapacityEvaluator>,
        rules: Arc<RuleRegistry>,
        store: Arc<dyn UsageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            evaluator,
            rules,
            store,
            clock,
        }
    }

    /// Sweep every known scope matching `filter` and score the result.
    ///
    /// `health_score = clamp(100 - sum(penalty(priority)), 0, 100)` where
    /// the penalty shrinks as the priority number grows, so a priority-1
    /// violation hurts more than a priority-5 one.
    pub async fn status(&self, filter: &StatusFilter) -> Result<LimitStatus, EngineError> {
        let now = self.clock.now();
        let scopes: Vec<ScopeRef> = self
            .store
            .known_scopes()
            .await?
            .into_iter()
            .filter(|s| filter.scope_type.is_none_or(|t| s.scope_type == t))
            .filter(|s| {
                filter
                    .scope_id
                    .as_ref()
                    .is_none_or(|id| s.scope_id == *id)
            })
            .collect();

        let mut violations = Vec::new();
        let mut total_rules = 0;
        for scope in &scopes {
            total_rules += self.rules.rules_for(scope).len();
            violations.extend(self.evaluator.violations_for_scope(scope, now).await?);
        }

        let penalty_total: u32 = violations.iter().map(|v| penalty(v.rule.priority)).sum();
        #[allow(clippy::cast_possible_truncation)]
        let health_score = 100u32.saturating_sub(penalty_total).min(100) as u8;
        let summary = HealthSummary {
            health_score,
            total_rules,
            violated_rules: violations.len(),
            status: DashboardStatus::from_score(health_score),
        };
        tracing::debug!(
            checked_scopes = scopes.len(),
            violated_rules = summary.violated_rules,
            health_score,
            "status sweep complete"
        );

        Ok(LimitStatus {
            violations,
            checked_scopes: scopes,
            summary,
        })
    }
}

/// Penalty weight for one violation; priority 1 penalizes most.
const fn penalty(priority: u8) -> u32 {
    let p = if priority == 0 { 1 } else { priority as u32 };
    let weight = 25 / p;
    if weight < 3 {
        3
    } else {
        weight
    }
}
