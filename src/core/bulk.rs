//! Batch capacity evaluation with provisional in-memory reservation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::evaluator::{scopes_for, CapacityEvaluator, UsageOverlay, Violation};
use crate::core::EngineError;

/// A post a caller would like to schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePost {
    /// Account the post publishes through.
    pub account_id: String,
    /// Account group, when the account belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// App-level integration, when one is involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Intended publish time, seconds since the epoch.
    pub scheduled_time: u64,
}

/// A candidate that could not be admitted, with the rules it tripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPost {
    /// The rejected candidate.
    pub post: CandidatePost,
    /// Violations at its scheduled time.
    pub violations: Vec<Violation>,
}

/// A later time at which a blocked candidate would be admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAlternative {
    /// The originally blocked candidate.
    pub post: CandidatePost,
    /// First probed time that passes capacity, batch-consistently.
    pub suggested_time: u64,
}

/// Aggregate counts for a bulk decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    /// Candidates submitted.
    pub total_posts: usize,
    /// Candidates admitted.
    pub allowed_count: usize,
    /// Candidates blocked.
    pub blocked_count: usize,
    /// Rounded percentage of admitted candidates, 0-100.
    pub success_rate: u8,
}

/// Outcome of a bulk capacity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    /// Admitted candidates, in chronological evaluation order.
    pub allowed: Vec<CandidatePost>,
    /// Blocked candidates with their violations.
    pub blocked: Vec<BlockedPost>,
    /// Alternative times for blocked candidates that fit within the
    /// lookahead horizon.
    pub alternatives: Vec<SuggestedAlternative>,
    /// Derived counts.
    pub summary: BulkSummary,
}

/// Bounds for batch evaluation and alternative-time search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLimits {
    /// Largest accepted batch; bigger requests are rejected outright.
    pub max_batch_size: usize,
    /// Floor for the forward-search step, seconds.
    pub min_step_secs: u64,
    /// Forward-search horizon from each candidate's scheduled time, seconds.
    pub lookahead_secs: u64,
}

impl Default for BulkLimits {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            min_step_secs: 300,
            lookahead_secs: 7 * 24 * 3600,
        }
    }
}

/// Evaluates a batch chronologically with intra-batch consistency.
///
/// Later candidates see the cumulative effect of earlier admissions through
/// a request-scoped [`UsageOverlay`]; durable storage is never touched.
pub struct BulkEvaluator {
    evaluator: Arc<CapacityEvaluator>,
    limits: BulkLimits,
}

impl BulkEvaluator {
    /// Create a bulk evaluator over a single-candidate evaluator.
    pub const fn new(evaluator: Arc<CapacityEvaluator>, limits: BulkLimits) -> Self {
        Self { evaluator, limits }
    }

    /// Evaluate a batch of candidates.
    ///
    /// Candidates are stable-sorted by `scheduled_time` (ties keep
    /// submission order), so when several target the same scope and window
    /// and only some fit, the earliest-scheduled ones win deterministically.
    /// Each blocked candidate gets a forward search for the first time that
    /// would pass against the same overlay; found suggestions are booked
    /// into the overlay so they stay mutually consistent.
    pub async fn check_bulk(&self, posts: Vec<CandidatePost>) -> Result<BulkResult, EngineError> {
        if posts.is_empty() {
            return Err(EngineError::Validation(
                "bulk check requires at least one candidate".into(),
            ));
        }
        if posts.len() > self.limits.max_batch_size {
            return Err(EngineError::BatchTooLarge {
                size: posts.len(),
                max: self.limits.max_batch_size,
            });
        }
        for post in &posts {
            // Validate every candidate before evaluating any.
            scopes_for(
                &post.account_id,
                post.group_id.as_deref(),
                post.app_id.as_deref(),
            )?;
        }

        let total = posts.len();
        let mut ordered = posts;
        ordered.sort_by_key(|p| p.scheduled_time);

        let mut overlay = UsageOverlay::new();
        let mut allowed = Vec::new();
        let mut blocked = Vec::new();
        let mut alternatives = Vec::new();

        for post in ordered {
            let scopes = scopes_for(
                &post.account_id,
                post.group_id.as_deref(),
                post.app_id.as_deref(),
            )?;
            let decision = self
                .evaluator
                .evaluate_at(&scopes, post.scheduled_time, Some(&overlay))
                .await?;

            if decision.allowed {
                let rules = self.evaluator.rules_per_scope(&scopes);
                overlay.bump(&scopes, &rules, post.scheduled_time);
                allowed.push(post);
                continue;
            }

            if let Some(suggested_time) = self
                .find_alternative(&scopes, &post, &decision.violations, &mut overlay)
                .await?
            {
                alternatives.push(SuggestedAlternative {
                    post: post.clone(),
                    suggested_time,
                });
            }
            blocked.push(BlockedPost {
                post,
                violations: decision.violations,
            });
        }

        let summary = BulkSummary {
            total_posts: total,
            allowed_count: allowed.len(),
            blocked_count: blocked.len(),
            success_rate: success_rate(allowed.len(), total),
        };
        tracing::info!(
            total,
            allowed = summary.allowed_count,
            blocked = summary.blocked_count,
            "bulk capacity check finished"
        );
        self.evaluator.record_audit(
            "batch",
            "bulk_check",
            Some(format!(
                "total={total} allowed={} blocked={}",
                summary.allowed_count, summary.blocked_count
            )),
        );

        Ok(BulkResult {
            allowed,
            blocked,
            alternatives,
            summary,
        })
    }

    /// Forward search for the first admissible time after a blocked
    /// candidate's slot. Steps by the smallest violated window (or the
    /// configured floor, whichever is larger) up to the lookahead horizon.
    /// A found slot is booked into the overlay before returning.
    async fn find_alternative(
        &self,
        scopes: &[crate::core::rules::ScopeRef],
        post: &CandidatePost,
        violations: &[Violation],
        overlay: &mut UsageOverlay,
    ) -> Result<Option<u64>, EngineError> {
        let step = violations
            .iter()
            .map(|v| v.rule.window_secs)
            .min()
            .map_or(self.limits.min_step_secs, |w| {
                w.max(self.limits.min_step_secs)
            });
        let horizon = post.scheduled_time.saturating_add(self.limits.lookahead_secs);

        let mut probe = post.scheduled_time.saturating_add(step);
        while probe <= horizon {
            let decision = self
                .evaluator
                .evaluate_at(scopes, probe, Some(overlay))
                .await?;
            if decision.allowed {
                let rules = self.evaluator.rules_per_scope(scopes);
                overlay.bump(scopes, &rules, probe);
                return Ok(Some(probe));
            }
            probe = probe.saturating_add(step);
        }
        tracing::debug!(
            account_id = %post.account_id,
            scheduled_time = post.scheduled_time,
            "no alternative slot within lookahead"
        );
        Ok(None)
    }
}

fn success_rate(allowed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        ((allowed as f64 / total as f64) * 100.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_rounds() {
        assert_eq!(success_rate(5, 10), 50);
        assert_eq!(success_rate(1, 3), 33);
        assert_eq!(success_rate(2, 3), 67);
        assert_eq!(success_rate(0, 4), 0);
        assert_eq!(success_rate(4, 4), 100);
    }

    #[test]
    fn default_limits_are_sane() {
        let limits = BulkLimits::default();
        assert_eq!(limits.max_batch_size, 100);
        assert_eq!(limits.lookahead_secs, 604_800);
        assert!(limits.min_step_secs > 0);
    }
}
