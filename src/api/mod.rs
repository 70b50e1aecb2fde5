//! Transport-agnostic engine facade and request/response models.
//!
//! An admin or HTTP layer wraps these operations as request handlers; the
//! engine itself never parses transport payloads or authenticates callers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::manager::{ConfigManager, ExportedRuleSet};
use crate::core::bulk::{BulkEvaluator, BulkResult, CandidatePost};
use crate::core::evaluator::{CapacityDecision, CapacityEvaluator};
use crate::core::health::{HealthMonitor, LimitStatus, StatusFilter};
use crate::core::rules::RuleRegistry;
use crate::core::usage::CacheLayer;
use crate::core::EngineError;

/// Single capacity check request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Account the post would publish through.
    pub account_id: String,
    /// Account group, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// App-level integration, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

/// Bulk capacity check request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCheckRequest {
    /// Candidate posts, bounded by the configured batch limit.
    pub posts: Vec<CandidatePost>,
}

/// Confirmation of a cache clear.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    /// Always true once the clear has been applied.
    pub cleared: bool,
}

/// Outcome of a configuration import.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Number of rules now active.
    pub imported_rules: usize,
}

/// The wired admission-control engine.
///
/// An explicit instance constructed with injected store and clock; no
/// global state, so tests can run many engines in parallel with fake
/// clocks and in-memory stores.
pub struct CapacityEngine {
    rules: Arc<RuleRegistry>,
    usage: Arc<CacheLayer>,
    evaluator: Arc<CapacityEvaluator>,
    bulk: BulkEvaluator,
    health: HealthMonitor,
    config: ConfigManager,
}

impl std::fmt::Debug for CapacityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityEngine").finish_non_exhaustive()
    }
}

impl CapacityEngine {
    pub(crate) fn from_parts(
        rules: Arc<RuleRegistry>,
        usage: Arc<CacheLayer>,
        evaluator: Arc<CapacityEvaluator>,
        bulk: BulkEvaluator,
        health: HealthMonitor,
        config: ConfigManager,
    ) -> Self {
        Self {
            rules,
            usage,
            evaluator,
            bulk,
            health,
            config,
        }
    }

    /// Decide whether one more post may be scheduled for the request's
    /// scopes. Read-only; the caller persists the post and increments usage
    /// only after an allowed decision.
    pub async fn check_capacity(
        &self,
        req: &CheckRequest,
    ) -> Result<CapacityDecision, EngineError> {
        self.evaluator
            .check(
                &req.account_id,
                req.group_id.as_deref(),
                req.app_id.as_deref(),
            )
            .await
    }

    /// Evaluate a batch with intra-batch consistent accounting and
    /// alternative-time suggestions for blocked candidates.
    pub async fn check_bulk_capacity(
        &self,
        req: BulkCheckRequest,
    ) -> Result<BulkResult, EngineError> {
        self.bulk.check_bulk(req.posts).await
    }

    /// Current violations and aggregate health across known scopes.
    pub async fn get_status(&self, filter: &StatusFilter) -> Result<LimitStatus, EngineError> {
        self.health.status(filter).await
    }

    /// Drop the usage read cache; subsequent reads are forced to storage.
    pub async fn clear_cache(&self) -> ClearCacheResponse {
        self.usage.clear().await;
        self.evaluator.record_audit("engine", "cache_clear", None);
        ClearCacheResponse { cleared: true }
    }

    /// Serialize the full active rule set with a version tag.
    pub fn export_config(&self) -> ExportedRuleSet {
        self.config.export()
    }

    /// Validate and atomically install a rule set, then drop the cache so
    /// decisions immediately reflect the new rules.
    pub async fn import_config(
        &self,
        set: &ExportedRuleSet,
    ) -> Result<ImportOutcome, EngineError> {
        let imported_rules = self.config.import(set)?;
        self.usage.clear().await;
        self.evaluator.record_audit(
            "engine",
            "config_import",
            Some(format!("rules={imported_rules}")),
        );
        Ok(ImportOutcome { imported_rules })
    }

    /// The active rule registry, for direct rule management.
    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.rules
    }

    /// The cached usage read path.
    pub fn usage(&self) -> &Arc<CacheLayer> {
        &self.usage
    }
}
