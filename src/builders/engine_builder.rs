//! Engine assembly from configuration and injected collaborators.

use std::sync::Arc;

use crate::api::CapacityEngine;
use crate::config::limits::EngineConfig;
use crate::config::manager::ConfigManager;
use crate::core::audit::AuditSink;
use crate::core::bulk::{BulkEvaluator, BulkLimits};
use crate::core::evaluator::CapacityEvaluator;
use crate::core::health::HealthMonitor;
use crate::core::rules::RuleRegistry;
use crate::core::usage::CacheLayer;
use crate::core::{AppResult, EngineError};
use crate::infra::cache::{CacheStore, InMemoryCacheStore};
use crate::infra::store::UsageStore;
use crate::util::clock::Clock;

/// Builds a [`CapacityEngine`] from configuration plus injected store and
/// clock, with optional cache-store and audit-sink overrides.
pub struct EngineBuilder {
    cfg: EngineConfig,
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn CacheStore>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl EngineBuilder {
    /// Start a builder from configuration and required collaborators.
    pub fn new(cfg: EngineConfig, store: Arc<dyn UsageStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg,
            store,
            clock,
            cache: None,
            audit: None,
        }
    }

    /// Use a custom cache store instead of the in-process default.
    #[must_use]
    pub fn with_cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach an audit sink recording decisions and admin actions.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate configuration, seed the registry, and wire the components.
    pub fn build(self) -> Result<CapacityEngine, EngineError> {
        self.cfg.validate()?;

        let rules = Arc::new(RuleRegistry::new());
        rules.replace_all(self.cfg.rules.clone())?;

        let cache_store = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryCacheStore::new()));
        let usage = Arc::new(CacheLayer::new(
            self.store.clone(),
            cache_store,
            self.cfg.cache_ttl_secs,
            self.clock.clone(),
        ));

        let mut evaluator =
            CapacityEvaluator::new(rules.clone(), usage.clone(), self.clock.clone());
        if let Some(audit) = self.audit {
            evaluator = evaluator.with_audit(audit);
        }
        let evaluator = Arc::new(evaluator);

        let bulk = BulkEvaluator::new(
            evaluator.clone(),
            BulkLimits {
                max_batch_size: self.cfg.max_batch_size,
                min_step_secs: self.cfg.min_step_secs,
                lookahead_secs: self.cfg.lookahead_secs,
            },
        );
        let health = HealthMonitor::new(
            evaluator.clone(),
            rules.clone(),
            self.store,
            self.clock.clone(),
        );
        let config = ConfigManager::new(rules.clone(), self.clock);

        tracing::info!(
            rule_count = rules.len(),
            cache_ttl_secs = self.cfg.cache_ttl_secs,
            "capacity engine built"
        );
        Ok(CapacityEngine::from_parts(
            rules, usage, evaluator, bulk, health, config,
        ))
    }
}

/// Build an engine with the default in-process cache and no audit sink.
///
/// Application-edge convenience: the typed [`EngineError`] from the builder
/// is wrapped in [`AppResult`] so callers can attach context with `anyhow`.
pub fn build_engine(
    cfg: EngineConfig,
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
) -> AppResult<CapacityEngine> {
    Ok(EngineBuilder::new(cfg, store, clock).build()?)
}
