//! Integration tests for runtime reconfiguration and health reporting.
//!
//! These tests validate:
//! 1. Export/import round-trip idempotence
//! 2. Atomic, all-or-nothing imports
//! 3. That imports take effect immediately (cache dropped on swap)
//! 4. Health scoring, dashboard classification, and monotonicity
//! 5. Decision audit recording

use std::sync::Arc;

use parking_lot::Mutex;
use postgate::api::{CapacityEngine, CheckRequest};
use postgate::builders::{build_engine, EngineBuilder};
use postgate::config::{EngineConfig, CONFIG_FORMAT_VERSION};
use postgate::core::{
    AuditEvent, AuditSink, DashboardStatus, EngineError, LimitRule, ScopeRef, ScopeType,
    StatusFilter,
};
use postgate::infra::store::InMemoryUsageStore;
use postgate::util::clock::ManualClock;

const HOUR: u64 = 3600;
const T0: u64 = 500 * HOUR;

fn rule(id: &str, scope_type: ScopeType, window_secs: u64, max_actions: u64, priority: u8) -> LimitRule {
    LimitRule {
        id: id.into(),
        scope_type,
        window_secs,
        max_actions,
        priority,
        scope_id_filter: None,
    }
}

fn engine_with(
    rules: Vec<LimitRule>,
) -> (Arc<InMemoryUsageStore>, Arc<ManualClock>, CapacityEngine) {
    let store = Arc::new(InMemoryUsageStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let cfg = EngineConfig {
        cache_ttl_secs: 60,
        rules,
        ..EngineConfig::default()
    };
    let engine = build_engine(cfg, store.clone(), clock.clone()).unwrap();
    (store, clock, engine)
}

fn account_req(id: &str) -> CheckRequest {
    CheckRequest {
        account_id: id.into(),
        group_id: None,
        app_id: None,
    }
}

#[tokio::test]
async fn import_of_export_is_observationally_identical() {
    let (_store, _clock, engine) = engine_with(vec![
        rule("acct-hourly", ScopeType::Account, HOUR, 5, 1),
        rule("group-hourly", ScopeType::Group, HOUR, 50, 2),
    ]);

    let exported = engine.export_config();
    assert_eq!(exported.version, CONFIG_FORMAT_VERSION);

    let before = engine.registry().snapshot();
    let outcome = engine.import_config(&exported).await.unwrap();
    assert_eq!(outcome.imported_rules, 2);
    assert_eq!(engine.registry().snapshot(), before);
}

#[tokio::test]
async fn failed_import_leaves_old_rules_in_effect() {
    let (store, _clock, engine) =
        engine_with(vec![rule("acct-hourly", ScopeType::Account, HOUR, 5, 1)]);
    store.seed(ScopeRef::new(ScopeType::Account, "acct-1"), HOUR, T0, 5);

    let mut bad = engine.export_config();
    bad.rules[0].max_actions = 0;
    assert!(matches!(
        engine.import_config(&bad).await,
        Err(EngineError::Validation(_))
    ));

    // The old five-per-hour rule still applies.
    let decision = engine.check_capacity(&account_req("acct-1")).await.unwrap();
    assert!(!decision.allowed);
}

#[tokio::test]
async fn successful_import_takes_effect_immediately() {
    let (store, _clock, engine) =
        engine_with(vec![rule("acct-hourly", ScopeType::Account, HOUR, 5, 1)]);
    store.seed(ScopeRef::new(ScopeType::Account, "acct-1"), HOUR, T0, 5);

    // Prime the cache with the denied state.
    assert!(!engine.check_capacity(&account_req("acct-1")).await.unwrap().allowed);

    let mut raised = engine.export_config();
    raised.rules[0].max_actions = 10;
    engine.import_config(&raised).await.unwrap();

    // The import drops the cache, so the relaxed limit applies at once.
    let decision = engine.check_capacity(&account_req("acct-1")).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining_slots, Some(5));
}

#[tokio::test]
async fn status_with_no_usage_is_perfectly_healthy() {
    let (_store, _clock, engine) =
        engine_with(vec![rule("acct-hourly", ScopeType::Account, HOUR, 5, 1)]);

    let status = engine.get_status(&StatusFilter::default()).await.unwrap();
    assert!(status.violations.is_empty());
    assert!(status.checked_scopes.is_empty());
    assert_eq!(status.summary.health_score, 100);
    assert_eq!(status.summary.status, DashboardStatus::Healthy);
}

#[tokio::test]
async fn violations_lower_the_score_by_priority_weight() {
    let (store, _clock, engine) = engine_with(vec![
        rule("app-hourly", ScopeType::App, HOUR, 10, 1),
        rule("acct-hourly", ScopeType::Account, HOUR, 5, 5),
    ]);

    // One low-priority account violation.
    store.seed(ScopeRef::new(ScopeType::Account, "acct-1"), HOUR, T0, 5);
    let status = engine.get_status(&StatusFilter::default()).await.unwrap();
    assert_eq!(status.summary.violated_rules, 1);
    let low_priority_score = status.summary.health_score;
    assert!(low_priority_score < 100);
    assert_eq!(status.summary.status, DashboardStatus::Healthy);

    // Adding a priority-1 app violation can only drop the score further.
    store.seed(ScopeRef::new(ScopeType::App, "app-1"), HOUR, T0, 10);
    engine.clear_cache().await;
    let status = engine.get_status(&StatusFilter::default()).await.unwrap();
    assert_eq!(status.summary.violated_rules, 2);
    assert!(status.summary.health_score < low_priority_score);
    assert_eq!(status.summary.status, DashboardStatus::Degraded);
}

#[tokio::test]
async fn status_filter_narrows_the_sweep() {
    let (store, _clock, engine) = engine_with(vec![
        rule("acct-hourly", ScopeType::Account, HOUR, 5, 1),
        rule("group-hourly", ScopeType::Group, HOUR, 3, 2),
    ]);
    store.seed(ScopeRef::new(ScopeType::Account, "acct-1"), HOUR, T0, 5);
    store.seed(ScopeRef::new(ScopeType::Group, "team-a"), HOUR, T0, 3);

    let accounts_only = engine
        .get_status(&StatusFilter {
            scope_type: Some(ScopeType::Account),
            scope_id: None,
        })
        .await
        .unwrap();
    assert_eq!(accounts_only.checked_scopes.len(), 1);
    assert_eq!(accounts_only.summary.violated_rules, 1);
    assert_eq!(
        accounts_only.violations[0].scope.scope_type,
        ScopeType::Account
    );

    let one_group = engine
        .get_status(&StatusFilter {
            scope_type: None,
            scope_id: Some("team-a".into()),
        })
        .await
        .unwrap();
    assert_eq!(one_group.checked_scopes.len(), 1);
    assert_eq!(one_group.violations[0].scope.scope_id, "team-a");
}

/// Audit sink that shares its event log with the test.
#[derive(Clone, Default)]
struct SharedSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl AuditSink for SharedSink {
    fn record(&mut self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

#[tokio::test]
async fn decisions_and_admin_actions_are_audited() {
    let sink = SharedSink::default();
    let store = Arc::new(InMemoryUsageStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let cfg = EngineConfig {
        rules: vec![rule("acct-hourly", ScopeType::Account, HOUR, 1, 1)],
        ..EngineConfig::default()
    };
    let engine = EngineBuilder::new(cfg, store.clone(), clock)
        .with_audit(Box::new(sink.clone()))
        .build()
        .unwrap();

    assert!(engine.check_capacity(&account_req("acct-1")).await.unwrap().allowed);
    store.seed(ScopeRef::new(ScopeType::Account, "acct-1"), HOUR, T0, 1);
    engine.clear_cache().await;
    assert!(!engine.check_capacity(&account_req("acct-1")).await.unwrap().allowed);
    let exported = engine.export_config();
    engine.import_config(&exported).await.unwrap();

    let events = sink.events.lock();
    let actions: Vec<&str> = events.iter().map(|e| e.action.as_str()).collect();
    assert!(actions.contains(&"check_allow"));
    assert!(actions.contains(&"check_deny"));
    assert!(actions.contains(&"cache_clear"));
    assert!(actions.contains(&"config_import"));
    // Event timestamps come from the injected clock, not wall time.
    assert!(events.iter().all(|e| e.created_at == T0));
}
