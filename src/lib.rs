//! # Postgate
//!
//! A layered posting-capacity admission-control engine for social-media
//! automation pipelines.
//!
//! This library decides whether a new post may be scheduled against an
//! account, a group of accounts, or an application-level integration, given
//! time-windowed quotas at each of those levels. It answers single checks,
//! batch checks with internally consistent accounting, and suggests
//! alternative schedule times when a candidate is blocked. It never
//! schedules or publishes anything itself.
//!
//! ## Core Problem Solved
//!
//! Platform APIs enforce posting quotas at several levels at once, and
//! tripping them gets accounts throttled or banned:
//!
//! - **Layered quotas**: app, group, and account windows must all agree
//!   before a post is admitted
//! - **Temporal reasoning**: rolling windows, earliest-retry computation,
//!   and forward search for free slots
//! - **Batch consistency**: later items in a batch must see the effect of
//!   earlier admissions without touching durable storage
//! - **Operational visibility**: aggregate health scoring and atomic
//!   configuration swap at runtime
//!
//! ## Key Features
//!
//! - **Read-only decisions**: the engine never increments usage; the caller
//!   commits the action and increments the store afterwards
//! - **Injected collaborators**: usage store and clock are traits, so tests
//!   run with in-memory stores and pinned clocks
//! - **Fail-closed**: an unreachable store denies admission rather than
//!   silently allowing unmetered posting
//! - **TTL read cache**: decision staleness is bounded by one cache TTL
//! - **Atomic reconfiguration**: the whole rule set swaps as one unit or
//!   not at all
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use postgate::api::CheckRequest;
//! use postgate::builders::build_engine;
//! use postgate::config::EngineConfig;
//! use postgate::infra::store::InMemoryUsageStore;
//! use postgate::util::clock::SystemClock;
//!
//! let engine = build_engine(
//!     EngineConfig::default(),
//!     Arc::new(InMemoryUsageStore::new()),
//!     Arc::new(SystemClock),
//! )?;
//!
//! let decision = engine
//!     .check_capacity(&CheckRequest {
//!         account_id: "acct-1".into(),
//!         group_id: Some("growth-team".into()),
//!         app_id: None,
//!     })
//!     .await?;
//!
//! if decision.allowed {
//!     // persist the scheduled post, then increment the usage store
//! }
//! ```
//!
//! For complete examples, see:
//! - `tests/admission_flow_test.rs` - Single-check integration tests
//! - `tests/bulk_scheduling_test.rs` - Batch evaluation and alternatives

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Transport-agnostic engine facade and request/response models.
pub mod api;
/// Builders to construct engine components from configuration.
pub mod builders;
/// Configuration models and atomic rule-set import/export.
pub mod config;
/// Core admission-control abstractions and decision logic.
pub mod core;
/// Infrastructure adapters for usage counters and read caches.
pub mod infra;
/// Shared utilities.
pub mod util;
