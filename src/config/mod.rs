//! Configuration models and atomic rule-set import/export.

pub mod limits;
pub mod manager;

pub use limits::{default_rules, EngineConfig};
pub use manager::{ConfigManager, ExportedRuleSet, CONFIG_FORMAT_VERSION};
