//! Versioned export and atomic import of the active rule set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::rules::{validate_rule_set, LimitRule, RuleRegistry};
use crate::core::EngineError;
use crate::util::clock::Clock;

/// Format version written by [`ConfigManager::export`] and required by
/// [`ConfigManager::import`].
pub const CONFIG_FORMAT_VERSION: &str = "1";

/// The full active rule set as one portable, versioned unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedRuleSet {
    /// Serialization format version.
    pub version: String,
    /// Engine version that produced the export.
    pub engine_version: String,
    /// Export timestamp, seconds since the epoch.
    pub exported_at: u64,
    /// The rules themselves.
    pub rules: Vec<LimitRule>,
}

/// Exports and imports the rule set as one atomic unit.
///
/// Import is all-or-nothing: the entire incoming set is validated before the
/// registry swap, so a single invalid rule leaves the previously active
/// configuration untouched.
pub struct ConfigManager {
    rules: Arc<RuleRegistry>,
    clock: Arc<dyn Clock>,
}

impl ConfigManager {
    /// Create a manager over the active registry.
    pub fn new(rules: Arc<RuleRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { rules, clock }
    }

    /// Serialize the full active rule set with version tags.
    pub fn export(&self) -> ExportedRuleSet {
        ExportedRuleSet {
            version: CONFIG_FORMAT_VERSION.into(),
            engine_version: env!("CARGO_PKG_VERSION").into(),
            exported_at: self.clock.now(),
            rules: self.rules.snapshot(),
        }
    }

    /// Validate and atomically install an exported rule set. Returns the
    /// number of installed rules.
    pub fn import(&self, set: &ExportedRuleSet) -> Result<usize, EngineError> {
        if set.version != CONFIG_FORMAT_VERSION {
            return Err(EngineError::ConfigVersion(set.version.clone()));
        }
        validate_rule_set(&set.rules)?;
        let count = set.rules.len();
        self.rules.replace_all(set.rules.clone())?;
        tracing::info!(rule_count = count, "configuration imported");
        Ok(count)
    }
}
