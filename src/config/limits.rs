//! Engine configuration structures.

use serde::{Deserialize, Serialize};

use crate::core::rules::{validate_rule_set, LimitRule, ScopeType};
use crate::core::EngineError;

/// Root engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Usage read-cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Largest accepted bulk batch.
    pub max_batch_size: usize,
    /// Floor for the alternative-time search step, seconds.
    pub min_step_secs: u64,
    /// Alternative-time search horizon, seconds.
    pub lookahead_secs: u64,
    /// Rule set seeded into the registry at build time.
    pub rules: Vec<LimitRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60,
            max_batch_size: 100,
            min_step_secs: 300,
            lookahead_secs: 7 * 24 * 3600,
            rules: default_rules(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration values and the seeded rule set.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.cache_ttl_secs == 0 {
            return Err(EngineError::Validation(
                "cache_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(EngineError::Validation(
                "max_batch_size must be greater than 0".into(),
            ));
        }
        if self.min_step_secs == 0 {
            return Err(EngineError::Validation(
                "min_step_secs must be greater than 0".into(),
            ));
        }
        if self.lookahead_secs < self.min_step_secs {
            return Err(EngineError::Validation(
                "lookahead_secs must cover at least one step".into(),
            ));
        }
        validate_rule_set(&self.rules)
    }

    /// Parse engine configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, EngineError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| EngineError::Validation(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Platform default rule set: conservative per-account limits, customizable
/// per-group limits, and app-level API ceilings.
pub fn default_rules() -> Vec<LimitRule> {
    let rule = |id: &str, scope_type, window_secs, max_actions, priority| LimitRule {
        id: id.into(),
        scope_type,
        window_secs,
        max_actions,
        priority,
        scope_id_filter: None,
    };
    vec![
        rule("app-hourly", ScopeType::App, 3600, 600, 1),
        rule("app-daily", ScopeType::App, 86_400, 10_000, 2),
        rule("group-hourly", ScopeType::Group, 3600, 50, 3),
        rule("group-daily", ScopeType::Group, 86_400, 500, 4),
        rule("account-hourly", ScopeType::Account, 3600, 5, 5),
        rule("account-daily", ScopeType::Account, 86_400, 50, 6),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.rules.len(), 6);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let cfg = EngineConfig {
            cache_ttl_secs: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn lookahead_must_cover_a_step() {
        let cfg = EngineConfig {
            min_step_secs: 3600,
            lookahead_secs: 60,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn invalid_seeded_rule_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.rules[0].max_actions = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_from_json() {
        let json = r#"{
            "cache_ttl_secs": 30,
            "max_batch_size": 50,
            "min_step_secs": 300,
            "lookahead_secs": 86400,
            "rules": [
                {
                    "id": "account-hourly",
                    "scope_type": "account",
                    "window_secs": 3600,
                    "max_actions": 5,
                    "priority": 1
                }
            ]
        }"#;
        let cfg = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.cache_ttl_secs, 30);
        assert_eq!(cfg.rules[0].scope_type, ScopeType::Account);
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{"),
            Err(EngineError::Validation(_))
        ));
    }
}
