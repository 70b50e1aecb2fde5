//! Error types for engine operations.

use thiserror::Error;

/// Errors produced by engine components.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input or rule failed validation before any evaluation.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A rule collides with an already-registered rule.
    #[error("rule conflict: {0}")]
    RuleConflict(String),
    /// Bulk request exceeds the configured batch limit.
    #[error("batch too large: {size} exceeds limit {max}")]
    BatchTooLarge {
        /// Submitted batch size.
        size: usize,
        /// Configured maximum batch size.
        max: usize,
    },
    /// Usage store could not be reached; checks fail closed on this.
    #[error("usage store unavailable: {0}")]
    StoreUnavailable(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
    /// Imported configuration carries an unsupported format version.
    #[error("unsupported config version: {0}")]
    ConfigVersion(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
