//! Error types for bucket construction and configuration.

use thiserror::Error;

/// Errors produced by throttle components.
///
/// Only construction and configuration can fail; consuming tokens never
/// errors, it reports a shortage through its boolean result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    /// Rate, capacity, timezone or curve parameters are out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// Configuration source could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(String),
}

impl ThrottleError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
