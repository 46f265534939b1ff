//! Error types for configuration loading and report collection.

use std::fmt;

/// Configuration could not be loaded or holds values the reporter cannot run with.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration from the environment: {0}")]
    Env(#[from] envy::Error),

    #[error("GITHUB_REPORTING_DAY_OF_WEEK must be between 1 (Monday) and 7 (Sunday), got {0}")]
    InvalidDayOfWeek(u32),

    #[error("GITHUB_REPORTING_HOURS must be between 0 and 23, got {0}")]
    InvalidHour(u32),

    #[error("REPORTING_REFRESH_INTERVAL_SECONDS must be greater than zero")]
    InvalidRefreshInterval,

    #[error("GITHUB_USERS must name at least one user")]
    NoUsers,
}

/// A query to the hosting API failed, so the whole collection pass is abandoned.
///
/// There is no partial result: whatever was gathered before the failure is dropped.
#[derive(Debug, thiserror::Error)]
#[error("collection failed while listing {target}")]
pub struct CollectionFailure {
    target: String,
    #[source]
    source: anyhow::Error,
}

impl CollectionFailure {
    pub fn new(target: impl fmt::Display, source: anyhow::Error) -> Self {
        Self {
            target: target.to_string(),
            source,
        }
    }

    /// What was being listed, e.g. "issues for org/repo".
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The underlying transport or deserialization error.
    pub fn cause(&self) -> &anyhow::Error {
        &self.source
    }
}
