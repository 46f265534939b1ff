//! Application configuration and environment variable parsing.
//!
//! Settings are read from the environment (optionally seeded from a .env file).
//! `AppConfig` names the users and organizations to report on, the weekday and hour
//! a reporting week ends, and how often the background refresh runs.

use crate::error::ConfigError;
use crate::window::ReportingSchedule;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration as StdDuration;

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Logins whose assigned work is reported, and whose repositories are tracked.
    /// Expected format: comma-separated string, e.g. "alice,bob".
    #[serde(deserialize_with = "deserialize_set")]
    pub github_users: BTreeSet<String>,

    /// Organizations whose repositories are tracked.
    #[serde(default, deserialize_with = "deserialize_set")]
    pub github_reporting_organizations: BTreeSet<String>,

    /// Day the reporting week ends on, Monday = 1 through Sunday = 7.
    #[serde(default = "default_day_of_week")]
    pub github_reporting_day_of_week: u32,

    /// Hour of that day the reporting week ends at, 0 to 23.
    #[serde(default = "default_hours")]
    pub github_reporting_hours: u32,

    /// Whether the background refresh starts out enabled.
    #[serde(default = "default_reporting_enabled")]
    pub reporting_enabled: bool,

    /// Seconds between background refreshes.
    #[serde(default = "default_refresh_interval")]
    pub reporting_refresh_interval_seconds: u64,

    /// Time to live for the last collected report of each kind, in seconds.
    #[serde(default = "default_report_ttl")]
    pub report_cache_ttl_seconds: u64,

    /// Optional GitHub Personal Access Token for higher rate limits.
    pub github_token: Option<String>,
}

fn default_day_of_week() -> u32 {
    4
}

fn default_hours() -> u32 {
    12
}

fn default_reporting_enabled() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    3600
}

fn default_report_ttl() -> u64 {
    7 * 24 * 3600
}

impl AppConfig {
    /// Loads and validates the configuration. Invalid values fail here, before any
    /// collector is built.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github_users.is_empty() {
            return Err(ConfigError::NoUsers);
        }
        if self.reporting_refresh_interval_seconds == 0 {
            return Err(ConfigError::InvalidRefreshInterval);
        }
        self.schedule().map(|_| ())
    }

    pub fn schedule(&self) -> Result<ReportingSchedule, ConfigError> {
        ReportingSchedule::new(self.github_reporting_day_of_week, self.github_reporting_hours)
    }

    pub fn refresh_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.reporting_refresh_interval_seconds)
    }

    pub fn report_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.report_cache_ttl_seconds)
    }
}

fn deserialize_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_set(&s))
}

fn parse_set(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
