use crate::collector::Collector;
use crate::config::AppConfig;
use crate::directory::RepositoryDirectory;
use crate::error::ConfigError;
use crate::github::HostingApi;
use crate::types::ItemKind;
use crate::window::{ReportingSchedule, ReportingWindow};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Builds the repository directory and the two collectors from shared configuration.
///
/// All of them share one `HostingApi` handle, which is expected to serialize its own calls.
#[derive(Clone)]
pub struct ReportingFactory {
    api: Arc<dyn HostingApi>,
    users: BTreeSet<String>,
    organizations: BTreeSet<String>,
    schedule: ReportingSchedule,
}

impl ReportingFactory {
    pub fn new(config: &AppConfig, api: Arc<dyn HostingApi>) -> Result<Self, ConfigError> {
        Ok(Self {
            api,
            users: config.github_users.clone(),
            organizations: config.github_reporting_organizations.clone(),
            schedule: config.schedule()?,
        })
    }

    pub fn users(&self) -> &BTreeSet<String> {
        &self.users
    }

    pub fn organizations(&self) -> &BTreeSet<String> {
        &self.organizations
    }

    pub fn window_at(&self, now: DateTime<Utc>) -> ReportingWindow {
        ReportingWindow::compute(now, &self.schedule)
    }

    pub fn repository_directory(&self) -> RepositoryDirectory {
        RepositoryDirectory::new(
            Arc::clone(&self.api),
            self.users.clone(),
            self.organizations.clone(),
        )
    }

    /// A collector whose reporting window is fixed at `now`.
    pub fn collector_at(&self, kind: ItemKind, now: DateTime<Utc>) -> Collector {
        Collector::new(
            kind,
            Arc::clone(&self.api),
            self.repository_directory(),
            self.users.clone(),
            self.organizations.clone(),
            self.window_at(now),
        )
    }

    pub fn collector(&self, kind: ItemKind) -> Collector {
        self.collector_at(kind, Utc::now())
    }

    pub fn issue_collector(&self) -> Collector {
        self.collector(ItemKind::Issue)
    }

    pub fn pull_request_collector(&self) -> Collector {
        self.collector(ItemKind::PullRequest)
    }
}
