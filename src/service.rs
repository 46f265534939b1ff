//! Service layer tying collection, storage and scheduling together.
//!
//! `ReportingService` is the entry point used by the HTTP handlers. It:
//! 1. Builds a fresh collector per collection, so each pass uses the current window.
//! 2. Stores the resulting report in the in-memory store.
//! 3. Periodically refreshes both kinds in the background while reporting is enabled.

use crate::collector::Report;
use crate::config::AppConfig;
use crate::error::{CollectionFailure, ConfigError};
use crate::factory::ReportingFactory;
use crate::github::HostingApi;
use crate::store::ReportStore;
use crate::types::{Item, ItemKind};
use crate::window::ReportingWindow;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

pub struct ReportingService {
    factory: ReportingFactory,
    store: ReportStore,
    enabled: AtomicBool,
    refresh_interval: StdDuration,
}

impl ReportingService {
    pub fn new(config: &AppConfig, api: Arc<dyn HostingApi>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            factory: ReportingFactory::new(config, api)?,
            store: ReportStore::new(config.report_ttl()),
            enabled: AtomicBool::new(config.reporting_enabled),
            refresh_interval: config.refresh_interval(),
        })
    }

    pub fn factory(&self) -> &ReportingFactory {
        &self.factory
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::info!(enabled, "Reporting toggled");
        }
    }

    /// The reporting window as of now.
    pub fn current_window(&self) -> ReportingWindow {
        self.factory.window_at(Utc::now())
    }

    /// Runs a full collection of one kind and stores the result.
    pub async fn collect(&self, kind: ItemKind) -> Result<Arc<Report>, CollectionFailure> {
        self.collect_at(kind, Utc::now()).await
    }

    /// Like `collect`, with the reporting window computed for `now`.
    pub async fn collect_at(
        &self,
        kind: ItemKind,
        now: DateTime<Utc>,
    ) -> Result<Arc<Report>, CollectionFailure> {
        let report = self.factory.collector_at(kind, now).refresh().await?;
        tracing::info!(
            %kind,
            assignees = report.by_assignee.len(),
            items = report.items().count(),
            "Collected report"
        );
        Ok(self.store.insert(report).await)
    }

    pub async fn report(&self, kind: ItemKind) -> Option<Arc<Report>> {
        self.store.get(kind).await
    }

    /// Items of the last report active during `[start, end]`, newest first.
    pub async fn items_between(
        &self,
        kind: ItemKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Item> {
        let Some(report) = self.store.get(kind).await else {
            return Vec::new();
        };
        let mut items: Vec<Item> = report
            .items()
            .filter(|item| item.is_active_during(start, end))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.repository.cmp(&b.repository))
                .then_with(|| a.number.cmp(&b.number))
        });
        items
    }

    /// Starts a background task that collects every kind once per interval while enabled.
    ///
    /// A failed collection is logged and that kind is skipped until the next tick.
    pub fn start_background_refresh(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);

        tokio::spawn(async move {
            tracing::info!(
                interval_secs = service.refresh_interval.as_secs(),
                "Starting background reporting refresh"
            );
            let mut interval = tokio::time::interval(service.refresh_interval);

            loop {
                interval.tick().await;
                if !service.is_enabled() {
                    tracing::debug!("Reporting disabled, skipping refresh");
                    continue;
                }
                service.refresh_all().await;
            }
        })
    }

    async fn refresh_all(&self) {
        for kind in ItemKind::ALL {
            if let Err(e) = self.collect(kind).await {
                tracing::error!(%kind, error = %e, "Collection failed, skipping this cycle");
            }
        }
    }
}
