use crate::collector::Report;
use crate::types::ItemKind;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Keeps the latest report of each kind in memory until it expires.
#[derive(Clone)]
pub struct ReportStore {
    cache: Cache<ItemKind, Arc<Report>>,
}

impl ReportStore {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_live(ttl).build();
        Self { cache }
    }

    pub async fn get(&self, kind: ItemKind) -> Option<Arc<Report>> {
        self.cache.get(&kind).await
    }

    /// Replaces the stored report of the same kind.
    pub async fn insert(&self, report: Report) -> Arc<Report> {
        let report = Arc::new(report);
        self.cache.insert(report.kind, Arc::clone(&report)).await;
        report
    }
}
