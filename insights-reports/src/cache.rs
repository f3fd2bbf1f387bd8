//! Cache tags and the rendered-page cache
//!
//! Tags name what a cached page depends on. After a stage writes, the
//! executor evicts pages for the report's tags and broadcasts them so
//! downstream renderers can drop their own copies.

use chrono::Utc;
use insights_common::events::{EventBus, InsightsEvent};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::pipeline::{ReportKind, ReportRef, Stage};

/// `report:<kind>:<id>`
pub fn report_tag(report: &ReportRef) -> String {
    format!("report:{}:{}", report.kind, report.id)
}

/// `section:<kind>:<id>:<stage>`
pub fn section_tag(report: &ReportRef, stage: Stage) -> String {
    format!("section:{}:{}:{}", report.kind, report.id, stage)
}

/// `reports:<kind>`
pub fn list_tag(kind: ReportKind) -> String {
    format!("reports:{}", kind)
}

/// Every tag touched by a write of `stage` to `report`
pub fn tags_for_write(report: &ReportRef, stage: Stage) -> Vec<String> {
    vec![
        report_tag(report),
        section_tag(report, stage),
        list_tag(report.kind),
    ]
}

/// Rendered markdown pages keyed by tag
#[derive(Clone)]
pub struct PageCache {
    pages: Cache<String, Arc<String>>,
}

impl PageCache {
    pub fn new(max_pages: u64, ttl: Duration) -> Self {
        Self {
            pages: Cache::builder()
                .max_capacity(max_pages)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, tag: &str) -> Option<Arc<String>> {
        self.pages.get(tag).await
    }

    pub async fn insert(&self, tag: String, page: String) -> Arc<String> {
        let page = Arc::new(page);
        self.pages.insert(tag, page.clone()).await;
        page
    }

    pub async fn evict(&self, tag: &str) {
        self.pages.invalidate(tag).await;
    }
}

/// Evicts cached pages and broadcasts the invalidated tags
#[derive(Clone)]
pub struct CacheInvalidator {
    pages: PageCache,
    event_bus: EventBus,
}

impl CacheInvalidator {
    pub fn new(pages: PageCache, event_bus: EventBus) -> Self {
        Self { pages, event_bus }
    }

    /// Invalidate everything derived from `stage` of `report`
    pub async fn invalidate(&self, report: &ReportRef, stage: Stage) -> Vec<String> {
        let tags = tags_for_write(report, stage);
        for tag in &tags {
            self.pages.evict(tag).await;
        }
        debug!(report = %report, tags = ?tags, "Invalidated cache tags");

        self.event_bus.emit_lossy(InsightsEvent::CacheTagsInvalidated {
            tags: tags.clone(),
            timestamp: Utc::now(),
        });
        tags
    }
}
