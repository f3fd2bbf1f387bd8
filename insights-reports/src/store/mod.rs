//! Artifact stores
//!
//! One trait, two backends. Whichever backend is configured is the only
//! place section bodies live; markdown is always rendered from the stored
//! body on read.

mod files;
mod sqlite;

pub use files::FileArtifactStore;
pub use sqlite::SqliteArtifactStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use insights_common::{Error, Result};

use crate::pipeline::{
    Report, ReportKind, ReportRef, ReportSummary, SectionArtifact, SectionBody, SectionKey, Stage,
};

/// Persistence for section artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Backend name for logs and `/health`
    fn backend(&self) -> &'static str;

    async fn load_section(
        &self,
        report: &ReportRef,
        key: &SectionKey,
    ) -> Result<Option<SectionArtifact>>;

    /// Every stored slot of `stage`, in slot order
    async fn list_sections(&self, report: &ReportRef, stage: Stage) -> Result<Vec<SectionArtifact>>;

    /// Insert or wholesale-replace one section; creates the report on first write
    async fn save_section(&self, report: &ReportRef, artifact: &SectionArtifact) -> Result<()>;

    async fn load_report(&self, report: &ReportRef) -> Result<Option<Report>>;

    async fn list_reports(&self, kind: ReportKind) -> Result<Vec<ReportSummary>>;
}

/// Rebuild a typed body from its stored JSON
fn decode_body(stage: Stage, json: serde_json::Value) -> Result<SectionBody> {
    SectionBody::parse(stage, json)
        .map_err(|reason| Error::Internal(format!("Stored {} body is invalid: {}", stage, reason)))
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", field, e)))
}
