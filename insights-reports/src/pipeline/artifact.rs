//! Section artifacts and the report aggregate

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::pipeline::markdown;
use crate::pipeline::sections::{CriteriaList, ReportHeadings, SectionBody};
use crate::pipeline::{ReportRef, SectionKey, SectionSlot, Stage};

/// Output of one stage for one slot of one report
#[derive(Debug, Clone, PartialEq)]
pub struct SectionArtifact {
    pub key: SectionKey,
    pub body: SectionBody,
    pub updated_at: DateTime<Utc>,
}

impl SectionArtifact {
    pub fn new(key: SectionKey, body: SectionBody) -> Self {
        Self {
            key,
            body,
            updated_at: Utc::now(),
        }
    }

    /// Markdown rendering, derived from the body on every call
    pub fn markdown(&self) -> String {
        markdown::render_section(&self.key, &self.body)
    }
}

impl Serialize for SectionArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SectionArtifact", 5)?;
        state.serialize_field("stage", &self.key.stage)?;
        state.serialize_field("slot", &self.key.slot)?;
        state.serialize_field("body", &self.body)?;
        state.serialize_field("markdown", &self.markdown())?;
        state.serialize_field("updatedAt", &self.updated_at)?;
        state.end()
    }
}

/// All sections generated so far for one industry or ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(flatten)]
    pub report: ReportRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ordered by stage position, then slot
    pub sections: Vec<SectionArtifact>,
}

impl Report {
    /// Build a report, putting `sections` into report order
    pub fn new(
        report: ReportRef,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        mut sections: Vec<SectionArtifact>,
    ) -> Self {
        sections.sort_by(|a, b| a.key.sort_key().cmp(&b.key.sort_key()));
        Self {
            report,
            created_at,
            updated_at,
            sections,
        }
    }

    pub fn section(&self, key: &SectionKey) -> Option<&SectionArtifact> {
        self.sections.iter().find(|s| &s.key == key)
    }

    pub fn sections_of(&self, stage: Stage) -> impl Iterator<Item = &SectionArtifact> {
        self.sections.iter().filter(move |s| s.key.stage == stage)
    }

    pub fn headings(&self) -> Option<&ReportHeadings> {
        self.section(&SectionKey::whole(Stage::Headings))
            .and_then(|s| s.body.as_headings())
    }

    pub fn criteria(&self) -> Option<&CriteriaList> {
        self.section(&SectionKey::whole(Stage::Criteria))
            .and_then(|s| s.body.as_criteria())
    }

    pub fn has(&self, stage: Stage, slot: &SectionSlot) -> bool {
        self.sections
            .iter()
            .any(|s| s.key.stage == stage && &s.key.slot == slot)
    }
}

/// Listing entry for `GET /api/reports/:kind`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    #[serde(flatten)]
    pub report: ReportRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub section_count: usize,
}
