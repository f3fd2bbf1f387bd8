//! File-system artifact store
//!
//! Layout under the artifact directory:
//!
//! ```text
//! <kind>/<report_id>/report.json                      created/updated timestamps
//! <kind>/<report_id>/<stage>.json                     whole-report sections
//! <kind>/<report_id>/<stage>.<slot>.json              indexed sections
//! <kind>/<report_id>/<stage>[.<slot>].md              rendering for direct display
//! ```
//!
//! JSON files are the source of truth; `.md` files are rewritten from the
//! same body on every save and never read back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use insights_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{decode_body, ArtifactStore};
use crate::pipeline::{
    Report, ReportKind, ReportRef, ReportSummary, SectionArtifact, SectionKey, SectionSlot, Stage,
};

const REPORT_META_FILE: &str = "report.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportMeta {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionFile {
    updated_at: DateTime<Utc>,
    body: serde_json::Value,
}

pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn report_dir(&self, report: &ReportRef) -> PathBuf {
        self.root.join(report.kind.as_str()).join(&report.id)
    }

    fn section_stem(key: &SectionKey) -> String {
        match key.slot {
            SectionSlot::Whole => key.stage.as_str().to_string(),
            _ => format!("{}.{}", key.stage, key.slot.encode()),
        }
    }

    /// Inverse of `section_stem`; `None` for files that are not sections
    fn parse_stem(kind: ReportKind, stem: &str) -> Option<SectionKey> {
        let (stage_name, slot) = match stem.split_once('.') {
            Some((stage, slot)) => (stage, slot),
            None => (stem, ""),
        };
        let stage = Stage::parse(kind, stage_name)?;
        let slot = SectionSlot::decode(stage.slot_kind(), slot).ok()?;
        Some(SectionKey { stage, slot })
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Write via a sibling temp file so readers never see a partial file.
    /// Each write gets its own temp name; concurrent writers end with the
    /// last rename winning.
    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Io(e));
        }
        Ok(())
    }

    async fn read_section(
        &self,
        report: &ReportRef,
        key: &SectionKey,
    ) -> Result<Option<SectionArtifact>> {
        let path = self
            .report_dir(report)
            .join(format!("{}.json", Self::section_stem(key)));
        let Some(file) = Self::read_json::<SectionFile>(&path).await? else {
            return Ok(None);
        };

        Ok(Some(SectionArtifact {
            key: key.clone(),
            body: decode_body(key.stage, file.body)?,
            updated_at: file.updated_at,
        }))
    }

    async fn read_all_sections(&self, report: &ReportRef) -> Result<Vec<SectionArtifact>> {
        let dir = self.report_dir(report);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut sections = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let Some(key) = Self::parse_stem(report.kind, stem) else {
                continue;
            };
            if let Some(section) = self.read_section(report, &key).await? {
                sections.push(section);
            }
        }
        Ok(sections)
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    fn backend(&self) -> &'static str {
        "files"
    }

    async fn load_section(
        &self,
        report: &ReportRef,
        key: &SectionKey,
    ) -> Result<Option<SectionArtifact>> {
        self.read_section(report, key).await
    }

    async fn list_sections(&self, report: &ReportRef, stage: Stage) -> Result<Vec<SectionArtifact>> {
        let mut sections: Vec<_> = self
            .read_all_sections(report)
            .await?
            .into_iter()
            .filter(|s| s.key.stage == stage)
            .collect();
        sections.sort_by(|a, b| a.key.slot.cmp(&b.key.slot));
        Ok(sections)
    }

    async fn save_section(&self, report: &ReportRef, artifact: &SectionArtifact) -> Result<()> {
        let dir = self.report_dir(report);
        tokio::fs::create_dir_all(&dir).await?;

        let meta_path = dir.join(REPORT_META_FILE);
        let meta = match Self::read_json::<ReportMeta>(&meta_path).await? {
            Some(existing) => ReportMeta {
                created_at: existing.created_at,
                updated_at: artifact.updated_at,
            },
            None => ReportMeta {
                created_at: artifact.updated_at,
                updated_at: artifact.updated_at,
            },
        };

        let stem = Self::section_stem(&artifact.key);
        let file = SectionFile {
            updated_at: artifact.updated_at,
            body: artifact.body.to_value()?,
        };

        Self::write_atomic(
            &dir.join(format!("{}.json", stem)),
            &serde_json::to_vec_pretty(&file)?,
        )
        .await?;
        Self::write_atomic(&dir.join(format!("{}.md", stem)), artifact.markdown().as_bytes()).await?;
        Self::write_atomic(&meta_path, &serde_json::to_vec_pretty(&meta)?).await?;

        tracing::debug!(
            report = %report,
            section = %artifact.key,
            dir = %dir.display(),
            "Section saved to files"
        );
        Ok(())
    }

    async fn load_report(&self, report: &ReportRef) -> Result<Option<Report>> {
        let meta_path = self.report_dir(report).join(REPORT_META_FILE);
        let Some(meta) = Self::read_json::<ReportMeta>(&meta_path).await? else {
            return Ok(None);
        };

        let sections = self.read_all_sections(report).await?;
        Ok(Some(Report::new(
            report.clone(),
            meta.created_at,
            meta.updated_at,
            sections,
        )))
    }

    async fn list_reports(&self, kind: ReportKind) -> Result<Vec<ReportSummary>> {
        let kind_dir = self.root.join(kind.as_str());
        let mut entries = match tokio::fs::read_dir(&kind_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(report) = ReportRef::new(kind, id) else {
                continue;
            };
            if let Some(loaded) = self.load_report(&report).await? {
                summaries.push(ReportSummary {
                    section_count: loaded.sections.len(),
                    report,
                    created_at: loaded.created_at,
                    updated_at: loaded.updated_at,
                });
            }
        }
        summaries.sort_by(|a, b| a.report.id.cmp(&b.report.id));
        Ok(summaries)
    }
}
