//! SQLite artifact store
//!
//! `reports` holds one row per industry/ticker, `report_sections` one row per
//! stage slot. A section write upserts both rows in one transaction.

use async_trait::async_trait;
use chrono::Utc;
use insights_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{decode_body, parse_timestamp, ArtifactStore};
use crate::pipeline::{
    Report, ReportKind, ReportRef, ReportSummary, SectionArtifact, SectionKey, SectionSlot, Stage,
};

pub struct SqliteArtifactStore {
    pool: SqlitePool,
}

impl SqliteArtifactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn decode_section(kind: ReportKind, row: &SqliteRow) -> Result<SectionArtifact> {
        let stage_name: String = row.get("stage");
        let stage = Stage::parse(kind, &stage_name)
            .ok_or_else(|| Error::Internal(format!("Unknown stored stage: {}", stage_name)))?;
        let slot: String = row.get("slot");
        let slot = SectionSlot::decode(stage.slot_kind(), &slot)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let body: String = row.get("body");
        let body = decode_body(stage, serde_json::from_str(&body)?)?;
        let updated_at: String = row.get("updated_at");

        Ok(SectionArtifact {
            key: SectionKey { stage, slot },
            body,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        })
    }
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    fn backend(&self) -> &'static str {
        "database"
    }

    async fn load_section(
        &self,
        report: &ReportRef,
        key: &SectionKey,
    ) -> Result<Option<SectionArtifact>> {
        let row = sqlx::query(
            r#"
            SELECT stage, slot, body, updated_at
            FROM report_sections
            WHERE kind = ? AND report_id = ? AND stage = ? AND slot = ?
            "#,
        )
        .bind(report.kind.as_str())
        .bind(&report.id)
        .bind(key.stage.as_str())
        .bind(key.slot.encode())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::decode_section(report.kind, &row))
            .transpose()
    }

    async fn list_sections(&self, report: &ReportRef, stage: Stage) -> Result<Vec<SectionArtifact>> {
        let rows = sqlx::query(
            r#"
            SELECT stage, slot, body, updated_at
            FROM report_sections
            WHERE kind = ? AND report_id = ? AND stage = ?
            "#,
        )
        .bind(report.kind.as_str())
        .bind(&report.id)
        .bind(stage.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut sections = rows
            .iter()
            .map(|row| Self::decode_section(report.kind, row))
            .collect::<Result<Vec<_>>>()?;
        sections.sort_by(|a, b| a.key.slot.cmp(&b.key.slot));
        Ok(sections)
    }

    async fn save_section(&self, report: &ReportRef, artifact: &SectionArtifact) -> Result<()> {
        // Prepare all data BEFORE acquiring a connection
        let body = serde_json::to_string(&artifact.body.to_value()?)?;
        let updated_at = artifact.updated_at.to_rfc3339();
        let created_at = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO reports (kind, report_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(kind, report_id) DO UPDATE SET
                updated_at = excluded.updated_at
            "#,
        )
        .bind(report.kind.as_str())
        .bind(&report.id)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO report_sections (kind, report_id, stage, slot, body, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(kind, report_id, stage, slot) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(report.kind.as_str())
        .bind(&report.id)
        .bind(artifact.key.stage.as_str())
        .bind(artifact.key.slot.encode())
        .bind(&body)
        .bind(&updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(report = %report, section = %artifact.key, "Section saved to database");
        Ok(())
    }

    async fn load_report(&self, report: &ReportRef) -> Result<Option<Report>> {
        let row = sqlx::query(
            "SELECT created_at, updated_at FROM reports WHERE kind = ? AND report_id = ?",
        )
        .bind(report.kind.as_str())
        .bind(&report.id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        let rows = sqlx::query(
            r#"
            SELECT stage, slot, body, updated_at
            FROM report_sections
            WHERE kind = ? AND report_id = ?
            "#,
        )
        .bind(report.kind.as_str())
        .bind(&report.id)
        .fetch_all(&self.pool)
        .await?;

        let sections = rows
            .iter()
            .map(|row| Self::decode_section(report.kind, row))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Report::new(
            report.clone(),
            parse_timestamp("created_at", &created_at)?,
            parse_timestamp("updated_at", &updated_at)?,
            sections,
        )))
    }

    async fn list_reports(&self, kind: ReportKind) -> Result<Vec<ReportSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT r.report_id, r.created_at, r.updated_at, COUNT(s.stage) AS section_count
            FROM reports r
            LEFT JOIN report_sections s
                ON s.kind = r.kind AND s.report_id = r.report_id
            WHERE r.kind = ?
            GROUP BY r.kind, r.report_id
            ORDER BY r.report_id
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ReportSummary> {
                let report_id: String = row.get("report_id");
                let created_at: String = row.get("created_at");
                let updated_at: String = row.get("updated_at");
                let section_count: i64 = row.get("section_count");
                Ok(ReportSummary {
                    report: ReportRef { kind, id: report_id },
                    created_at: parse_timestamp("created_at", &created_at)?,
                    updated_at: parse_timestamp("updated_at", &updated_at)?,
                    section_count: section_count as usize,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sections::{ExecutiveSummary, SectionBody};

    async fn store() -> SqliteArtifactStore {
        let pool = insights_common::db::init_memory_database().await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        SqliteArtifactStore::new(pool)
    }

    fn summary(text: &str) -> SectionArtifact {
        SectionArtifact::new(
            SectionKey::whole(Stage::ExecutiveSummary),
            SectionBody::ExecutiveSummary(ExecutiveSummary {
                title: "Executive Summary".to_string(),
                summary: text.to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_unknown_report_is_none() {
        let store = store().await;
        let report = ReportRef::new(ReportKind::IndustryTariff, "steel").unwrap();
        assert!(store.load_report(&report).await.unwrap().is_none());
        assert!(store
            .load_section(&report, &SectionKey::whole(Stage::Headings))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_resave_replaces_section() {
        let store = store().await;
        let report = ReportRef::new(ReportKind::IndustryTariff, "steel").unwrap();

        store.save_section(&report, &summary("first")).await.unwrap();
        let created = store.load_report(&report).await.unwrap().unwrap().created_at;
        store.save_section(&report, &summary("second")).await.unwrap();

        let loaded = store.load_report(&report).await.unwrap().unwrap();
        assert_eq!(loaded.sections.len(), 1);
        assert_eq!(loaded.created_at, created);
        assert_eq!(loaded.sections[0].body, summary("second").body);

        let listed = store.list_reports(ReportKind::IndustryTariff).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].section_count, 1);
        assert!(store.list_reports(ReportKind::PublicEquity).await.unwrap().is_empty());
    }
}
