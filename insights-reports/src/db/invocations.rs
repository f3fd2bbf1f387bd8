//! Prompt invocation records
//!
//! One row per generation call. Created `in_progress`, then updated exactly
//! once to `completed` or `failed`.

use chrono::Utc;
use insights_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::pipeline::{ReportRef, SectionKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    InProgress,
    Completed,
    Failed,
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::InProgress => "in_progress",
            InvocationStatus::Completed => "completed",
            InvocationStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "in_progress" => Ok(InvocationStatus::InProgress),
            "completed" => Ok(InvocationStatus::Completed),
            "failed" => Ok(InvocationStatus::Failed),
            other => Err(Error::Internal(format!("Unknown invocation status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRecord {
    pub id: Uuid,
    pub prompt_key: String,
    pub prompt_version: i64,
    pub stage: String,
    pub slot: String,
    pub input: Value,
    pub output: Option<Value>,
    pub status: InvocationStatus,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Insert an `in_progress` record and return its id
pub async fn start_invocation(
    pool: &SqlitePool,
    report: &ReportRef,
    key: &SectionKey,
    prompt_key: &str,
    prompt_version: i64,
    input: &Value,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO prompt_invocations (
            id, prompt_key, prompt_version, report_kind, report_id, stage, slot,
            input_json, output_json, status, error, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, NULL, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(prompt_key)
    .bind(prompt_version)
    .bind(report.kind.as_str())
    .bind(&report.id)
    .bind(key.stage.as_str())
    .bind(key.slot.encode())
    .bind(serde_json::to_string(input)?)
    .bind(InvocationStatus::InProgress.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn complete_invocation(pool: &SqlitePool, id: Uuid, output: &Value) -> Result<()> {
    finish(pool, id, InvocationStatus::Completed, Some(serde_json::to_string(output)?), None).await
}

pub async fn fail_invocation(
    pool: &SqlitePool,
    id: Uuid,
    error: &str,
    raw_output: Option<&Value>,
) -> Result<()> {
    let output = raw_output.map(serde_json::to_string).transpose()?;
    finish(pool, id, InvocationStatus::Failed, output, Some(error)).await
}

async fn finish(
    pool: &SqlitePool,
    id: Uuid,
    status: InvocationStatus,
    output_json: Option<String>,
    error: Option<&str>,
) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE prompt_invocations
        SET status = ?, output_json = ?, error = ?, updated_at = ?
        WHERE id = ? AND status = 'in_progress'
        "#,
    )
    .bind(status.as_str())
    .bind(output_json)
    .bind(error)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(format!("Open invocation not found: {}", id)));
    }
    Ok(())
}

/// Records for one report, oldest first
pub async fn list_invocations(pool: &SqlitePool, report: &ReportRef) -> Result<Vec<InvocationRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, prompt_key, prompt_version, stage, slot, input_json, output_json,
               status, error, created_at, updated_at
        FROM prompt_invocations
        WHERE report_kind = ? AND report_id = ?
        ORDER BY rowid ASC
        "#,
    )
    .bind(report.kind.as_str())
    .bind(&report.id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<InvocationRecord> {
            let id: String = row.get("id");
            let input_json: String = row.get("input_json");
            let output_json: Option<String> = row.get("output_json");
            let status: String = row.get("status");
            Ok(InvocationRecord {
                id: Uuid::parse_str(&id)
                    .map_err(|e| Error::Internal(format!("Invalid invocation id {}: {}", id, e)))?,
                prompt_key: row.get("prompt_key"),
                prompt_version: row.get("prompt_version"),
                stage: row.get("stage"),
                slot: row.get("slot"),
                input: serde_json::from_str(&input_json)?,
                output: output_json.as_deref().map(serde_json::from_str).transpose()?,
                status: InvocationStatus::parse(&status)?,
                error: row.get("error"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ReportKind, Stage};
    use serde_json::json;

    async fn pool() -> SqlitePool {
        let pool = insights_common::db::init_memory_database().await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_invocation_lifecycle() {
        let pool = pool().await;
        let report = ReportRef::new(ReportKind::IndustryTariff, "steel").unwrap();
        let key = SectionKey::whole(Stage::Headings);

        let ok = start_invocation(&pool, &report, &key, "industry-tariff.headings", 1, &json!({"industry": "steel"}))
            .await
            .unwrap();
        complete_invocation(&pool, ok, &json!({"headings": []})).await.unwrap();

        let bad = start_invocation(&pool, &report, &key, "industry-tariff.headings", 1, &json!({}))
            .await
            .unwrap();
        fail_invocation(&pool, bad, "boom", None).await.unwrap();

        let records = list_invocations(&pool, &report).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, InvocationStatus::Completed);
        assert_eq!(records[0].output, Some(json!({"headings": []})));
        assert_eq!(records[1].status, InvocationStatus::Failed);
        assert_eq!(records[1].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_terminal_status_is_set_once() {
        let pool = pool().await;
        let report = ReportRef::new(ReportKind::PublicEquity, "AAPL").unwrap();
        let key = SectionKey::whole(Stage::Criteria);

        let id = start_invocation(&pool, &report, &key, "public-equity.criteria", 1, &json!({}))
            .await
            .unwrap();
        complete_invocation(&pool, id, &json!({})).await.unwrap();

        let err = fail_invocation(&pool, id, "late", None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
