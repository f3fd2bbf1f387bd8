//! Database access for insights-reports

pub mod invocations;
pub mod prompts;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open the service database and make sure every table exists
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = insights_common::db::init_database(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create report, prompt and invocation tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> insights_common::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            kind TEXT NOT NULL,
            report_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (kind, report_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS report_sections (
            kind TEXT NOT NULL,
            report_id TEXT NOT NULL,
            stage TEXT NOT NULL,
            slot TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (kind, report_id, stage, slot),
            FOREIGN KEY (kind, report_id) REFERENCES reports (kind, report_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompts (
            key TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompt_versions (
            prompt_key TEXT NOT NULL REFERENCES prompts (key),
            version INTEGER NOT NULL,
            template TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            PRIMARY KEY (prompt_key, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompt_invocations (
            id TEXT PRIMARY KEY,
            prompt_key TEXT NOT NULL,
            prompt_version INTEGER NOT NULL,
            report_kind TEXT NOT NULL,
            report_id TEXT NOT NULL,
            stage TEXT NOT NULL,
            slot TEXT NOT NULL DEFAULT '',
            input_json TEXT NOT NULL,
            output_json TEXT,
            status TEXT NOT NULL,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_prompt_invocations_report \
         ON prompt_invocations (report_kind, report_id, created_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (reports, report_sections, prompts, prompt_versions, prompt_invocations)");

    Ok(())
}
