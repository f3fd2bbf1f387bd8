//! Prompt catalog: prompts and their versioned templates

use chrono::Utc;
use insights_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::generation::templates;
use crate::pipeline::Stage;

/// The active template of one prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVersion {
    pub prompt_key: String,
    pub version: i64,
    pub template: String,
}

/// Catalog listing entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptInfo {
    pub key: String,
    pub name: String,
    pub active_version: Option<i64>,
    pub version_count: i64,
}

/// Insert version 1 of every stage prompt that does not exist yet
pub async fn seed_default_prompts(pool: &SqlitePool) -> Result<usize> {
    let mut seeded = 0;
    for stage in Stage::all() {
        let now = Utc::now().to_rfc3339();
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO prompts (key, name, created_at) VALUES (?, ?, ?)",
        )
        .bind(stage.prompt_key())
        .bind(templates::default_name(stage))
        .bind(&now)
        .execute(pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            sqlx::query(
                r#"
                INSERT INTO prompt_versions (prompt_key, version, template, is_active, created_at)
                VALUES (?, 1, ?, 1, ?)
                "#,
            )
            .bind(stage.prompt_key())
            .bind(templates::default_template(stage))
            .bind(&now)
            .execute(pool)
            .await?;
            seeded += 1;
        }
    }

    if seeded > 0 {
        tracing::info!(count = seeded, "Seeded default prompts");
    }
    Ok(seeded)
}

/// Active version of `prompt_key`, if any
pub async fn active_prompt(pool: &SqlitePool, prompt_key: &str) -> Result<Option<PromptVersion>> {
    let row = sqlx::query(
        r#"
        SELECT prompt_key, version, template
        FROM prompt_versions
        WHERE prompt_key = ? AND is_active = 1
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(prompt_key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| PromptVersion {
        prompt_key: row.get("prompt_key"),
        version: row.get("version"),
        template: row.get("template"),
    }))
}

pub async fn list_prompts(pool: &SqlitePool) -> Result<Vec<PromptInfo>> {
    let rows = sqlx::query(
        r#"
        SELECT p.key, p.name,
               MAX(CASE WHEN v.is_active = 1 THEN v.version END) AS active_version,
               COUNT(v.version) AS version_count
        FROM prompts p
        LEFT JOIN prompt_versions v ON v.prompt_key = p.key
        GROUP BY p.key, p.name
        ORDER BY p.key
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PromptInfo {
            key: row.get("key"),
            name: row.get("name"),
            active_version: row.get("active_version"),
            version_count: row.get("version_count"),
        })
        .collect())
}

/// Store `template` as the next version of `prompt_key` and make it the only active one
pub async fn publish_version(
    pool: &SqlitePool,
    prompt_key: &str,
    template: &str,
) -> Result<PromptVersion> {
    if template.trim().is_empty() {
        return Err(Error::InvalidInput("Template must not be blank".to_string()));
    }

    let mut tx = pool.begin().await?;

    let exists: Option<String> = sqlx::query_scalar("SELECT key FROM prompts WHERE key = ?")
        .bind(prompt_key)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Prompt not found: {}", prompt_key)));
    }

    let next_version: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM prompt_versions WHERE prompt_key = ?",
    )
    .bind(prompt_key)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE prompt_versions SET is_active = 0 WHERE prompt_key = ?")
        .bind(prompt_key)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO prompt_versions (prompt_key, version, template, is_active, created_at)
        VALUES (?, ?, ?, 1, ?)
        "#,
    )
    .bind(prompt_key)
    .bind(next_version)
    .bind(template)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(prompt_key = %prompt_key, version = next_version, "Published prompt version");

    Ok(PromptVersion {
        prompt_key: prompt_key.to_string(),
        version: next_version,
        template: template.to_string(),
    })
}
