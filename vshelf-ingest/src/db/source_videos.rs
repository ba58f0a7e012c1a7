//! Source video table: raw scraper output the pipeline reads from

use sqlx::{Row, SqlitePool};
use vshelf_common::Result;

/// Source row, transcript still optional
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub source_id: String,
    pub title: String,
    pub description: Option<String>,
    pub transcript: Option<String>,
}

/// Insert or replace a source row
pub async fn save_source(pool: &SqlitePool, row: &SourceRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO source_videos (source_id, title, description, transcript)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(source_id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            transcript = excluded.transcript
        "#,
    )
    .bind(&row.source_id)
    .bind(&row.title)
    .bind(&row.description)
    .bind(&row.transcript)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one source row
pub async fn load_source(pool: &SqlitePool, source_id: &str) -> Result<Option<SourceRow>> {
    let row = sqlx::query(
        "SELECT source_id, title, description, transcript FROM source_videos WHERE source_id = ?",
    )
    .bind(source_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(SourceRow {
            source_id: row.try_get("source_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            transcript: row.try_get("transcript")?,
        })),
        None => Ok(None),
    }
}

/// All known source ids, oldest first
pub async fn list_source_ids(pool: &SqlitePool) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar("SELECT source_id FROM source_videos ORDER BY created_at, source_id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}
