//! Video database operations
//!
//! One row per external source id. `recycle_for_ingest` is the only way rows
//! are created, so re-ingestion always lands on the existing record.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use vshelf_common::time::{parse_db_string, to_db_string};
use vshelf_common::{Error, Result};

use super::{decode_vector, encode_vector, parse_uuid};
use crate::models::{SourceVideo, Taxonomy, Video, VideoStatus};

/// Find-or-create the video for a source and mark it PROCESSING
///
/// Existing rows keep their id; source fields are refreshed in place.
pub async fn recycle_for_ingest(pool: &SqlitePool, source: &SourceVideo) -> Result<Uuid> {
    let id: String = sqlx::query_scalar(
        r#"
        INSERT INTO videos (id, source_id, title, description, transcript, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'PROCESSING', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(source_id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            transcript = excluded.transcript,
            status = 'PROCESSING',
            updated_at = CURRENT_TIMESTAMP
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&source.source_id)
    .bind(&source.title)
    .bind(&source.description)
    .bind(&source.transcript)
    .fetch_one(pool)
    .await?;

    parse_uuid(&id)
}

/// Mark a run as failed
pub async fn mark_failed(pool: &SqlitePool, video_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE videos
        SET status = 'FAILED', last_processed_at = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(to_db_string(&at))
    .bind(video_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Write the result of a successful run (call inside the persistence transaction)
pub async fn mark_completed(
    conn: &mut SqliteConnection,
    video_id: Uuid,
    embedding: Option<&[f32]>,
    taxonomy: &Taxonomy,
    at: DateTime<Utc>,
) -> Result<()> {
    let embedding = embedding.map(encode_vector).transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE videos
        SET status = 'COMPLETED',
            embedding = ?,
            taxonomy_root = ?,
            taxonomy_branch = ?,
            taxonomy_leaf = ?,
            last_processed_at = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(embedding)
    .bind(&taxonomy.root)
    .bind(&taxonomy.branch)
    .bind(&taxonomy.leaf)
    .bind(to_db_string(&at))
    .bind(video_id.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("video {}", video_id)));
    }

    Ok(())
}

const VIDEO_COLUMNS: &str = r#"
    id, source_id, title, description, transcript, status, last_processed_at,
    taxonomy_root, taxonomy_branch, taxonomy_leaf, embedding
"#;

/// Load video by internal id
pub async fn load_video(pool: &SqlitePool, video_id: Uuid) -> Result<Option<Video>> {
    let row = sqlx::query(&format!("SELECT {} FROM videos WHERE id = ?", VIDEO_COLUMNS))
        .bind(video_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(video_from_row).transpose()
}

/// Load video by external source id
pub async fn load_by_source_id(pool: &SqlitePool, source_id: &str) -> Result<Option<Video>> {
    let row = sqlx::query(&format!("SELECT {} FROM videos WHERE source_id = ?", VIDEO_COLUMNS))
        .bind(source_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(video_from_row).transpose()
}

/// Video-level vector only
pub async fn load_embedding(pool: &SqlitePool, video_id: Uuid) -> Result<Option<Vec<f32>>> {
    let raw: Option<Option<String>> = sqlx::query_scalar("SELECT embedding FROM videos WHERE id = ?")
        .bind(video_id.to_string())
        .fetch_optional(pool)
        .await?;

    match raw {
        Some(column) => decode_vector(column),
        None => Err(Error::NotFound(format!("video {}", video_id))),
    }
}

/// Count videos (all statuses)
pub async fn count_videos(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn video_from_row(row: &SqliteRow) -> Result<Video> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let last_processed_at: Option<String> = row.try_get("last_processed_at")?;

    let root: Option<String> = row.try_get("taxonomy_root")?;
    let branch: Option<String> = row.try_get("taxonomy_branch")?;
    let leaf: Option<String> = row.try_get("taxonomy_leaf")?;
    let taxonomy = match (root, branch, leaf) {
        (Some(root), Some(branch), Some(leaf)) => Some(Taxonomy { root, branch, leaf }),
        _ => None,
    };

    Ok(Video {
        id: parse_uuid(&id)?,
        source_id: row.try_get("source_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        transcript: row.try_get("transcript")?,
        status: status.parse::<VideoStatus>().map_err(Error::Internal)?,
        last_processed_at: last_processed_at.as_deref().and_then(parse_db_string),
        taxonomy,
        embedding: decode_vector(row.try_get("embedding")?)?,
    })
}
