//! Segment database operations
//!
//! Segments are replaced as a whole set per video.

use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use vshelf_common::{Error, Result};

use super::{decode_vector, encode_vector, parse_uuid};
use crate::models::{EmbeddedSegment, Segment};

/// Delete every segment of the video, then insert the new set
///
/// Must run inside the caller's transaction; positions follow slice order.
pub async fn replace_for_video(
    conn: &mut SqliteConnection,
    video_id: Uuid,
    segments: &[EmbeddedSegment],
) -> Result<usize> {
    sqlx::query("DELETE FROM segments WHERE video_id = ?")
        .bind(video_id.to_string())
        .execute(&mut *conn)
        .await?;

    for (position, segment) in segments.iter().enumerate() {
        let draft = &segment.draft;
        let tags = serde_json::to_string(&draft.tags)
            .map_err(|e| Error::Internal(format!("encode tags: {}", e)))?;
        let embedding = segment.embedding.as_deref().map(encode_vector).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO segments (
                id, video_id, position, start_time, end_time,
                content, summary, tags, key_takeaway, embedding
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(video_id.to_string())
        .bind(position as i64)
        .bind(draft.start_time)
        .bind(draft.end_time)
        .bind(&draft.content)
        .bind(&draft.summary)
        .bind(tags)
        .bind(&draft.key_takeaway)
        .bind(embedding)
        .execute(&mut *conn)
        .await?;
    }

    Ok(segments.len())
}

/// Load a video's segments ordered by start time
pub async fn load_for_video(pool: &SqlitePool, video_id: Uuid) -> Result<Vec<Segment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, video_id, position, start_time, end_time,
               content, summary, tags, key_takeaway, embedding
        FROM segments
        WHERE video_id = ?
        ORDER BY start_time, position
        "#,
    )
    .bind(video_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut segments = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.try_get("id")?;
        let video_id: String = row.try_get("video_id")?;
        let tags: String = row.try_get("tags")?;

        segments.push(Segment {
            id: parse_uuid(&id)?,
            video_id: parse_uuid(&video_id)?,
            position: row.try_get("position")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            content: row.try_get("content")?,
            summary: row.try_get("summary")?,
            tags: serde_json::from_str(&tags)
                .map_err(|e| Error::Internal(format!("decode tags: {}", e)))?,
            key_takeaway: row.try_get("key_takeaway")?,
            embedding: decode_vector(row.try_get("embedding")?)?,
        });
    }

    Ok(segments)
}

/// Count a video's segments
pub async fn count_for_video(pool: &SqlitePool, video_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM segments WHERE video_id = ?")
        .bind(video_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
