//! Collection tree database operations
//!
//! `find_or_create_system` is the single atomic find-or-create primitive for
//! taxonomy nodes. It leans on the partial unique index
//! `idx_collections_system_identity` (name, COALESCE(parent_id, ''), origin):
//! the insert is a no-op on conflict and the follow-up select returns
//! whichever row won.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use vshelf_common::{Error, Result};

use super::{decode_vector, encode_vector, parse_uuid};
use crate::models::{Collection, CollectionOrigin};

const COLLECTION_COLUMNS: &str = "id, name, description, origin, parent_id, centroid";

/// Find or create a SYSTEM collection under `parent_id` (None = root level)
pub async fn find_or_create_system(
    conn: &mut SqliteConnection,
    name: &str,
    parent_id: Option<Uuid>,
    description: &str,
) -> Result<Collection> {
    let parent = parent_id.map(|id| id.to_string());

    let inserted = sqlx::query(
        r#"
        INSERT INTO collections (id, name, description, origin, parent_id, created_at, updated_at)
        VALUES (?, ?, ?, 'SYSTEM', ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(description)
    .bind(&parent)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() > 0 {
        tracing::info!(name = %name, parent = ?parent_id, "Created SYSTEM collection");
    }

    let row = sqlx::query(&format!(
        "SELECT {} FROM collections WHERE name = ? AND parent_id IS ? AND origin = 'SYSTEM'",
        COLLECTION_COLUMNS
    ))
    .bind(name)
    .bind(&parent)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => collection_from_row(&row),
        None => Err(Error::Internal(format!(
            "SYSTEM collection '{}' missing after find-or-create",
            name
        ))),
    }
}

/// Create a USER collection (curated guide)
pub async fn create_user_collection(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
    centroid: Option<&[f32]>,
) -> Result<Collection> {
    let id = Uuid::new_v4();
    let encoded = centroid.map(encode_vector).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO collections (id, name, description, origin, parent_id, centroid, created_at, updated_at)
        VALUES (?, ?, ?, 'USER', NULL, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(id.to_string())
    .bind(name)
    .bind(description)
    .bind(encoded)
    .execute(pool)
    .await?;

    Ok(Collection {
        id,
        name: name.to_string(),
        description: description.map(str::to_string),
        origin: CollectionOrigin::User,
        parent_id: None,
        centroid: centroid.map(<[f32]>::to_vec),
    })
}

/// Link a video into a collection; returns false when it was already a member
pub async fn link_video(
    conn: &mut SqliteConnection,
    collection_id: Uuid,
    video_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO collection_videos (collection_id, video_id, added_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(collection_id, video_id) DO NOTHING
        "#,
    )
    .bind(collection_id.to_string())
    .bind(video_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a video from a collection; returns false when it was not a member
pub async fn unlink_video(
    conn: &mut SqliteConnection,
    collection_id: Uuid,
    video_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM collection_videos WHERE collection_id = ? AND video_id = ?")
        .bind(collection_id.to_string())
        .bind(video_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// SYSTEM branches (non-root collections) the video belongs to
pub async fn system_branches_of(conn: &mut SqliteConnection, video_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT c.id
        FROM collection_videos cv
        JOIN collections c ON c.id = cv.collection_id
        WHERE cv.video_id = ? AND c.origin = 'SYSTEM' AND c.parent_id IS NOT NULL
        ORDER BY c.id
        "#,
    )
    .bind(video_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    ids.iter().map(|id| parse_uuid(id)).collect()
}

/// Vectors of every member video that currently has one
pub async fn member_embeddings(
    conn: &mut SqliteConnection,
    collection_id: Uuid,
) -> Result<Vec<Vec<f32>>> {
    let rows: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT v.embedding
        FROM collection_videos cv
        JOIN videos v ON v.id = cv.video_id
        WHERE cv.collection_id = ? AND v.embedding IS NOT NULL
        ORDER BY cv.added_at, v.id
        "#,
    )
    .bind(collection_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut vectors = Vec::with_capacity(rows.len());
    for raw in rows {
        if let Some(vector) = decode_vector(Some(raw))? {
            vectors.push(vector);
        }
    }
    Ok(vectors)
}

/// Overwrite a collection's centroid (None clears it)
pub async fn set_centroid(
    conn: &mut SqliteConnection,
    collection_id: Uuid,
    centroid: Option<&[f32]>,
) -> Result<()> {
    let encoded = centroid.map(encode_vector).transpose()?;

    sqlx::query("UPDATE collections SET centroid = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(encoded)
        .bind(collection_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Collections of one origin that have a centroid
pub async fn list_with_centroid(
    pool: &SqlitePool,
    origin: CollectionOrigin,
) -> Result<Vec<Collection>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM collections WHERE origin = ? AND centroid IS NOT NULL ORDER BY name, id",
        COLLECTION_COLUMNS
    ))
    .bind(origin.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(collection_from_row).collect()
}

/// Load one collection
pub async fn load_collection(pool: &SqlitePool, collection_id: Uuid) -> Result<Option<Collection>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM collections WHERE id = ?",
        COLLECTION_COLUMNS
    ))
    .bind(collection_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(collection_from_row).transpose()
}

/// Direct children of a collection, or roots when `parent_id` is None
pub async fn list_children(
    pool: &SqlitePool,
    parent_id: Option<Uuid>,
    origin: CollectionOrigin,
) -> Result<Vec<Collection>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM collections WHERE parent_id IS ? AND origin = ? ORDER BY name, id",
        COLLECTION_COLUMNS
    ))
    .bind(parent_id.map(|id| id.to_string()))
    .bind(origin.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(collection_from_row).collect()
}

/// Member video ids
pub async fn list_members(pool: &SqlitePool, collection_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT video_id FROM collection_videos WHERE collection_id = ? ORDER BY added_at, video_id",
    )
    .bind(collection_id.to_string())
    .fetch_all(pool)
    .await?;

    ids.iter().map(|id| parse_uuid(id)).collect()
}

fn collection_from_row(row: &SqliteRow) -> Result<Collection> {
    let id: String = row.try_get("id")?;
    let origin: String = row.try_get("origin")?;
    let parent_id: Option<String> = row.try_get("parent_id")?;

    Ok(Collection {
        id: parse_uuid(&id)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        origin: origin.parse::<CollectionOrigin>().map_err(Error::Internal)?,
        parent_id: parent_id.as_deref().map(parse_uuid).transpose()?,
        centroid: decode_vector(row.try_get("centroid")?)?,
    })
}
