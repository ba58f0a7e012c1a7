//! Tests for database initialization
//!
//! Covers automatic database creation, idempotent re-open, and the
//! uniqueness rules of the collection tree.

use tempfile::TempDir;
use vshelf_common::db::init::{init_database, SCHEMA_VERSION};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("sub").join("vshelf.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("vshelf.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_expected_tables_exist() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("vshelf.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "collection_videos",
        "collections",
        "schema_version",
        "segments",
        "source_videos",
        "videos",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_duplicate_system_root_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("vshelf.db")).await.unwrap();

    sqlx::query("INSERT INTO collections (id, name, origin, parent_id) VALUES ('a', 'Science', 'SYSTEM', NULL)")
        .execute(&pool)
        .await
        .unwrap();

    let dup = sqlx::query(
        "INSERT INTO collections (id, name, origin, parent_id) VALUES ('b', 'Science', 'SYSTEM', NULL)",
    )
    .execute(&pool)
    .await;
    assert!(dup.is_err(), "NULL parents must collide for SYSTEM roots");

    // USER collections are free to share names
    for id in ["u1", "u2"] {
        sqlx::query("INSERT INTO collections (id, name, origin, parent_id) VALUES (?, 'Science', 'USER', NULL)")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_segment_requires_start_before_end() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("vshelf.db")).await.unwrap();

    sqlx::query("INSERT INTO videos (id, source_id) VALUES ('v1', 'src-1')")
        .execute(&pool)
        .await
        .unwrap();

    let bad = sqlx::query(
        "INSERT INTO segments (id, video_id, position, start_time, end_time, content) VALUES ('s1', 'v1', 0, 30.0, 10.0, 'x')",
    )
    .execute(&pool)
    .await;
    assert!(bad.is_err());
}
