//! Transcript source
//!
//! The pipeline never scrapes; it reads what an upstream fetcher stored.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::source_videos;
use crate::error::IngestError;
use crate::models::SourceVideo;

/// Supplier of raw videos to ingest
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// `None` when the source is unknown or has no usable transcript
    async fn fetch(&self, source_id: &str) -> Result<Option<SourceVideo>, IngestError>;

    /// Every source id the provider knows, in backfill order
    async fn list_source_ids(&self) -> Result<Vec<String>, IngestError>;
}

/// Reads the `source_videos` table
pub struct SqliteTranscriptProvider {
    db: SqlitePool,
}

impl SqliteTranscriptProvider {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TranscriptProvider for SqliteTranscriptProvider {
    async fn fetch(&self, source_id: &str) -> Result<Option<SourceVideo>, IngestError> {
        let Some(row) = source_videos::load_source(&self.db, source_id).await? else {
            return Ok(None);
        };

        let transcript = match row.transcript {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Ok(None),
        };

        Ok(Some(SourceVideo {
            source_id: row.source_id,
            title: row.title,
            description: row.description,
            transcript,
        }))
    }

    async fn list_source_ids(&self) -> Result<Vec<String>, IngestError> {
        Ok(source_videos::list_source_ids(&self.db).await?)
    }
}
