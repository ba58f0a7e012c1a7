//! Video record and its ingestion lifecycle
//!
//! Status cycles PENDING → PROCESSING → COMPLETED | FAILED on every run.
//! One record exists per external source id; re-ingestion recycles it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Taxonomy;

/// Ingestion lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoStatus {
    /// Created, never processed
    Pending,
    /// A run is in flight
    Processing,
    /// Last run persisted segments, vector and taxonomy
    Completed,
    /// Last run aborted
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "PENDING",
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::Completed => "COMPLETED",
            VideoStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(VideoStatus::Pending),
            "PROCESSING" => Ok(VideoStatus::Processing),
            "COMPLETED" => Ok(VideoStatus::Completed),
            "FAILED" => Ok(VideoStatus::Failed),
            other => Err(format!("unknown video status '{}'", other)),
        }
    }
}

/// Persisted video
#[derive(Debug, Clone, Serialize)]
pub struct Video {
    /// Internal id, stable across re-ingestion
    pub id: Uuid,
    /// External source identifier (unique)
    pub source_id: String,
    pub title: String,
    pub description: Option<String>,
    pub transcript: Option<String>,
    pub status: VideoStatus,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub taxonomy: Option<Taxonomy>,
    /// Video-level centroid; absent until a run produced at least one segment vector
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

impl Video {
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// Source record handed over by the transcript provider
#[derive(Debug, Clone)]
pub struct SourceVideo {
    pub source_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Plain text with inline timestamp markers
    pub transcript: String,
}
