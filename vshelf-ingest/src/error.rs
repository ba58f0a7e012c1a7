//! Error types for vshelf-ingest
//!
//! `IngestError` is the pipeline's failure taxonomy. Which variants are fatal
//! to a run is decided by the orchestrator, not here:
//! - fatal: `CallExhausted`, `SegmentationFailed`, `ClassificationFailed`, `PersistenceFailed`
//! - recovered per segment: `EmbeddingFailed`
//! - logged only: `FilingFailed`
//!
//! `ApiError` maps everything onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::model_caller::CallExhausted;

/// Pipeline error
#[derive(Debug, Error)]
pub enum IngestError {
    /// Every attempt against the generation endpoint failed
    #[error(transparent)]
    CallExhausted(#[from] Box<CallExhausted>),

    /// Segmentation response never parsed into segments
    #[error("Segmentation failed: {0}")]
    SegmentationFailed(String),

    /// Taxonomy could not be obtained
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    /// One segment could not be embedded
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Atomic write of an ingestion result aborted
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Collection tree update failed after a successful ingest
    #[error("Filing failed: {0}")]
    FilingFailed(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error outside the atomic persistence step
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// vshelf-common error
    #[error(transparent)]
    Common(#[from] vshelf_common::Error),
}

impl IngestError {
    /// Short machine-readable code used in logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::CallExhausted(_) => "CALL_EXHAUSTED",
            IngestError::SegmentationFailed(_) => "SEGMENTATION_FAILED",
            IngestError::ClassificationFailed(_) => "CLASSIFICATION_FAILED",
            IngestError::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            IngestError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
            IngestError::FilingFailed(_) => "FILING_FAILED",
            IngestError::NotFound(_) => "NOT_FOUND",
            IngestError::Config(_) => "CONFIG_ERROR",
            IngestError::Database(_) => "DATABASE_ERROR",
            IngestError::Common(_) => "COMMON_ERROR",
        }
    }

    /// True when SQLite reported a held write lock
    pub fn is_database_locked(&self) -> bool {
        match self {
            IngestError::Database(err) => {
                let msg = err.to_string();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            IngestError::Common(err) => err.is_database_locked(),
            _ => false,
        }
    }
}

impl From<CallExhausted> for IngestError {
    fn from(err: CallExhausted) -> Self {
        IngestError::CallExhausted(Box::new(err))
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Pipeline failure (500 or 502)
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Ingest(ref err) => {
                let status = match err {
                    IngestError::NotFound(_) => StatusCode::NOT_FOUND,
                    IngestError::CallExhausted(_)
                    | IngestError::SegmentationFailed(_)
                    | IngestError::ClassificationFailed(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
