//! Database access for vshelf-ingest
//!
//! Schema lives in `vshelf_common::db::init`. Vectors are stored as JSON
//! arrays in TEXT columns; similarity math happens in Rust.

pub mod collections;
pub mod segments;
pub mod source_videos;
pub mod videos;

use uuid::Uuid;
use vshelf_common::{Error, Result};

/// Serialize a vector for storage
///
/// Non-finite components are rejected: JSON would silently turn them into `null`.
pub fn encode_vector(vector: &[f32]) -> Result<String> {
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(
            "vector contains non-finite components".to_string(),
        ));
    }
    serde_json::to_string(vector).map_err(|e| Error::Internal(format!("encode vector: {}", e)))
}

/// Deserialize a stored vector column
pub fn decode_vector(raw: Option<String>) -> Result<Option<Vec<f32>>> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Error::Internal(format!("decode vector: {}", e))),
    }
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("invalid uuid '{}': {}", raw, e)))
}
