//! Embedding Generator
//!
//! One vector per text. Retries are the model caller's business; a failure
//! here is final for the text in question.

use std::sync::Arc;

use super::model_caller::{ModelCaller, Traced};
use crate::error::IngestError;
use crate::models::DraftSegment;

pub struct EmbeddingGenerator {
    caller: Arc<ModelCaller>,
    /// Expected vector length; 0 accepts any
    dimension: usize,
}

impl EmbeddingGenerator {
    pub fn new(caller: Arc<ModelCaller>, dimension: usize) -> Self {
        Self { caller, dimension }
    }

    pub async fn embed(&self, text: &str) -> Result<Traced<Vec<f32>>, IngestError> {
        let traced = self
            .caller
            .embed(text)
            .await
            .map_err(|e| IngestError::EmbeddingFailed(e.to_string()))?;

        check_vector(&traced.value, self.dimension)?;
        Ok(traced)
    }
}

fn check_vector(vector: &[f32], dimension: usize) -> Result<(), IngestError> {
    if vector.is_empty() {
        return Err(IngestError::EmbeddingFailed("empty vector returned".to_string()));
    }
    if dimension != 0 && vector.len() != dimension {
        return Err(IngestError::EmbeddingFailed(format!(
            "expected {} dimensions, got {}",
            dimension,
            vector.len()
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(IngestError::EmbeddingFailed(
            "vector contains non-finite components".to_string(),
        ));
    }
    Ok(())
}

/// Text sent to the embedding model for one segment.
///
/// Video context first (title, summary), then the segment body
/// (summary, key takeaway, raw content). Empty parts are left out.
pub fn compose_segment_input(
    video_title: &str,
    video_summary: Option<&str>,
    segment: &DraftSegment,
) -> String {
    let mut header = format!("Video: {}", video_title.trim());
    if let Some(summary) = video_summary.map(str::trim).filter(|s| !s.is_empty()) {
        header.push_str("\nVideo summary: ");
        header.push_str(summary);
    }

    let mut body = Vec::new();
    if !segment.summary.trim().is_empty() {
        body.push(format!("Segment summary: {}", segment.summary.trim()));
    }
    if !segment.key_takeaway.trim().is_empty() {
        body.push(format!("Key takeaway: {}", segment.key_takeaway.trim()));
    }
    if !segment.content.trim().is_empty() {
        body.push(format!("Content: {}", segment.content.trim()));
    }

    if body.is_empty() {
        header
    } else {
        format!("{}\n\n{}", header, body.join("\n"))
    }
}
