//! Transcript Segmenter
//!
//! Splits a raw transcript into topical segments via the model caller.
//! The estimated duration only gives the model a sense of scale; returned
//! ranges are never validated against it.

use serde::Deserialize;
use std::sync::Arc;

use super::backend::CallTask;
use super::model_caller::{CallTrace, ModelCaller};
use super::response_parser::parse_json_response;
use crate::error::IngestError;
use crate::models::DraftSegment;

/// Accepted response shapes: a bare array or `{"segments": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SegmentEnvelope {
    List(Vec<DraftSegment>),
    Wrapped { segments: Vec<DraftSegment> },
}

impl SegmentEnvelope {
    fn into_segments(self) -> Vec<DraftSegment> {
        match self {
            SegmentEnvelope::List(segments) => segments,
            SegmentEnvelope::Wrapped { segments } => segments,
        }
    }
}

/// Segmentation result with its call trace
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub segments: Vec<DraftSegment>,
    /// Entries dropped for an invalid time range
    pub dropped: usize,
    pub trace: CallTrace,
}

/// Estimated spoken duration for a transcript
pub fn estimate_duration_secs(transcript: &str, chars_per_second: f64) -> f64 {
    if chars_per_second <= 0.0 {
        return 0.0;
    }
    transcript.chars().count() as f64 / chars_per_second
}

pub struct TranscriptSegmenter {
    caller: Arc<ModelCaller>,
}

impl TranscriptSegmenter {
    pub fn new(caller: Arc<ModelCaller>) -> Self {
        Self { caller }
    }

    pub async fn segment(
        &self,
        transcript: &str,
        estimated_duration_secs: f64,
    ) -> Result<Segmentation, IngestError> {
        let prompt = build_prompt(transcript, estimated_duration_secs);

        let traced = self
            .caller
            .generate_json(CallTask::Segmentation, prompt)
            .await
            .map_err(|e| IngestError::SegmentationFailed(e.to_string()))?;

        let (envelope, step) = parse_json_response::<SegmentEnvelope>(&traced.value)
            .ok_or_else(|| {
                IngestError::SegmentationFailed(
                    "response did not contain a segment list".to_string(),
                )
            })?;

        let (segments, dropped) = clean_segments(envelope.into_segments());
        tracing::debug!(
            segments = segments.len(),
            dropped,
            parse_step = ?step,
            "Transcript segmented"
        );

        Ok(Segmentation {
            segments,
            dropped,
            trace: traced.trace,
        })
    }
}

/// Drop invalid ranges and sort by start time
fn clean_segments(raw: Vec<DraftSegment>) -> (Vec<DraftSegment>, usize) {
    let total = raw.len();
    let mut segments: Vec<DraftSegment> = raw
        .into_iter()
        .filter(|segment| {
            let valid = segment.has_valid_range();
            if !valid {
                tracing::warn!(
                    start = segment.start_time,
                    end = segment.end_time,
                    "Dropping segment with invalid time range"
                );
            }
            valid
        })
        .collect();

    segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    let dropped = total - segments.len();
    (segments, dropped)
}

fn build_prompt(transcript: &str, estimated_duration_secs: f64) -> String {
    let minutes = (estimated_duration_secs / 60.0).round() as u64;
    format!(
        r#"You are segmenting a video transcript into coherent topical sections.
The video is roughly {minutes} minutes long ({seconds:.0} seconds); use this only as a sense of scale.

Return a JSON array. Each element must have:
  "start_time": start offset in seconds (number)
  "end_time": end offset in seconds (number, greater than start_time)
  "content": the transcript text of the section
  "summary": one or two sentences summarising the section
  "tags": a list of short topical keywords
  "key_takeaway": the single most important point of the section

Order sections by start_time. Do not overlap sections.

TRANSCRIPT:
{transcript}"#,
        minutes = minutes,
        seconds = estimated_duration_secs,
        transcript = transcript,
    )
}
