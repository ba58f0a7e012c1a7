//! Transcript segments
//!
//! `DraftSegment` is what the segmenter returns; `Segment` is the stored row.
//! A video's segments are always replaced as a set, never patched.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Segment as produced by the segmentation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSegment {
    /// Start offset in seconds
    #[serde(alias = "startTime", alias = "start", deserialize_with = "de_seconds")]
    pub start_time: f64,
    /// End offset in seconds
    #[serde(alias = "endTime", alias = "end", deserialize_with = "de_seconds")]
    pub end_time: f64,
    #[serde(default, alias = "text")]
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "de_tags")]
    pub tags: Vec<String>,
    #[serde(default, alias = "keyTakeaway", alias = "takeaway")]
    pub key_takeaway: String,
}

impl DraftSegment {
    pub fn duration_secs(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Finite times with start strictly before end
    pub fn has_valid_range(&self) -> bool {
        self.start_time.is_finite() && self.end_time.is_finite() && self.start_time < self.end_time
    }
}

/// Draft plus its vector, ready to persist
#[derive(Debug, Clone)]
pub struct EmbeddedSegment {
    pub draft: DraftSegment,
    /// `None` when the embedding call failed for this segment
    pub embedding: Option<Vec<f32>>,
}

/// Stored segment
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub id: Uuid,
    pub video_id: Uuid,
    /// Zero-based order by start time
    pub position: i64,
    pub start_time: f64,
    pub end_time: f64,
    pub content: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub key_takeaway: String,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeconds {
    Number(f64),
    Text(String),
}

fn de_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawSeconds::deserialize(deserializer)? {
        RawSeconds::Number(n) => Ok(n),
        RawSeconds::Text(text) => parse_timestamp(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", text))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTags {
    List(Vec<String>),
    Joined(String),
}

fn de_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = match Option::<RawTags>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(RawTags::List(list)) => list,
        Some(RawTags::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
    };

    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// Parse "90", "90.5", "1:30", "01:02:03" or "[00:01:30]" into seconds
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let trimmed = text
        .trim()
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')'])
        .trim();

    if trimmed.is_empty() {
        return None;
    }

    if !trimmed.contains(':') {
        return trimmed.parse::<f64>().ok().filter(|v| v.is_finite());
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut total = 0.0;
    for part in parts {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}
