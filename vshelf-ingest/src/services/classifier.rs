//! Taxonomy Classifier
//!
//! Asks the model for a three-level topic label (root → branch → leaf).

use std::sync::Arc;

use super::backend::CallTask;
use super::model_caller::{CallTrace, ModelCaller};
use super::response_parser::parse_json_response;
use crate::error::IngestError;
use crate::models::Taxonomy;

pub struct TaxonomyClassifier {
    caller: Arc<ModelCaller>,
    max_transcript_chars: usize,
}

impl TaxonomyClassifier {
    pub fn new(caller: Arc<ModelCaller>, max_transcript_chars: usize) -> Self {
        Self {
            caller,
            max_transcript_chars,
        }
    }

    pub async fn classify(
        &self,
        transcript: &str,
        title: &str,
    ) -> Result<(Taxonomy, CallTrace), IngestError> {
        let excerpt = truncate_chars(transcript, self.max_transcript_chars);
        let prompt = build_prompt(title, excerpt);

        let traced = self
            .caller
            .generate_json(CallTask::Classification, prompt)
            .await
            .map_err(|e| IngestError::ClassificationFailed(e.to_string()))?;

        let (raw, _) = parse_json_response::<Taxonomy>(&traced.value).ok_or_else(|| {
            IngestError::ClassificationFailed("response did not contain root/branch/leaf".to_string())
        })?;

        let taxonomy = raw.normalized().ok_or_else(|| {
            IngestError::ClassificationFailed("taxonomy label was empty".to_string())
        })?;

        tracing::debug!(
            root = %taxonomy.root,
            branch = %taxonomy.branch,
            leaf = %taxonomy.leaf,
            "Video classified"
        );

        Ok((taxonomy, traced.trace))
    }
}

/// Prefix of at most `max_chars` characters, cut on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn build_prompt(title: &str, transcript: &str) -> String {
    format!(
        r#"Classify this video into a three-level topic taxonomy.

Return a JSON object with exactly these keys:
  "root": the broad field (e.g. "Science")
  "branch": the discipline within it (e.g. "Physics")
  "leaf": the specific subject (e.g. "Quantum Entanglement")

Use short, reusable, title-cased labels so that related videos share the same root and branch.

TITLE: {title}

TRANSCRIPT:
{transcript}"#,
        title = title,
        transcript = transcript,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_prompt_contains_title_and_excerpt() {
        let prompt = build_prompt("Black Holes", "Event horizons...");
        assert!(prompt.contains("TITLE: Black Holes"));
        assert!(prompt.contains("Event horizons..."));
    }
}
