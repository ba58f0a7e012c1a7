//! Runtime configuration for vshelf-ingest
//!
//! Converts the TOML sections from `vshelf_common::config` into the settings
//! each service consumes. Credentials are resolved separately
//! (`vshelf_common::config::resolve_api_keys`) and passed in.

use std::time::Duration;
use vshelf_common::config::{GenerationConfig, IngestSettings, TomlConfig};

use crate::error::IngestError;

/// Settings for the resilient model caller
#[derive(Debug, Clone)]
pub struct CallerConfig {
    pub credentials: Vec<String>,
    pub text_models: Vec<String>,
    pub embedding_models: Vec<String>,
    pub max_attempts: u32,
    pub rate_limit_backoff: Duration,
    pub error_backoff: Duration,
    pub requests_per_second: u32,
}

impl CallerConfig {
    pub fn from_generation(generation: &GenerationConfig, credentials: Vec<String>) -> Self {
        Self {
            credentials,
            text_models: generation.text_models.clone(),
            embedding_models: generation.embedding_models.clone(),
            max_attempts: generation.max_attempts,
            rate_limit_backoff: Duration::from_millis(generation.rate_limit_backoff_ms),
            error_backoff: Duration::from_millis(generation.error_backoff_ms),
            requests_per_second: generation.requests_per_second,
        }
    }

    /// Reject configurations the caller cannot run with
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.credentials.is_empty() {
            return Err(IngestError::Config("no API credentials configured".to_string()));
        }
        if self.text_models.is_empty() {
            return Err(IngestError::Config("no text models configured".to_string()));
        }
        if self.embedding_models.is_empty() {
            return Err(IngestError::Config("no embedding models configured".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(IngestError::Config("max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Settings for segmentation, embedding, aggregation and hooks
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub min_segment_weight_secs: f64,
    pub chars_per_second: f64,
    pub embed_concurrency: usize,
    pub classifier_transcript_chars: usize,
    pub guide_threshold: f32,
    /// Expected embedding length; 0 accepts any
    pub embedding_dimension: usize,
    /// Upper bound on SQLite lock retries during filing
    pub max_lock_wait_ms: u64,
}

impl PipelineConfig {
    pub fn from_settings(ingest: &IngestSettings, generation: &GenerationConfig) -> Self {
        Self {
            min_segment_weight_secs: ingest.min_segment_weight_secs,
            chars_per_second: ingest.chars_per_second,
            embed_concurrency: ingest.embed_concurrency.max(1),
            classifier_transcript_chars: ingest.classifier_transcript_chars,
            guide_threshold: ingest.guide_threshold,
            embedding_dimension: generation.embedding_dimension,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn from_toml(config: &TomlConfig) -> Self {
        Self::from_settings(&config.ingest, &config.generation)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(&IngestSettings::default(), &GenerationConfig::default())
    }
}

const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_config_from_defaults() {
        let config = CallerConfig::from_generation(
            &GenerationConfig::default(),
            vec!["key-a".to_string()],
        );
        assert_eq!(config.max_attempts, 6);
        assert_eq!(config.rate_limit_backoff, Duration::from_secs(2));
        assert_eq!(config.error_backoff, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_caller_config_rejects_empty_pools() {
        let mut config = CallerConfig::from_generation(&GenerationConfig::default(), vec![]);
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));

        config.credentials = vec!["key".to_string()];
        config.embedding_models.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.min_segment_weight_secs, 10.0);
        assert_eq!(config.chars_per_second, 15.0);
        assert_eq!(config.embed_concurrency, 4);
        assert_eq!(config.classifier_transcript_chars, 30_000);
        assert_eq!(config.embedding_dimension, 768);
    }
}
