//! Test Helper Utilities
//!
//! Shared fixtures for vshelf-ingest integration tests: a file-backed
//! database in a temp dir and a scripted generation backend.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use vshelf_ingest::config::{CallerConfig, PipelineConfig};
use vshelf_ingest::db::{source_videos, videos};
use vshelf_ingest::models::{SourceVideo, Taxonomy};
use vshelf_ingest::services::backend::{
    BackendError, CallTask, GenerationBackend, GenerationRequest,
};
use vshelf_ingest::services::{IngestServices, SqliteTranscriptProvider};

/// Create a temporary database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("vshelf.db");
    let pool = vshelf_common::db::init_database(&db_path).await.unwrap();
    (temp_dir, pool)
}

/// Store a source video the transcript provider will find
pub async fn seed_source(pool: &SqlitePool, source_id: &str, title: &str, transcript: Option<&str>) {
    source_videos::save_source(
        pool,
        &source_videos::SourceRow {
            source_id: source_id.to_string(),
            title: title.to_string(),
            description: Some(format!("About {}", title)),
            transcript: transcript.map(str::to_string),
        },
    )
    .await
    .unwrap();
}

/// Insert a COMPLETED video with the given vector, bypassing the pipeline
pub async fn insert_video(pool: &SqlitePool, source_id: &str, embedding: Option<Vec<f32>>) -> Uuid {
    let source = SourceVideo {
        source_id: source_id.to_string(),
        title: source_id.to_string(),
        description: None,
        transcript: "transcript".to_string(),
    };
    let id = videos::recycle_for_ingest(pool, &source).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    videos::mark_completed(
        &mut conn,
        id,
        embedding.as_deref(),
        &Taxonomy::new("Root", "Branch", "Leaf"),
        chrono::Utc::now(),
    )
    .await
    .unwrap();
    id
}

/// JSON for a segmentation response
pub fn segments_json(segments: &[(f64, f64, &str)]) -> String {
    let items: Vec<serde_json::Value> = segments
        .iter()
        .map(|(start, end, content)| {
            serde_json::json!({
                "start_time": start,
                "end_time": end,
                "content": content,
                "summary": format!("Summary of {}", content),
                "tags": ["test"],
                "key_takeaway": format!("Takeaway of {}", content),
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

pub fn taxonomy_json(root: &str, branch: &str, leaf: &str) -> String {
    serde_json::json!({ "root": root, "branch": branch, "leaf": leaf }).to_string()
}

/// Backend answering by task, with per-task failure injection
pub struct ScriptedBackend {
    segmentation: Mutex<String>,
    classification: Mutex<String>,
    /// First rule whose key occurs in the embedded text wins
    embedding_rules: Mutex<Vec<(String, Vec<f32>)>>,
    default_embedding: Vec<f32>,
    /// Embedding calls whose text contains any of these fail
    failing_embeddings: Mutex<Vec<String>>,
    failing: Mutex<HashSet<CallTask>>,
    /// Any generate call whose prompt contains this fails
    poison: Mutex<Option<String>>,
    calls: Mutex<HashMap<CallTask, usize>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            segmentation: Mutex::new(segments_json(&[
                (0.0, 45.0, "introduction"),
                (45.0, 120.0, "main argument"),
            ])),
            classification: Mutex::new(taxonomy_json("Science", "Physics", "Optics")),
            embedding_rules: Mutex::new(Vec::new()),
            default_embedding: vec![0.6, 0.8, 0.0],
            failing_embeddings: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            poison: Mutex::new(None),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_segmentation(&self, raw: impl Into<String>) {
        *self.segmentation.lock().unwrap() = raw.into();
    }

    pub fn set_classification(&self, raw: impl Into<String>) {
        *self.classification.lock().unwrap() = raw.into();
    }

    pub fn add_embedding_rule(&self, key: &str, vector: Vec<f32>) {
        self.embedding_rules
            .lock()
            .unwrap()
            .push((key.to_string(), vector));
    }

    pub fn fail_embeddings_containing(&self, key: &str) {
        self.failing_embeddings.lock().unwrap().push(key.to_string());
    }

    pub fn fail_task(&self, task: CallTask) {
        self.failing.lock().unwrap().insert(task);
    }

    pub fn heal_task(&self, task: CallTask) {
        self.failing.lock().unwrap().remove(&task);
    }

    pub fn poison_prompts_containing(&self, marker: &str) {
        *self.poison.lock().unwrap() = Some(marker.to_string());
    }

    pub fn calls(&self, task: CallTask) -> usize {
        self.calls.lock().unwrap().get(&task).copied().unwrap_or(0)
    }

    fn record(&self, task: CallTask) -> Result<(), BackendError> {
        *self.calls.lock().unwrap().entry(task).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(&task) {
            return Err(BackendError::Status {
                code: 500,
                message: format!("scripted {:?} failure", task),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        _credential: &str,
        _model: &str,
        request: &GenerationRequest,
    ) -> Result<String, BackendError> {
        self.record(request.task)?;

        if let Some(marker) = self.poison.lock().unwrap().as_deref() {
            if request.prompt.contains(marker) {
                return Err(BackendError::Status {
                    code: 500,
                    message: "poisoned prompt".to_string(),
                });
            }
        }

        match request.task {
            CallTask::Segmentation => Ok(self.segmentation.lock().unwrap().clone()),
            CallTask::Classification => Ok(self.classification.lock().unwrap().clone()),
            _ => Ok("ok".to_string()),
        }
    }

    async fn embed(&self, _credential: &str, _model: &str, text: &str) -> Result<Vec<f32>, BackendError> {
        self.record(CallTask::Embedding)?;

        if self
            .failing_embeddings
            .lock()
            .unwrap()
            .iter()
            .any(|key| text.contains(key.as_str()))
        {
            return Err(BackendError::Status {
                code: 500,
                message: "scripted embedding failure".to_string(),
            });
        }

        let rules = self.embedding_rules.lock().unwrap();
        let vector = rules
            .iter()
            .find(|(key, _)| text.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_embedding.clone());
        Ok(vector)
    }

    async fn list_models(&self, _credential: &str) -> Result<Vec<String>, BackendError> {
        Ok(vec!["models/test".to_string()])
    }
}

pub fn test_caller_config() -> CallerConfig {
    CallerConfig {
        credentials: vec!["key-a".to_string(), "key-b".to_string()],
        text_models: vec!["text-model".to_string()],
        embedding_models: vec!["embedding-model".to_string()],
        max_attempts: 2,
        rate_limit_backoff: Duration::ZERO,
        error_backoff: Duration::ZERO,
        requests_per_second: 1000,
    }
}

pub fn test_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        embedding_dimension: 0,
        ..PipelineConfig::default()
    }
}

/// Fully wired services over the scripted backend and the sqlite provider
pub fn build_services(pool: &SqlitePool, backend: Arc<ScriptedBackend>) -> IngestServices {
    IngestServices::build(
        pool.clone(),
        test_caller_config(),
        test_pipeline_config(),
        backend,
        Arc::new(SqliteTranscriptProvider::new(pool.clone())),
    )
    .unwrap()
}
