//! Pipeline services
//!
//! Leaf-first: model caller → segmenter / embedder / classifier → centroid
//! math → orchestrator → librarian and hooks → backfill driver.

pub mod backend;
pub mod backfill;
pub mod centroid;
pub mod classifier;
pub mod embedder;
pub mod hooks;
pub mod librarian;
pub mod model_caller;
pub mod orchestrator;
pub mod response_parser;
pub mod segmenter;
pub mod transcript;

pub use backend::{GenerationBackend, HttpGenerationBackend};
pub use backfill::{Backfill, BackfillSummary};
pub use hooks::{FilingHook, GuideHook, HookOutcome, PostIngestHook};
pub use librarian::HierarchicalLibrarian;
pub use model_caller::{CallExhausted, CallTrace, ModelCaller};
pub use orchestrator::{IngestOutcome, IngestReport, IngestionOrchestrator};
pub use transcript::{SqliteTranscriptProvider, TranscriptProvider};

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::{CallerConfig, PipelineConfig};
use crate::error::IngestError;
use classifier::TaxonomyClassifier;
use embedder::EmbeddingGenerator;
use segmenter::TranscriptSegmenter;

/// Fully wired pipeline
pub struct IngestServices {
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub librarian: Arc<HierarchicalLibrarian>,
}

impl IngestServices {
    /// Wire every service around one caller and one database pool.
    ///
    /// Hooks: filing first, then guide matching.
    pub fn build(
        db: SqlitePool,
        caller_config: CallerConfig,
        pipeline: PipelineConfig,
        backend: Arc<dyn GenerationBackend>,
        provider: Arc<dyn TranscriptProvider>,
    ) -> Result<Self, IngestError> {
        let caller = Arc::new(ModelCaller::new(caller_config, backend)?);
        let librarian = Arc::new(HierarchicalLibrarian::new(
            db.clone(),
            pipeline.max_lock_wait_ms,
        ));

        let orchestrator = IngestionOrchestrator::new(
            db,
            provider,
            TranscriptSegmenter::new(Arc::clone(&caller)),
            EmbeddingGenerator::new(Arc::clone(&caller), pipeline.embedding_dimension),
            TaxonomyClassifier::new(Arc::clone(&caller), pipeline.classifier_transcript_chars),
            pipeline.clone(),
        )
        .with_hook(Arc::new(FilingHook::new(Arc::clone(&librarian))))
        .with_hook(Arc::new(GuideHook::new(
            Arc::clone(&librarian),
            pipeline.guide_threshold,
        )));

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            librarian,
        })
    }
}
