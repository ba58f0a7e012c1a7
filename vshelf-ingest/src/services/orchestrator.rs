//! Ingestion Orchestrator
//!
//! Runs one video through the pipeline:
//!
//! 1. Load transcript (absent → skip, storage untouched)
//! 2. Recycle the video row, status PROCESSING
//! 3. Segment
//! 4. Embed segments concurrently; a failed segment keeps no vector
//! 5. Aggregate the video vector, classify
//! 6. Persist segments + vector + taxonomy + COMPLETED in one transaction
//! 7. Any failure in 2-6 marks the video FAILED
//! 8. Run post-ingestion hooks
//!
//! Re-ingesting any video (COMPLETED or FAILED) repeats the whole run.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use super::centroid::{aggregate, segment_weight, WeightedVector};
use super::classifier::TaxonomyClassifier;
use super::embedder::{compose_segment_input, EmbeddingGenerator};
use super::hooks::{run_hooks, HookReport, IngestedVideo, PostIngestHook};
use super::model_caller::CallTrace;
use super::segmenter::{estimate_duration_secs, TranscriptSegmenter};
use super::transcript::TranscriptProvider;
use crate::config::PipelineConfig;
use crate::db::{segments, videos};
use crate::error::IngestError;
use crate::models::{DraftSegment, EmbeddedSegment, SourceVideo, Taxonomy};

/// Result of one `ingest` call
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// No transcript available; nothing was written
    Skipped { source_id: String },
    Completed(IngestReport),
}

/// Summary of a completed ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub video_id: Uuid,
    pub source_id: String,
    pub segments: usize,
    pub segments_with_vector: usize,
    pub segments_dropped: usize,
    pub has_vector: bool,
    pub taxonomy: Taxonomy,
    pub hooks: Vec<HookReport>,
    /// Segmentation, classification, then embeddings in segment order (successes only)
    #[serde(skip)]
    pub traces: Vec<CallTrace>,
}

/// Everything the persistence step writes
struct RunResult {
    segments: Vec<EmbeddedSegment>,
    segments_dropped: usize,
    video_vector: Option<Vec<f32>>,
    taxonomy: Taxonomy,
    traces: Vec<CallTrace>,
}

pub struct IngestionOrchestrator {
    db: SqlitePool,
    provider: Arc<dyn TranscriptProvider>,
    segmenter: TranscriptSegmenter,
    embedder: EmbeddingGenerator,
    classifier: TaxonomyClassifier,
    hooks: Vec<Arc<dyn PostIngestHook>>,
    config: PipelineConfig,
}

impl IngestionOrchestrator {
    pub fn new(
        db: SqlitePool,
        provider: Arc<dyn TranscriptProvider>,
        segmenter: TranscriptSegmenter,
        embedder: EmbeddingGenerator,
        classifier: TaxonomyClassifier,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            provider,
            segmenter,
            embedder,
            classifier,
            hooks: Vec::new(),
            config,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn PostIngestHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn provider(&self) -> &Arc<dyn TranscriptProvider> {
        &self.provider
    }

    pub async fn ingest(&self, source_id: &str) -> Result<IngestOutcome, IngestError> {
        let Some(source) = self.provider.fetch(source_id).await? else {
            tracing::info!(source_id = %source_id, "No transcript available, skipping");
            return Ok(IngestOutcome::Skipped {
                source_id: source_id.to_string(),
            });
        };

        let video_id = videos::recycle_for_ingest(&self.db, &source).await?;
        tracing::info!(source_id = %source_id, video_id = %video_id, "Ingestion started");

        let run = match self.process(video_id, &source).await {
            Ok(run) => run,
            Err(e) => {
                self.mark_failed(video_id, &e).await;
                return Err(e);
            }
        };

        let ingested = IngestedVideo {
            video_id,
            source_id: source.source_id.clone(),
            taxonomy: run.taxonomy.clone(),
            embedding: run.video_vector.clone(),
        };
        let hooks = run_hooks(&self.hooks, &ingested).await;

        let segments_with_vector = run.segments.iter().filter(|s| s.embedding.is_some()).count();
        let report = IngestReport {
            video_id,
            source_id: source.source_id,
            segments: run.segments.len(),
            segments_with_vector,
            segments_dropped: run.segments_dropped,
            has_vector: run.video_vector.is_some(),
            taxonomy: run.taxonomy,
            hooks,
            traces: run.traces,
        };

        tracing::info!(
            video_id = %video_id,
            segments = report.segments,
            segments_with_vector = report.segments_with_vector,
            has_vector = report.has_vector,
            "Ingestion completed"
        );

        Ok(IngestOutcome::Completed(report))
    }

    /// Steps 3-6
    async fn process(&self, video_id: Uuid, source: &SourceVideo) -> Result<RunResult, IngestError> {
        let estimated = estimate_duration_secs(&source.transcript, self.config.chars_per_second);
        let segmentation = self.segmenter.segment(&source.transcript, estimated).await?;
        let mut traces = vec![segmentation.trace];

        let (embedded, embed_traces) = self.embed_segments(source, segmentation.segments).await;

        let weighted: Vec<WeightedVector> = embedded
            .iter()
            .filter_map(|segment| {
                segment.embedding.as_ref().map(|vector| WeightedVector {
                    vector: vector.clone(),
                    weight: segment_weight(
                        segment.draft.start_time,
                        segment.draft.end_time,
                        self.config.min_segment_weight_secs,
                    ),
                })
            })
            .collect();
        let video_vector = aggregate(&weighted);

        let (taxonomy, classify_trace) = self
            .classifier
            .classify(&source.transcript, &source.title)
            .await?;
        traces.push(classify_trace);
        traces.extend(embed_traces);

        self.persist(video_id, &embedded, video_vector.as_deref(), &taxonomy)
            .await?;

        Ok(RunResult {
            segments: embedded,
            segments_dropped: segmentation.dropped,
            video_vector,
            taxonomy,
            traces,
        })
    }

    /// Embed every segment with bounded concurrency, keeping segment order
    async fn embed_segments(
        &self,
        source: &SourceVideo,
        drafts: Vec<DraftSegment>,
    ) -> (Vec<EmbeddedSegment>, Vec<CallTrace>) {
        let summary = source.description.as_deref();
        let source_id = source.source_id.as_str();
        let inputs: Vec<(usize, String)> = drafts
            .iter()
            .map(|draft| compose_segment_input(&source.title, summary, draft))
            .enumerate()
            .collect();

        let mut results: Vec<(usize, Option<Vec<f32>>, Option<CallTrace>)> =
            stream::iter(inputs)
                .map(|(index, input)| async move {
                    match self.embedder.embed(&input).await {
                        Ok(traced) => (index, Some(traced.value), Some(traced.trace)),
                        Err(e) => {
                            tracing::warn!(
                                source_id = %source_id,
                                segment = index,
                                error = %e,
                                "Segment embedding failed, keeping segment without vector"
                            );
                            (index, None, None)
                        }
                    }
                })
                .buffer_unordered(self.config.embed_concurrency.max(1))
                .collect()
                .await;

        results.sort_by_key(|(index, _, _)| *index);

        let mut traces = Vec::new();
        let embedded = drafts
            .into_iter()
            .zip(results)
            .map(|(draft, (_, embedding, trace))| {
                traces.extend(trace);
                EmbeddedSegment { draft, embedding }
            })
            .collect();

        (embedded, traces)
    }

    /// Step 6: one transaction, all or nothing
    async fn persist(
        &self,
        video_id: Uuid,
        segments: &[EmbeddedSegment],
        video_vector: Option<&[f32]>,
        taxonomy: &Taxonomy,
    ) -> Result<(), IngestError> {
        let persist_failed = |e: &dyn std::fmt::Display| IngestError::PersistenceFailed(e.to_string());

        let mut tx = self.db.begin().await.map_err(|e| persist_failed(&e))?;

        segments::replace_for_video(&mut tx, video_id, segments)
            .await
            .map_err(|e| persist_failed(&e))?;
        videos::mark_completed(&mut tx, video_id, video_vector, taxonomy, vshelf_common::time::now())
            .await
            .map_err(|e| persist_failed(&e))?;

        tx.commit().await.map_err(|e| persist_failed(&e))?;
        Ok(())
    }

    async fn mark_failed(&self, video_id: Uuid, error: &IngestError) {
        tracing::error!(
            video_id = %video_id,
            code = error.code(),
            error = %error,
            "Ingestion failed"
        );

        if let Err(e) = videos::mark_failed(&self.db, video_id, vshelf_common::time::now()).await {
            tracing::error!(video_id = %video_id, error = %e, "Could not mark video FAILED");
        }
    }
}
