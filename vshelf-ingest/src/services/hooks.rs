//! Post-ingestion hooks
//!
//! Hooks run after a video's result is committed. They are independent:
//! one failing (or skipping) never affects another, and none can undo the
//! COMPLETED status.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::librarian::HierarchicalLibrarian;
use crate::error::IngestError;
use crate::models::Taxonomy;

/// What a hook sees of a freshly ingested video
#[derive(Debug, Clone)]
pub struct IngestedVideo {
    pub video_id: Uuid,
    pub source_id: String,
    pub taxonomy: Taxonomy,
    pub embedding: Option<Vec<f32>>,
}

/// Result of one hook
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum HookOutcome {
    Applied(String),
    Skipped(String),
    Failed(String),
}

/// Named hook result, as reported by the orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct HookReport {
    pub hook: String,
    #[serde(flatten)]
    pub outcome: HookOutcome,
}

#[async_trait]
pub trait PostIngestHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_ingested(&self, video: &IngestedVideo) -> Result<HookOutcome, IngestError>;
}

/// Files the video into the SYSTEM taxonomy tree
pub struct FilingHook {
    librarian: Arc<HierarchicalLibrarian>,
}

impl FilingHook {
    pub fn new(librarian: Arc<HierarchicalLibrarian>) -> Self {
        Self { librarian }
    }
}

#[async_trait]
impl PostIngestHook for FilingHook {
    fn name(&self) -> &'static str {
        "filing"
    }

    async fn on_ingested(&self, video: &IngestedVideo) -> Result<HookOutcome, IngestError> {
        if video.embedding.is_none() {
            let refreshed = self.librarian.refresh_member_centroids(video.video_id).await?;
            return Ok(HookOutcome::Skipped(format!(
                "video has no vector; not filed ({} existing branches refreshed)",
                refreshed
            )));
        }

        let result = self
            .librarian
            .organize_by_taxonomy(video.video_id, &video.taxonomy)
            .await?;

        Ok(HookOutcome::Applied(format!(
            "filed under {} / {} ({} members with vectors)",
            video.taxonomy.root, video.taxonomy.branch, result.centroid_members
        )))
    }
}

/// Links the video to the closest curated guide
pub struct GuideHook {
    librarian: Arc<HierarchicalLibrarian>,
    threshold: f32,
}

impl GuideHook {
    pub fn new(librarian: Arc<HierarchicalLibrarian>, threshold: f32) -> Self {
        Self {
            librarian,
            threshold,
        }
    }
}

#[async_trait]
impl PostIngestHook for GuideHook {
    fn name(&self) -> &'static str {
        "guide_matching"
    }

    async fn on_ingested(&self, video: &IngestedVideo) -> Result<HookOutcome, IngestError> {
        let Some(vector) = video.embedding.as_deref() else {
            return Ok(HookOutcome::Skipped("video has no vector".to_string()));
        };

        let Some(found) = self.librarian.match_guide(vector, self.threshold).await? else {
            return Ok(HookOutcome::Skipped(format!(
                "no guide above similarity {}",
                self.threshold
            )));
        };

        self.librarian
            .link_to_guide(found.collection.id, video.video_id)
            .await?;

        Ok(HookOutcome::Applied(format!(
            "matched guide '{}' (similarity {:.3})",
            found.collection.name, found.similarity
        )))
    }
}

/// Run every hook; failures are logged and reported, never propagated
pub async fn run_hooks(hooks: &[Arc<dyn PostIngestHook>], video: &IngestedVideo) -> Vec<HookReport> {
    let runs = hooks.iter().map(|hook| async move {
        let outcome = match hook.on_ingested(video).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let failure = match e {
                    IngestError::FilingFailed(msg) => msg,
                    other => other.to_string(),
                };
                tracing::error!(
                    video_id = %video.video_id,
                    hook = hook.name(),
                    error = %failure,
                    "Post-ingestion hook failed"
                );
                HookOutcome::Failed(failure)
            }
        };

        if let HookOutcome::Skipped(reason) = &outcome {
            tracing::info!(video_id = %video.video_id, hook = hook.name(), reason = %reason, "Hook skipped");
        }

        HookReport {
            hook: hook.name().to_string(),
            outcome,
        }
    });

    futures::future::join_all(runs).await
}
