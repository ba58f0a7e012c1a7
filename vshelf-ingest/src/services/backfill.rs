//! Bulk backfill driver
//!
//! Walks every known source id sequentially, sleeping a fixed delay between
//! videos to stay under provider quotas. One video failing never stops the run.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::orchestrator::{IngestOutcome, IngestionOrchestrator};
use crate::error::IngestError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BackfillSummary {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

pub struct Backfill {
    orchestrator: Arc<IngestionOrchestrator>,
    delay: Duration,
}

impl Backfill {
    pub fn new(orchestrator: Arc<IngestionOrchestrator>, delay: Duration) -> Self {
        Self {
            orchestrator,
            delay,
        }
    }

    pub async fn run(&self) -> Result<BackfillSummary, IngestError> {
        let source_ids = self.orchestrator.provider().list_source_ids().await?;
        let total = source_ids.len();
        tracing::info!(total, delay_ms = self.delay.as_millis() as u64, "Backfill started");

        let mut summary = BackfillSummary::default();

        for (index, source_id) in source_ids.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.orchestrator.ingest(source_id).await {
                Ok(IngestOutcome::Completed(_)) => summary.completed += 1,
                Ok(IngestOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        source_id = %source_id,
                        code = e.code(),
                        error = %e,
                        "Backfill: video failed, continuing"
                    );
                }
            }

            tracing::debug!(progress = index + 1, total, "Backfill progress");
        }

        tracing::info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Backfill finished"
        );

        Ok(summary)
    }
}
