//! Bulk backfill driver tests

mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use helpers::{build_services, create_test_db, seed_source, ScriptedBackend};
use vshelf_ingest::db::videos;
use vshelf_ingest::models::VideoStatus;
use vshelf_ingest::services::{Backfill, BackfillSummary};

#[tokio::test]
async fn test_backfill_counts_each_outcome_and_continues() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "ok", "Good Video", Some("A perfectly normal transcript.")).await;
    seed_source(&pool, "empty", "No Captions", None).await;
    seed_source(&pool, "bad", "Broken Video", Some("This transcript is POISON for the model.")).await;

    let backend = Arc::new(ScriptedBackend::new());
    backend.poison_prompts_containing("POISON");
    let services = build_services(&pool, backend);

    let summary = Backfill::new(services.orchestrator, Duration::ZERO)
        .run()
        .await
        .unwrap();

    assert_eq!(
        summary,
        BackfillSummary {
            completed: 1,
            skipped: 1,
            failed: 1,
        }
    );
    assert_eq!(summary.total(), 3);

    let ok = videos::load_by_source_id(&pool, "ok").await.unwrap().unwrap();
    assert_eq!(ok.status, VideoStatus::Completed);
    let bad = videos::load_by_source_id(&pool, "bad").await.unwrap().unwrap();
    assert_eq!(bad.status, VideoStatus::Failed);
    assert!(videos::load_by_source_id(&pool, "empty").await.unwrap().is_none());
}

#[tokio::test]
async fn test_backfill_sleeps_between_videos() {
    let (_tmp, pool) = create_test_db().await;
    for id in ["a", "b", "c"] {
        seed_source(&pool, id, id, None).await;
    }
    let services = build_services(&pool, Arc::new(ScriptedBackend::new()));

    let started = Instant::now();
    let summary = Backfill::new(services.orchestrator, Duration::from_millis(50))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.skipped, 3);
    // Two gaps between three videos
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_backfill_empty_source_table() {
    let (_tmp, pool) = create_test_db().await;
    let services = build_services(&pool, Arc::new(ScriptedBackend::new()));

    let summary = Backfill::new(services.orchestrator, Duration::from_millis(10))
        .run()
        .await
        .unwrap();
    assert_eq!(summary, BackfillSummary::default());
}
