//! End-to-end ingestion tests over a scripted generation backend
//!
//! Covers the run lifecycle (skip, recycle, failure marking), the
//! keep-without-vector policy, and duration weighting of the video vector.

mod helpers;

use std::sync::Arc;

use helpers::{build_services, create_test_db, seed_source, segments_json, taxonomy_json, ScriptedBackend};
use vshelf_ingest::db::{collections, segments, videos};
use vshelf_ingest::models::{CollectionOrigin, VideoStatus};
use vshelf_ingest::services::backend::CallTask;
use vshelf_ingest::services::centroid::cosine_similarity;
use vshelf_ingest::services::{HookOutcome, IngestOutcome, IngestReport};
use vshelf_ingest::IngestError;

const TRANSCRIPT: &str = "Light bends when it passes from air into water. This is refraction.";

fn completed(outcome: IngestOutcome) -> IngestReport {
    match outcome {
        IngestOutcome::Completed(report) => report,
        other => panic!("expected completed outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ingest_completes_and_files_video() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    let services = build_services(&pool, backend.clone());

    let report = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    assert_eq!(report.segments, 2);
    assert_eq!(report.segments_with_vector, 2);
    assert!(report.has_vector);
    assert_eq!(report.taxonomy.root, "Science");

    let video = videos::load_video(&pool, report.video_id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Completed);
    assert!(video.last_processed_at.is_some());
    assert!(video.embedding.is_some());
    assert_eq!(video.taxonomy.unwrap().leaf, "Optics");

    let stored = segments::load_for_video(&pool, report.video_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored[0].start_time < stored[1].start_time);
    assert!(stored.iter().all(|s| s.embedding.is_some()));

    let filing = report.hooks.iter().find(|h| h.hook == "filing").unwrap();
    assert!(matches!(filing.outcome, HookOutcome::Applied(_)));

    let roots = collections::list_children(&pool, None, CollectionOrigin::System).await.unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].name, "Science");
    let branches = collections::list_children(&pool, Some(roots[0].id), CollectionOrigin::System)
        .await
        .unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "Physics");
    assert_eq!(
        collections::list_members(&pool, branches[0].id).await.unwrap(),
        vec![report.video_id]
    );

    // Two segments embedded, one segmentation call, one classification call
    assert_eq!(backend.calls(CallTask::Embedding), 2);
    assert_eq!(backend.calls(CallTask::Segmentation), 1);
    assert_eq!(backend.calls(CallTask::Classification), 1);
}

#[tokio::test]
async fn test_reingest_recycles_video_and_replaces_segments() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    let services = build_services(&pool, backend.clone());

    let first = completed(services.orchestrator.ingest("yt-1").await.unwrap());

    backend.set_segmentation(segments_json(&[
        (0.0, 10.0, "hook"),
        (10.0, 50.0, "snell's law"),
        (50.0, 90.0, "total internal reflection"),
    ]));
    let second = completed(services.orchestrator.ingest("yt-1").await.unwrap());

    assert_eq!(first.video_id, second.video_id);
    assert_eq!(videos::count_videos(&pool).await.unwrap(), 1);

    let stored = segments::load_for_video(&pool, second.video_id).await.unwrap();
    let contents: Vec<&str> = stored.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(contents, vec!["hook", "snell's law", "total internal reflection"]);
}

#[tokio::test]
async fn test_missing_transcript_creates_no_video() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "no-transcript", "Silent Film", None).await;
    seed_source(&pool, "blank", "Blank", Some("   ")).await;
    let backend = Arc::new(ScriptedBackend::new());
    let services = build_services(&pool, backend.clone());

    for source_id in ["no-transcript", "blank", "unknown"] {
        let outcome = services.orchestrator.ingest(source_id).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Skipped { .. }));
    }

    assert_eq!(videos::count_videos(&pool).await.unwrap(), 0);
    assert_eq!(backend.calls(CallTask::Segmentation), 0);
}

#[tokio::test]
async fn test_all_embeddings_fail_keeps_segments_without_vectors() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    backend.fail_task(CallTask::Embedding);
    let services = build_services(&pool, backend.clone());

    let report = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    assert_eq!(report.segments, 2);
    assert_eq!(report.segments_with_vector, 0);
    assert!(!report.has_vector);

    let video = videos::load_video(&pool, report.video_id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Completed);
    assert!(video.embedding.is_none());

    let stored = segments::load_for_video(&pool, report.video_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|s| s.embedding.is_none() && !s.content.is_empty()));

    let filing = report.hooks.iter().find(|h| h.hook == "filing").unwrap();
    assert!(matches!(filing.outcome, HookOutcome::Skipped(_)));
    let roots = collections::list_children(&pool, None, CollectionOrigin::System).await.unwrap();
    assert!(roots.is_empty());
}

#[tokio::test]
async fn test_segmentation_failure_marks_video_failed() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    backend.fail_task(CallTask::Segmentation);
    let services = build_services(&pool, backend.clone());

    let err = services.orchestrator.ingest("yt-1").await.unwrap_err();
    assert!(matches!(err, IngestError::SegmentationFailed(_)));
    // Caller retried up to its budget
    assert_eq!(backend.calls(CallTask::Segmentation), 2);

    let video = videos::load_by_source_id(&pool, "yt-1").await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
    assert!(video.last_processed_at.is_some());
}

#[tokio::test]
async fn test_unparseable_segmentation_marks_video_failed() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    backend.set_segmentation("I could not segment this, sorry.");
    let services = build_services(&pool, backend);

    let err = services.orchestrator.ingest("yt-1").await.unwrap_err();
    assert!(matches!(err, IngestError::SegmentationFailed(_)));

    let video = videos::load_by_source_id(&pool, "yt-1").await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
}

#[tokio::test]
async fn test_classification_failure_persists_nothing() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    backend.set_classification(taxonomy_json("Science", "  ", "Optics"));
    let services = build_services(&pool, backend);

    let err = services.orchestrator.ingest("yt-1").await.unwrap_err();
    assert!(matches!(err, IngestError::ClassificationFailed(_)));

    let video = videos::load_by_source_id(&pool, "yt-1").await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Failed);
    assert!(video.embedding.is_none());
    assert_eq!(segments::count_for_video(&pool, video.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_video_recovers_on_rerun() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    backend.fail_task(CallTask::Classification);
    let services = build_services(&pool, backend.clone());

    assert!(services.orchestrator.ingest("yt-1").await.is_err());
    let failed = videos::load_by_source_id(&pool, "yt-1").await.unwrap().unwrap();
    assert_eq!(failed.status, VideoStatus::Failed);

    backend.heal_task(CallTask::Classification);
    let report = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    assert_eq!(report.video_id, failed.id);

    let video = videos::load_video(&pool, failed.id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Completed);
}

#[tokio::test]
async fn test_invalid_ranges_dropped_and_zero_segments_allowed() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    backend.set_segmentation(segments_json(&[(30.0, 30.0, "empty"), (90.0, 60.0, "backwards")]));
    let services = build_services(&pool, backend);

    let report = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    assert_eq!(report.segments, 0);
    assert_eq!(report.segments_dropped, 2);
    assert!(!report.has_vector);

    let video = videos::load_video(&pool, report.video_id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Completed);
}

#[tokio::test]
async fn test_long_segment_dominates_video_vector() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    backend.set_segmentation(segments_json(&[(0.0, 2.0, "alpha"), (2.0, 202.0, "omega")]));
    backend.add_embedding_rule("Content: alpha", vec![1.0, 0.0]);
    backend.add_embedding_rule("Content: omega", vec![0.0, 1.0]);
    let services = build_services(&pool, backend);

    let report = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    let video = videos::load_video(&pool, report.video_id).await.unwrap().unwrap();
    let vector = video.embedding.unwrap();

    assert_eq!(vector.len(), 2);
    let to_long = cosine_similarity(&vector, &[0.0, 1.0]).unwrap();
    let to_short = cosine_similarity(&vector, &[1.0, 0.0]).unwrap();
    assert!(to_long > to_short);
}

#[tokio::test]
async fn test_report_carries_call_traces() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    let services = build_services(&pool, backend);

    let report = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    // segmentation + classification + one per embedded segment
    assert_eq!(report.traces.len(), 4);
    assert_eq!(report.traces[0].task, CallTask::Segmentation);
    assert_eq!(report.traces[1].task, CallTask::Classification);
    assert!(report.traces.iter().all(|t| t.attempts() == 1));
}

#[tokio::test]
async fn test_partial_embedding_failure_keeps_segment_and_weights_the_rest() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    backend.set_segmentation(segments_json(&[
        (0.0, 30.0, "alpha"),
        (30.0, 90.0, "beta"),
        (90.0, 150.0, "gamma"),
    ]));
    backend.add_embedding_rule("Content: alpha", vec![1.0, 0.0, 0.0]);
    backend.add_embedding_rule("Content: gamma", vec![0.0, 1.0, 0.0]);
    backend.fail_embeddings_containing("Content: beta");
    let services = build_services(&pool, backend);

    let report = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    assert_eq!(report.segments, 3);
    assert_eq!(report.segments_with_vector, 2);
    assert!(report.has_vector);

    let stored = segments::load_for_video(&pool, report.video_id).await.unwrap();
    let embedded: Vec<(&str, bool)> = stored
        .iter()
        .map(|s| (s.content.as_str(), s.embedding.is_some()))
        .collect();
    assert_eq!(embedded, vec![("alpha", true), ("beta", false), ("gamma", true)]);

    // Weighted by duration over the embedded segments only: (30·a + 60·g) / 90
    let video = videos::load_video(&pool, report.video_id).await.unwrap().unwrap();
    let vector = video.embedding.unwrap();
    let expected = [1.0 / 3.0, 2.0 / 3.0, 0.0];
    assert_eq!(vector.len(), 3);
    for (actual, want) in vector.iter().zip(expected) {
        assert!((actual - want).abs() < 1e-5, "{:?} != {:?}", vector, expected);
    }

    let filing = report.hooks.iter().find(|h| h.hook == "filing").unwrap();
    assert!(matches!(filing.outcome, HookOutcome::Applied(_)));
}

#[tokio::test]
async fn test_persistence_failure_marks_failed_and_keeps_previous_segments() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    let services = build_services(&pool, backend.clone());

    let first = completed(services.orchestrator.ingest("yt-1").await.unwrap());

    sqlx::query(
        "CREATE TRIGGER reject_segment_writes BEFORE INSERT ON segments \
         BEGIN SELECT RAISE(ABORT, 'segment writes rejected'); END",
    )
    .execute(&pool)
    .await
    .unwrap();
    backend.set_segmentation(segments_json(&[(0.0, 20.0, "replacement")]));

    let err = services.orchestrator.ingest("yt-1").await.unwrap_err();
    assert!(matches!(err, IngestError::PersistenceFailed(_)));
    assert_eq!(err.code(), "PERSISTENCE_FAILED");

    let video = videos::load_video(&pool, first.video_id).await.unwrap().unwrap();
    assert_eq!(video.status, VideoStatus::Failed);

    // Rolled back: the earlier run's segments survive untouched
    let stored = segments::load_for_video(&pool, first.video_id).await.unwrap();
    let contents: Vec<&str> = stored.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(contents, vec!["introduction", "main argument"]);
}

#[tokio::test]
async fn test_reingest_without_vector_clears_branch_centroid() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    let services = build_services(&pool, backend.clone());

    let first = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    let roots = collections::list_children(&pool, None, CollectionOrigin::System).await.unwrap();
    let branch = collections::list_children(&pool, Some(roots[0].id), CollectionOrigin::System)
        .await
        .unwrap()
        .remove(0);
    assert!(branch.centroid.is_some());

    backend.fail_task(CallTask::Embedding);
    let second = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    assert!(!second.has_vector);
    let filing = second.hooks.iter().find(|h| h.hook == "filing").unwrap();
    assert!(matches!(filing.outcome, HookOutcome::Skipped(_)));

    let branch = collections::load_collection(&pool, branch.id).await.unwrap().unwrap();
    assert_eq!(
        collections::list_members(&pool, branch.id).await.unwrap(),
        vec![first.video_id]
    );
    assert!(branch.centroid.is_none(), "no member has a vector any more");
}

#[tokio::test]
async fn test_reclassified_video_moves_to_new_branch() {
    let (_tmp, pool) = create_test_db().await;
    seed_source(&pool, "yt-1", "Refraction Basics", Some(TRANSCRIPT)).await;
    let backend = Arc::new(ScriptedBackend::new());
    let services = build_services(&pool, backend.clone());

    let first = completed(services.orchestrator.ingest("yt-1").await.unwrap());
    let science = collections::list_children(&pool, None, CollectionOrigin::System)
        .await
        .unwrap()
        .remove(0);
    let physics = collections::list_children(&pool, Some(science.id), CollectionOrigin::System)
        .await
        .unwrap()
        .remove(0);

    backend.set_classification(taxonomy_json("Science", "Chemistry", "Solutions"));
    completed(services.orchestrator.ingest("yt-1").await.unwrap());

    let branches = collections::list_children(&pool, Some(science.id), CollectionOrigin::System)
        .await
        .unwrap();
    let chemistry = branches.iter().find(|b| b.name == "Chemistry").unwrap();
    assert_eq!(
        collections::list_members(&pool, chemistry.id).await.unwrap(),
        vec![first.video_id]
    );
    assert!(chemistry.centroid.is_some());

    let physics = collections::load_collection(&pool, physics.id).await.unwrap().unwrap();
    assert!(collections::list_members(&pool, physics.id).await.unwrap().is_empty());
    assert!(physics.centroid.is_none());
}
