//! Hierarchical Librarian
//!
//! Turns taxonomy labels into a tree of SYSTEM collections and answers
//! "which collection is this video closest to".
//!
//! Filing runs under one in-process lock and one transaction: find-or-create
//! root, find-or-create branch, move the video out of any other branch, link,
//! recompute the affected centroids. The
//! storage layer's conflict-safe insert keeps the tree duplicate-free even if
//! another process files concurrently; the lock keeps the centroid
//! read-modify-write consistent with the link inside this process.

use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::centroid::{cosine_similarity, mean};
use crate::db::{collections, videos};
use crate::error::IngestError;
use crate::models::{Collection, CollectionMatch, CollectionOrigin, FilingResult, Taxonomy};
use crate::utils::db_retry::retry_on_lock;

pub struct HierarchicalLibrarian {
    db: SqlitePool,
    filing_lock: Mutex<()>,
    max_lock_wait_ms: u64,
}

impl HierarchicalLibrarian {
    pub fn new(db: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            filing_lock: Mutex::new(()),
            max_lock_wait_ms,
        }
    }

    /// File a video under root → branch and refresh the branch centroid
    pub async fn organize_by_taxonomy(
        &self,
        video_id: Uuid,
        taxonomy: &Taxonomy,
    ) -> Result<FilingResult, IngestError> {
        let taxonomy = taxonomy
            .normalized()
            .ok_or_else(|| IngestError::FilingFailed("taxonomy label was empty".to_string()))?;

        let _guard = self.filing_lock.lock().await;

        let result = retry_on_lock("organize_by_taxonomy", self.max_lock_wait_ms, || {
            self.file_once(video_id, &taxonomy)
        })
        .await
        .map_err(|e| match e {
            IngestError::FilingFailed(_) | IngestError::NotFound(_) => e,
            other => IngestError::FilingFailed(other.to_string()),
        })?;

        tracing::info!(
            video_id = %video_id,
            root = %taxonomy.root,
            branch = %taxonomy.branch,
            newly_linked = result.newly_linked,
            centroid_members = result.centroid_members,
            "Video filed"
        );

        Ok(result)
    }

    async fn file_once(&self, video_id: Uuid, taxonomy: &Taxonomy) -> Result<FilingResult, IngestError> {
        let mut tx = self.db.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM videos WHERE id = ?")
            .bind(video_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(IngestError::NotFound(format!("video {}", video_id)));
        }

        let root = collections::find_or_create_system(
            &mut tx,
            &taxonomy.root,
            None,
            &format!("Videos about {}", taxonomy.root),
        )
        .await?;

        let branch = collections::find_or_create_system(
            &mut tx,
            &taxonomy.branch,
            Some(root.id),
            &format!("{} within {}", taxonomy.branch, taxonomy.root),
        )
        .await?;

        // A video carries one taxonomy label, so it lives in exactly one branch
        let mut unlinked_from = Vec::new();
        for previous in collections::system_branches_of(&mut tx, video_id).await? {
            if previous == branch.id {
                continue;
            }
            collections::unlink_video(&mut tx, previous, video_id).await?;
            recompute_centroid(&mut tx, previous).await?;
            unlinked_from.push(previous);
        }

        let newly_linked = collections::link_video(&mut tx, branch.id, video_id).await?;
        let centroid_members = recompute_centroid(&mut tx, branch.id).await?;

        tx.commit().await?;

        if !unlinked_from.is_empty() {
            tracing::info!(
                video_id = %video_id,
                previous = ?unlinked_from,
                "Video moved out of earlier branches"
            );
        }

        Ok(FilingResult {
            root_id: root.id,
            branch_id: branch.id,
            newly_linked,
            centroid_members,
            unlinked_from,
        })
    }

    /// Recompute the centroid of every SYSTEM branch holding the video
    ///
    /// Used when a video is re-ingested without a vector: it is not refiled,
    /// but the branches it already sits in must stop counting its old vector.
    /// Returns the number of branches refreshed.
    pub async fn refresh_member_centroids(&self, video_id: Uuid) -> Result<usize, IngestError> {
        let _guard = self.filing_lock.lock().await;

        retry_on_lock("refresh_member_centroids", self.max_lock_wait_ms, || {
            self.refresh_once(video_id)
        })
        .await
        .map_err(|e| match e {
            IngestError::FilingFailed(_) => e,
            other => IngestError::FilingFailed(other.to_string()),
        })
    }

    async fn refresh_once(&self, video_id: Uuid) -> Result<usize, IngestError> {
        let mut tx = self.db.begin().await?;

        let branches = collections::system_branches_of(&mut tx, video_id).await?;
        for branch_id in &branches {
            recompute_centroid(&mut tx, *branch_id).await?;
        }

        tx.commit().await?;
        Ok(branches.len())
    }

    /// Closest SYSTEM collection strictly above `threshold`
    ///
    /// `None` when the video has no vector or nothing qualifies.
    pub async fn find_relevant_collections(
        &self,
        video_id: Uuid,
        threshold: f32,
    ) -> Result<Option<CollectionMatch>, IngestError> {
        let Some(vector) = self.video_vector(video_id).await? else {
            return Ok(None);
        };

        let candidates = collections::list_with_centroid(&self.db, CollectionOrigin::System).await?;
        Ok(best_match(&vector, candidates, threshold))
    }

    /// Closest USER collection (guide) strictly above `threshold`
    pub async fn match_guide(
        &self,
        vector: &[f32],
        threshold: f32,
    ) -> Result<Option<CollectionMatch>, IngestError> {
        let candidates = collections::list_with_centroid(&self.db, CollectionOrigin::User).await?;
        Ok(best_match(vector, candidates, threshold))
    }

    /// Add a video to a guide. Guide centroids are curated and left untouched.
    pub async fn link_to_guide(&self, collection_id: Uuid, video_id: Uuid) -> Result<bool, IngestError> {
        let _guard = self.filing_lock.lock().await;

        retry_on_lock("link_to_guide", self.max_lock_wait_ms, move || async move {
            let mut conn = self.db.acquire().await?;
            Ok::<bool, IngestError>(collections::link_video(&mut conn, collection_id, video_id).await?)
        })
        .await
    }

    async fn video_vector(&self, video_id: Uuid) -> Result<Option<Vec<f32>>, IngestError> {
        videos::load_embedding(&self.db, video_id)
            .await
            .map_err(|e| match e {
                vshelf_common::Error::NotFound(what) => IngestError::NotFound(what),
                other => IngestError::Common(other),
            })
    }
}

/// Set a collection's centroid to the mean of its embedded members (NULL when none)
async fn recompute_centroid(conn: &mut SqliteConnection, collection_id: Uuid) -> Result<usize, IngestError> {
    let members = collections::member_embeddings(conn, collection_id).await?;
    let centroid = mean(&members);
    collections::set_centroid(conn, collection_id, centroid.as_deref()).await?;
    Ok(members.len())
}

/// Highest-similarity candidate strictly above `threshold`; earlier candidates win ties
pub fn best_match(vector: &[f32], candidates: Vec<Collection>, threshold: f32) -> Option<CollectionMatch> {
    let mut best: Option<CollectionMatch> = None;

    for collection in candidates {
        let Some(centroid) = collection.centroid.as_deref() else {
            continue;
        };
        let Some(similarity) = cosine_similarity(vector, centroid) else {
            continue;
        };
        if similarity <= threshold {
            continue;
        }
        if best.as_ref().map_or(true, |b| similarity > b.similarity) {
            best = Some(CollectionMatch {
                collection,
                similarity,
            });
        }
    }

    best
}
