//! GET /videos/:video_id/relevant-collections

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::CollectionMatch;
use crate::AppState;

const DEFAULT_THRESHOLD: f32 = 0.0;

#[derive(Debug, Deserialize)]
pub struct RelevantQuery {
    pub threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct RelevantResponse {
    pub video_id: Uuid,
    pub threshold: f32,
    /// `null` when the video has no vector or nothing clears the threshold
    #[serde(rename = "match")]
    pub best: Option<CollectionMatch>,
}

pub async fn relevant_collections(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(query): Query<RelevantQuery>,
) -> ApiResult<Json<RelevantResponse>> {
    let video_id = Uuid::parse_str(&video_id)
        .map_err(|_| ApiError::BadRequest(format!("invalid video id: {}", video_id)))?;

    let threshold = query.threshold.unwrap_or(DEFAULT_THRESHOLD);
    if !threshold.is_finite() {
        return Err(ApiError::BadRequest("threshold must be a finite number".to_string()));
    }

    let best = state
        .librarian
        .find_relevant_collections(video_id, threshold)
        .await?;

    Ok(Json(RelevantResponse {
        video_id,
        threshold,
        best,
    }))
}

pub fn collection_routes() -> Router<AppState> {
    Router::new().route(
        "/videos/:video_id/relevant-collections",
        get(relevant_collections),
    )
}
