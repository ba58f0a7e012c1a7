//! POST /ingest/:source_id

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::services::IngestOutcome;
use crate::AppState;

/// Run the pipeline for one source id and return the outcome.
///
/// Skipped (no transcript) is a 200 with `"status": "skipped"`; pipeline
/// failures map through `ApiError`.
pub async fn ingest_video(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> ApiResult<Json<IngestOutcome>> {
    let source_id = source_id.trim().to_string();
    if source_id.is_empty() {
        return Err(ApiError::BadRequest("source id is empty".to_string()));
    }

    match state.orchestrator.ingest(&source_id).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            *state.last_error.write().await = Some(format!("{}: {}", source_id, e));
            Err(e.into())
        }
    }
}

pub fn ingest_routes() -> Router<AppState> {
    Router::new().route("/ingest/:source_id", post(ingest_video))
}
