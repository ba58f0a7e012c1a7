//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" after a failed ingestion or when the database is unreachable
    pub status: String,
    pub module: String,
    pub version: String,
    /// Short git commit the binary was built from
    pub git_hash: String,
    pub build_timestamp: String,
    pub uptime_seconds: u64,
    /// "ok" or "unavailable"
    pub database: String,
    /// Most recent ingestion failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let database_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    if !database_ok {
        tracing::warn!("Health check could not reach the database");
    }

    let last_error = state.last_error.read().await.clone();
    let status = if last_error.is_some() || !database_ok {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "vshelf-ingest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("VSHELF_GIT_HASH").to_string(),
        build_timestamp: env!("VSHELF_BUILD_TIMESTAMP").to_string(),
        uptime_seconds,
        database: if database_ok { "ok" } else { "unavailable" }.to_string(),
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
