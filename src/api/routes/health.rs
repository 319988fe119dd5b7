//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe.
/// Ready once the upload directory is reachable.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match check_storage_health(&state).await {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with component details. Does not trigger an index
/// build; reports what is published.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let storage_ok = check_storage_health(&state).await;

    let recording = state.store.current().await;
    let published = state.indexes.published().await;
    let failure = state.indexes.last_failure().await;

    let index_status = match (&recording, &failure) {
        (_, Some(_)) => "error",
        (None, None) => "none",
        (Some(_), None) => "ok",
    };

    let overall_status = match (storage_ok, index_status != "error") {
        (true, true) => "healthy",
        (true, false) | (false, true) => "degraded",
        (false, false) => "unhealthy",
    };

    Json(HealthResponse {
        status: overall_status.to_string(),
        storage: if storage_ok { "ok" } else { "error" }.to_string(),
        index: index_status.to_string(),
        recording,
        stats: published.map(|snapshot| snapshot.index.stats()),
        last_error: failure.map(|f| f.message),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// The upload directory exists and is a directory
async fn check_storage_health(state: &AppState) -> bool {
    tokio::fs::metadata(state.store.dir())
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}
