//! Health check handlers
//!
//! Liveness and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// Probe response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" for liveness, "ready" for readiness
    #[schema(example = "ok")]
    pub status: &'static str,
}

/// GET /healthz - Liveness probe
///
/// Always 200 while the process is serving requests.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse)
    )
)]
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /readyz - Readiness probe
///
/// 200 when the asset store answers and the media root accepts writes.
#[utoipa::path(
    get,
    path = "/readyz",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to accept traffic", body = HealthResponse),
        (status = 503, description = "A dependency is unavailable")
    )
)]
pub async fn readyz(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state
        .store
        .ping()
        .await
        .map_err(|e| ApiError::not_ready(format!("asset store: {}", e)))?;

    state
        .media
        .is_writable()
        .await
        .map_err(|e| ApiError::not_ready(format!("media root: {}", e)))?;

    Ok(Json(HealthResponse { status: "ready" }))
}
