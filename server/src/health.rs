//! Health check endpoints.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Liveness check: 200 whenever the process is serving.
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
}

/// Readiness check: the in-memory stores need no warm-up, so readiness
/// follows liveness. A deployment with durable stores checks them here.
pub async fn readiness_check() -> (StatusCode, Json<ReadinessResponse>) {
    (StatusCode::OK, Json(ReadinessResponse { ready: true }))
}
