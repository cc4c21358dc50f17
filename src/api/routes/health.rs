//! Health Routes
//!
//! - GET /health - Liveness check
//!
//! The check reports the process as up without touching storage, so a
//! saturated database never makes the service look dead.

use axum::Json;

use crate::api::dto::HealthResponse;

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
