use axum::Json;

use crate::constants::{API_VERSION, HEALTH_MESSAGE};
use crate::models::HealthResponse;

/// Liveness probe (`GET /api/health`). Requires no auth and touches no store.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: HEALTH_MESSAGE.to_string(),
        version: API_VERSION.to_string(),
    })
}
