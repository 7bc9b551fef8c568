//! HTTP endpoints outside the websocket protocol.

use axum::Json;
use serde::Serialize;

/// Static liveness payload
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check.
///
/// GET / and GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "fichy server running",
    })
}
