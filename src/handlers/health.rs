//! Health check endpoint handler.

use axum::Json;
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Handler for the /health endpoint. Never touches the database.
#[instrument]
pub async fn health_handler() -> Json<HealthResponse> {
    debug!("Processing /health request");
    Json(HealthResponse { status: "ok" })
}
