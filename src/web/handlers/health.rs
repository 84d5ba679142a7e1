//! # Health Check Handlers

use crate::web::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    parameter_store: String,
    jobs: usize,
}

/// Basic health check endpoint: GET /health
pub async fn basic_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        parameter_store: state.store.backend_name().to_string(),
        jobs: state.gateway.registry().len(),
    })
}
