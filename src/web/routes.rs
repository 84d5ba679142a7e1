//! # Web API Route Definitions

use crate::web::handlers;
use crate::web::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Trigger routes. Each accepts `{"userName": ...}` and starts one job:
/// - `POST /` - compute stage
/// - `POST /workspacesdeploy` - desktop stage
/// - `POST /directorydeploy` - directory stage (body ignored)
pub fn trigger_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::deploy::deploy_compute))
        .route("/workspacesdeploy", post(handlers::deploy::deploy_desktop))
        .route("/directorydeploy", post(handlers::deploy::deploy_directory))
}

/// Job status, cancellation and teardown.
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/jobs/:job_id",
            get(handlers::jobs::get_job).delete(handlers::jobs::cancel_job),
        )
        .route("/jobs/:job_id/teardown", post(handlers::jobs::teardown_job))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::basic_health))
}
