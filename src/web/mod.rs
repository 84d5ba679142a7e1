//! # Web API Module
//!
//! Axum HTTP surface of the trigger gateway.
//!
//! - [`routes`] - route definitions
//! - [`handlers`] - trigger, job status and health handlers
//! - [`state`] - shared application state
//! - [`response_types`] - API error type and its JSON rendering

pub mod handlers;
pub mod response_types;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

/// Build the router with tracing and request timeout layers.
pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = app_state.config.web.request_timeout();

    Router::new()
        .merge(routes::trigger_routes())
        .merge(routes::job_routes())
        .merge(routes::health_routes())
        .layer(tower_http::timeout::TimeoutLayer::new(request_timeout))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}
