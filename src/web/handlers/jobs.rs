//! # Job Handlers
//!
//! Status polling, cancellation and explicit teardown for accepted jobs.

use crate::orchestration::{JobView, TeardownReport};
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: Uuid,
    /// `false` when the job had already finished.
    pub cancellation_requested: bool,
}

fn parse_job_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_uuid(raw))
}

/// `GET /jobs/:job_id`
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobView>> {
    let job_id = parse_job_id(&job_id)?;
    Ok(Json(state.gateway.status(job_id)?))
}

/// `DELETE /jobs/:job_id`
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let job_id = parse_job_id(&job_id)?;
    let cancellation_requested = state.gateway.cancel(job_id)?;
    Ok(Json(CancelResponse {
        job_id,
        cancellation_requested,
    }))
}

/// `POST /jobs/:job_id/teardown`
///
/// Answers `502` when any stack could not be destroyed; the report lists which.
pub async fn teardown_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<TeardownReport>)> {
    let job_id = parse_job_id(&job_id)?;
    let report = state.gateway.teardown(job_id).await?;
    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(report)))
}
