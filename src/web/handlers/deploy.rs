//! # Trigger Handlers
//!
//! Each route starts one job and answers as soon as it is accepted. The response
//! never carries the stage result; poll `GET /jobs/:job_id` for that.

use crate::gateway::{JobAcceptance, TriggerRequest};
use crate::provisioning::types::Stage;
use crate::web::response_types::ApiResult;
use crate::web::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use tracing::info;

/// Compute stage: `POST /`
pub async fn deploy_compute(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<JobAcceptance>> {
    trigger(&state, Stage::Compute, &body)
}

/// Desktop stage: `POST /workspacesdeploy`
pub async fn deploy_desktop(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<JobAcceptance>> {
    trigger(&state, Stage::Desktop, &body)
}

/// Directory stage: `POST /directorydeploy`
pub async fn deploy_directory(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<JobAcceptance>> {
    trigger(&state, Stage::Directory, &body)
}

fn trigger(state: &AppState, stage: Stage, body: &[u8]) -> ApiResult<Json<JobAcceptance>> {
    let request = parse_request(body)?;
    let handle = state.gateway.trigger(stage, request)?;
    let acceptance = handle.acceptance().clone();
    info!(
        job_id = %acceptance.job_id,
        stage = %stage,
        tenant = ?acceptance.tenant,
        "Trigger accepted"
    );
    Ok(Json(acceptance))
}

/// An empty body is an empty request; the gateway decides whether that is valid.
fn parse_request(body: &[u8]) -> ApiResult<TriggerRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TriggerRequest::default());
    }
    Ok(serde_json::from_slice(body)?)
}
