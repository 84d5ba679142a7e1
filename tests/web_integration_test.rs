mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::TestSystem;
use serde_json::{json, Value};
use tenant_provisioner::web::{create_app, state::AppState};
use tower::ServiceExt;
use uuid::Uuid;

fn router(harness: &TestSystem) -> axum::Router {
    create_app(AppState::from_system(&harness.system))
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .expect("request"),
        )
        .await
        .expect("response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json payload")
    };
    (status, payload)
}

fn json_body(value: Value) -> Body {
    Body::from(value.to_string())
}

fn error_code(payload: &Value) -> Option<&str> {
    payload.pointer("/error/code").and_then(Value::as_str)
}

#[tokio::test]
async fn desktop_trigger_is_accepted_before_completion() {
    let harness = TestSystem::new();
    let app = router(&harness);

    let (status, payload) = send(
        &app,
        "POST",
        "/workspacesdeploy",
        json_body(json!({ "userName": "alice.smith" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "accepted");
    assert_eq!(payload["stage"], "desktop");
    assert_eq!(payload["tenant"], "alice.smith");
    assert_eq!(payload["deployment_name"], "alice-smith");
    assert!(payload["job_id"].as_str().and_then(|id| Uuid::parse_str(id).ok()).is_some());
}

#[tokio::test]
async fn job_status_reports_terminal_failure() {
    let harness = TestSystem::new();
    let app = router(&harness);

    let (_, accepted) = send(&app, "POST", "/", json_body(json!({ "userName": "bob" }))).await;
    let job_id = Uuid::parse_str(accepted["job_id"].as_str().unwrap()).unwrap();
    harness.wait_for_terminal(job_id).await;

    let (status, payload) = send(&app, "GET", &format!("/jobs/{job_id}"), Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "failed");
    assert_eq!(payload["stage"], "compute");
    assert_eq!(payload["failure"]["step"], "resolve-directory-id");
    assert_eq!(payload["failure"]["code"], "DEPENDENCY_MISSING");
    assert_eq!(payload["steps"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn directory_then_compute_over_http() {
    let harness = TestSystem::new();
    let app = router(&harness);

    let (status, accepted) = send(&app, "POST", "/directorydeploy", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let directory_job = Uuid::parse_str(accepted["job_id"].as_str().unwrap()).unwrap();
    common::assert_status(
        &harness.wait_for_terminal(directory_job).await,
        tenant_provisioner::orchestration::JobStatus::Succeeded,
    );

    let (_, accepted) = send(
        &app,
        "POST",
        "/workspacesdeploy",
        json_body(json!({ "userName": "carol" })),
    )
    .await;
    let desktop_job = Uuid::parse_str(accepted["job_id"].as_str().unwrap()).unwrap();
    harness.wait_for_terminal(desktop_job).await;

    let (_, accepted) = send(&app, "POST", "/", json_body(json!({ "userName": "carol" }))).await;
    let compute_job = Uuid::parse_str(accepted["job_id"].as_str().unwrap()).unwrap();
    let view = harness.wait_for_terminal(compute_job).await;
    common::assert_status(&view, tenant_provisioner::orchestration::JobStatus::Succeeded);

    let (status, payload) =
        send(&app, "POST", &format!("/jobs/{compute_job}/teardown"), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["destroyed"], json!(["Ec2Stack-carol"]));

    let (status, payload) =
        send(&app, "POST", &format!("/jobs/{compute_job}/teardown"), Body::empty()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&payload), Some("JOB_ALREADY_TORN_DOWN"));
}

#[tokio::test]
async fn missing_tenant_is_rejected() {
    let harness = TestSystem::new();
    let app = router(&harness);

    let (status, payload) = send(&app, "POST", "/", json_body(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&payload), Some("INVALID_TENANT"));

    let (status, payload) = send(&app, "POST", "/workspacesdeploy", Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&payload), Some("INVALID_TENANT"));

    let (status, payload) = send(
        &app,
        "POST",
        "/workspacesdeploy",
        json_body(json!({ "userName": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&payload), Some("INVALID_TENANT"));
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let harness = TestSystem::new();
    let app = router(&harness);

    let (status, payload) = send(&app, "POST", "/", Body::from("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&payload), Some("JSON_ERROR"));
}

#[tokio::test]
async fn unknown_and_malformed_job_ids() {
    let harness = TestSystem::new();
    let app = router(&harness);

    let (status, payload) =
        send(&app, "GET", &format!("/jobs/{}", Uuid::new_v4()), Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&payload), Some("JOB_NOT_FOUND"));

    let (status, payload) = send(&app, "GET", "/jobs/not-a-uuid", Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&payload), Some("INVALID_UUID"));

    let (status, _) = send(&app, "DELETE", &format!("/jobs/{}", Uuid::new_v4()), Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_of_finished_job_reports_false() {
    let harness = TestSystem::new();
    let app = router(&harness);

    let (_, accepted) = send(&app, "POST", "/", json_body(json!({ "userName": "dan" }))).await;
    let job_id = Uuid::parse_str(accepted["job_id"].as_str().unwrap()).unwrap();
    harness.wait_for_terminal(job_id).await;

    let (status, payload) = send(&app, "DELETE", &format!("/jobs/{job_id}"), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["cancellation_requested"], false);
}

#[tokio::test]
async fn health_reports_backend() {
    let harness = TestSystem::new();
    let app = router(&harness);

    let (status, payload) = send(&app, "GET", "/health", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["parameter_store"], "memory");
}
