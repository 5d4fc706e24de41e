use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pgpaas_instances::handlers::{configure_routes, AppState};
use pgpaas_instances::test_utils::TestHarness;
use pgpaas_instances::types::ResourceKind;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(harness: &TestHarness) -> Router {
    let state = Arc::new(AppState {
        controller: harness.controller.clone(),
    });
    Router::new().nest("/api/v1", configure_routes().with_state(state))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_create_get_delete_scenario() {
    let harness = TestHarness::new();
    let app = app(&harness);

    let (status, created) = send(
        &app,
        post_json(
            "/api/v1/databases",
            json!({"db_name": "app1", "db_user": "alice", "db_password": "s3cret"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "creating");
    assert_eq!(created["db_name"], "app1");
    assert_eq!(created["db_user"], "alice");
    assert!(created.get("db_password").is_none());
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 8);
    assert_eq!(created["name"], format!("db-{}", id));

    let (status, fetched) = send(&app, get(&format!("/api/v1/databases/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, listed) = send(&app, get("/api/v1/databases")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([created]));

    let (status, deleted) = send(&app, delete(&format!("/api/v1/databases/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({"message": "Database deleted"}));

    let (status, missing) = send(&app, get(&format!("/api/v1/databases/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["detail"], "Database not found");
}

#[tokio::test]
async fn test_empty_object_uses_defaults() {
    let harness = TestHarness::new();
    let app = app(&harness);

    let (status, created) = send(&app, post_json("/api/v1/databases", json!({}))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["db_name"], "postgres");
    assert_eq!(created["db_user"], "postgres");
}

#[tokio::test]
async fn test_missing_body_is_bad_request() {
    let harness = TestHarness::new();
    let app = app(&harness);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/databases")
        .body(Body::empty())
        .unwrap();
    let (status, problem) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["error_code"], "BAD_REQUEST");
    assert!(harness.orchestrator.created().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let harness = TestHarness::new();
    let app = app(&harness);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/databases")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provisioning_failure_is_server_error_without_record() {
    let harness = TestHarness::new();
    harness
        .orchestrator
        .fail_create(ResourceKind::Service, "quota exceeded");
    let app = app(&harness);

    let (status, problem) = send(&app, post_json("/api/v1/databases", json!({}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(problem["detail"]
        .as_str()
        .unwrap()
        .contains("quota exceeded"));
    let (_, listed) = send(&app, get("/api/v1/databases")).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_unknown_id_is_not_found_everywhere() {
    let harness = TestHarness::new();
    let app = app(&harness);

    for request in [
        get("/api/v1/databases/deadbeef"),
        delete("/api/v1/databases/deadbeef"),
        get("/api/v1/databases/deadbeef/metrics"),
    ] {
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_metrics_for_existing_instance() {
    let harness = TestHarness::new();
    let app = app(&harness);
    let (_, created) = send(&app, post_json("/api/v1/databases", json!({}))).await;
    let id = created["id"].as_str().unwrap();

    let (status, metrics) = send(&app, get(&format!("/api/v1/databases/{}/metrics", id))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["storage_usage"], "1Gi");
    assert!(metrics["cpu_usage"].is_array());
    assert!(metrics["memory_usage"].is_array());
}

#[tokio::test]
async fn test_metrics_backend_down_is_bad_gateway() {
    let harness = TestHarness::new();
    let app = app(&harness);
    let (_, created) = send(&app, post_json("/api/v1/databases", json!({}))).await;
    let id = created["id"].as_str().unwrap();
    harness.metrics.fail_with("connection refused");

    let (status, _) = send(&app, get(&format!("/api/v1/databases/{}/metrics", id))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
