use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use browseflow_client::{ExecutionService, HttpExecutionClient};
use browseflow_core::config::ServiceConfig;
use browseflow_core::error::FlowError;
use browseflow_graph::{encode, Graph, WorkflowMeta};

#[derive(Default)]
struct FakeBackend {
    submitted: Mutex<Vec<Value>>,
    stopped: Mutex<Vec<String>>,
}

async fn execute(
    State(state): State<Arc<FakeBackend>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    state.submitted.lock().unwrap().push(body);
    match name.as_str() {
        "reject" => (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": "bad nodes"}))),
        "no-id" => (StatusCode::OK, Json(json!({"status": "started"}))),
        _ => (
            StatusCode::OK,
            Json(json!({"execution_id": "exec-1", "status": "started", "message": "ok"})),
        ),
    }
}

async fn status(Path(id): Path<String>) -> axum::response::Response {
    use axum::response::IntoResponse;
    match id.as_str() {
        "exec-1" => (
            StatusCode::OK,
            Json(json!({
                "execution_id": "exec-1",
                "workflow_id": "wf",
                "status": "paused_for_captcha",
                "steps": [{"node_id": "1", "node_type": "start", "status": "success"}]
            })),
        )
            .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>").into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "not found"}))).into_response(),
    }
}

async fn stop(
    State(state): State<Arc<FakeBackend>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.stopped.lock().unwrap().push(id.clone());
    if id == "exec-1" {
        (StatusCode::OK, Json(json!({"message": "stopped"})))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"detail": "not found"})))
    }
}

async fn nodes() -> Json<Value> {
    Json(json!({
        "visit_page": {
            "name": "Visit page",
            "description": "Navigate",
            "required_params": ["url"],
            "optional_params": ["wait_for_load", "timeout"]
        }
    }))
}

async fn spawn_backend() -> (HttpExecutionClient, Arc<FakeBackend>) {
    let state = Arc::new(FakeBackend::default());
    let app = Router::new()
        .route("/", get(|| async { Json(json!({"message": "running"})) }))
        .route("/nodes", get(nodes))
        .route("/workflow/execute", post(execute))
        .route("/workflow/status/{id}", get(status))
        .route("/workflow/stop/{id}", post(stop))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = HttpExecutionClient::new(&ServiceConfig {
        base_url: format!("http://{}", addr),
        ..ServiceConfig::default()
    })
    .unwrap();
    (client, state)
}

fn document(name: &str) -> browseflow_graph::WorkflowDefinition {
    encode(&Graph::seed(), &WorkflowMeta::new(name, "test"))
}

#[tokio::test]
async fn test_submit_returns_handle_and_sends_definition() {
    let (client, state) = spawn_backend().await;
    let handle = client.submit(&document("ok")).await.unwrap();
    assert_eq!(handle.as_str(), "exec-1");

    let submitted = state.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0]["nodes"][0]["data"]["nodeType"], "start");
    assert_eq!(submitted[0]["edges"][1]["id"], "e2-3");
    assert!(submitted[0]["workflow_id"].as_str().unwrap().starts_with("workflow_"));
}

#[tokio::test]
async fn test_submit_non_success_is_service_error_with_body() {
    let (client, _) = spawn_backend().await;
    let err = client.submit(&document("reject")).await.unwrap_err();
    match err {
        FlowError::Service { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("bad nodes"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_submit_without_execution_id_is_protocol_error() {
    let (client, _) = spawn_backend().await;
    let err = client.submit(&document("no-id")).await.unwrap_err();
    assert!(matches!(err, FlowError::Protocol(_)));
}

#[tokio::test]
async fn test_submit_unreachable_is_transport_error() {
    // Port 9 (discard) on localhost is not listening in test environments.
    let client = HttpExecutionClient::new(&ServiceConfig {
        base_url: "http://127.0.0.1:9".into(),
        request_timeout_secs: 2,
        ..ServiceConfig::default()
    })
    .unwrap();
    let err = client.submit(&document("ok")).await.unwrap_err();
    assert!(matches!(err, FlowError::Transport(_)));
}

#[tokio::test]
async fn test_fetch_status_passes_unknown_status_through() {
    let (client, _) = spawn_backend().await;
    let report = client.fetch_status("exec-1").await.unwrap();
    assert_eq!(report.status, "paused_for_captcha");
    assert_eq!(report.status_text(), "paused_for_captcha");
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.raw["workflow_id"], "wf");
}

#[tokio::test]
async fn test_fetch_status_unknown_execution() {
    let (client, _) = spawn_backend().await;
    let err = client.fetch_status("nope").await.unwrap_err();
    assert!(matches!(err, FlowError::Service { status: 404, .. }));
}

#[tokio::test]
async fn test_request_stop_accepted_and_rejected() {
    let (client, state) = spawn_backend().await;
    assert!(client.request_stop("exec-1").await.unwrap());
    assert!(!client.request_stop("other").await.unwrap());
    assert_eq!(*state.stopped.lock().unwrap(), vec!["exec-1", "other"]);
}

#[tokio::test]
async fn test_catalog_and_health() {
    let (client, _) = spawn_backend().await;
    let catalog = client.list_node_types().await.unwrap();
    assert_eq!(catalog["visit_page"].required_params, vec!["url"]);
    let banner = client.health().await.unwrap();
    assert_eq!(banner["message"], "running");
}

#[tokio::test]
async fn test_non_json_error_body_falls_back_to_status() {
    let (client, _) = spawn_backend().await;
    let err = client.fetch_status("broken").await.unwrap_err();
    assert!(matches!(&err, FlowError::Service { status: 500, body } if body.is_empty()));
    assert_eq!(err.to_string(), "HTTP 500");
}
