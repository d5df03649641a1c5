//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! all /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use pipe_scan::api::{create_app, ApiState};
use pipe_scan::pipeline::ScanHandle;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

fn create_test_state() -> ApiState {
    ApiState::new(ScanHandle::default(), "replay")
}

async fn call(state: &ApiState, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = create_app(state.clone())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

/// All GET endpoints should return 200 with the standard envelope.
#[tokio::test]
async fn test_get_endpoints_return_200() {
    let state = create_test_state();
    let endpoints = ["/api/v1/health", "/api/v1/status", "/api/v1/snapshot", "/api/v1/log"];

    for endpoint in &endpoints {
        let (status, body) = call(&state, "GET", endpoint).await;
        assert_eq!(status, StatusCode::OK, "GET {} returned {}", endpoint, status);
        assert!(body.get("data").is_some(), "GET {} missing data", endpoint);
        assert_eq!(body["meta"]["version"], "1", "GET {} missing meta", endpoint);
    }
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let state = create_test_state();
    let (status, body) = call(&state, "GET", "/api/v1/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "No route for /api/v1/does-not-exist");
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let state = create_test_state();
    let (status, _) = call(&state, "GET", "/api/v1/learning/start").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_full_session_over_http() {
    let state = create_test_state();

    let (status, body) = call(&state, "POST", "/api/v1/analysis/start").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "PRECONDITION_FAILED");

    let (status, _) = call(&state, "POST", "/api/v1/learning/start").await;
    assert_eq!(status, StatusCode::OK);
    for _ in 0..5 {
        state.handle.ingest(10.0);
    }
    let (_, body) = call(&state, "POST", "/api/v1/learning/end").await;
    assert_eq!(body["data"]["changed"], true);

    let (status, body) = call(&state, "POST", "/api/v1/analysis/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "ANALYZING");

    for reading in [10.0, 10.0, 10.0, 17.0, 10.0] {
        state.handle.ingest(reading);
    }

    let (_, body) = call(&state, "GET", "/api/v1/snapshot").await;
    let data = &body["data"];
    assert_eq!(data["phase"], "ANALYZING");
    assert_eq!(data["baseline"].as_array().map(Vec::len), Some(5));
    assert_eq!(data["live_distances"][3], 17.0);
    assert_eq!(data["live_positions"][4], 4);

    let (_, body) = call(&state, "GET", "/api/v1/status").await;
    assert_eq!(body["data"]["phase"], "ANALYZING");
    assert_eq!(body["data"]["baseline_len"], 5);
    assert_eq!(body["data"]["live_len"], 5);
    assert_eq!(body["data"]["source"], "replay");

    let (_, body) = call(&state, "GET", "/api/v1/log").await;
    let messages: Vec<&str> = body["data"]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["message"].as_str())
        .collect();
    assert_eq!(
        messages,
        vec![
            "Error: finish a learning pass before starting analysis (baseline is empty)",
            "Learning started",
            "Learning finished",
            "Pipe analysis started",
        ]
    );

    let (status, _) = call(&state, "DELETE", "/api/v1/log").await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&state, "GET", "/api/v1/log").await;
    assert_eq!(body["data"]["count"], 0);
}
