//! Liveness and readiness probe tests.

use std::path::Path;

use axum::http::StatusCode;

mod common;
use common::{get, TestApp};

#[tokio::test]
async fn test_live_check_always_ok() {
    let initializing = TestApp::new();
    let failed = TestApp::new();
    let _ = failed.store.load(Path::new("/nonexistent/model.json"));
    let ready = TestApp::ready();

    for app in [&initializing, &failed, &ready] {
        let res = app.send(get("/live_check")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["status"], "alive");
    }
}

#[tokio::test]
async fn test_ready_check_transitions() {
    let app = TestApp::new();

    let res = app.send(get("/ready_check")).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["status"], "initializing");
    assert_eq!(res.body["retryable"], true);
    assert!(res.header("retry-after").is_some());

    app.store.load(&common::bundled_model()).unwrap();

    let res = app.send(get("/ready_check")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, serde_json::json!({"status": "ready"}));
}

#[tokio::test]
async fn test_ready_check_failed_is_sticky() {
    let app = TestApp::new();
    let _ = app.store.load(Path::new("/nonexistent/model.json"));

    for _ in 0..3 {
        let res = app.send(get("/ready_check")).await;
        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body["status"], "failed");
        assert_eq!(res.body["retryable"], false);
        assert!(res.header("retry-after").is_none());
    }
}

#[tokio::test]
async fn test_malformed_artifact_fails_readiness() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    std::fs::write(&path, r#"{"format_version": 1, "classes": []"#).unwrap();

    let app = TestApp::new();
    let err = app.store.load(&path).unwrap_err();
    assert_eq!(err.kind(), "artifact_parse");

    let res = app.send(get("/ready_check")).await;
    assert_eq!(res.body["status"], "failed");
}
