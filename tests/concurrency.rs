//! Concurrent request handling against a real listener.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinSet;

use iris_serve::health::ReadinessState;
use iris_serve::lifecycle::Shutdown;
use iris_serve::observability::Tracer;
use iris_serve::{HttpServer, ModelStore};

mod common;
use common::{SETOSA, VERSICOLOR, VIRGINICA};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_predictions_match_sequential() {
    let store = Arc::new(ModelStore::new(Arc::new(ReadinessState::new())));
    store.load(&common::bundled_model()).unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(common::test_config(), store, Tracer::disabled());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}/predict", addr);

    let mut expected = Vec::new();
    for body in [SETOSA, VERSICOLOR, VIRGINICA] {
        let res = client
            .post(&url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        expected.push(res.json::<serde_json::Value>().await.unwrap());
    }

    let mut set = JoinSet::new();
    for i in 0..60 {
        let client = client.clone();
        let url = url.clone();
        let body = [SETOSA, VERSICOLOR, VIRGINICA][i % 3];
        set.spawn(async move {
            let res = client
                .post(&url)
                .header("content-type", "application/json")
                .body(body)
                .send()
                .await
                .unwrap();
            let trace_id = res.headers()["x-trace-id"].to_str().unwrap().to_string();
            (i % 3, res.status(), trace_id, res.json::<serde_json::Value>().await.unwrap())
        });
    }

    let mut trace_ids = std::collections::HashSet::new();
    while let Some(result) = set.join_next().await {
        let (kind, status, trace_id, body) = result.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, expected[kind]);
        assert!(trace_ids.insert(trace_id), "trace ids must be unique per request");
    }
    assert_eq!(trace_ids.len(), 60);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .expect("server drains after shutdown")
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readiness_reads_during_load() {
    let store = Arc::new(ModelStore::new(Arc::new(ReadinessState::new())));
    let mut readers = JoinSet::new();
    for _ in 0..8 {
        let store = store.clone();
        readers.spawn(async move {
            let mut seen_ready = false;
            for _ in 0..1000 {
                let ready = store.readiness().is_ready();
                // Once Ready, never observed otherwise.
                assert!(!(seen_ready && !ready));
                seen_ready |= ready;
                if ready {
                    assert!(store.artifact().is_some());
                }
                tokio::task::yield_now().await;
            }
        });
    }

    iris_serve::lifecycle::spawn_model_load(store.clone(), common::bundled_model())
        .await
        .unwrap();
    while let Some(result) = readers.join_next().await {
        result.unwrap();
    }
    assert!(store.readiness().is_ready());
}
