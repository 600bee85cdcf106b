//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use iris_serve::config::ServiceConfig;
use iris_serve::health::ReadinessState;
use iris_serve::model::{Classifier, ModelArtifact, FEATURE_NAMES};
use iris_serve::observability::{
    BatchConfig, BatchSpanProcessor, InMemorySpanExporter, SpanExporter, SpanRecord, Tracer,
};
use iris_serve::{HttpServer, ModelStore};

pub const SETOSA: &str =
    r#"{"sepal_length": 5.1, "sepal_width": 3.5, "petal_length": 1.4, "petal_width": 0.2}"#;
pub const VERSICOLOR: &str =
    r#"{"sepal_length": 6.4, "sepal_width": 3.2, "petal_length": 4.5, "petal_width": 1.5}"#;
pub const VIRGINICA: &str =
    r#"{"sepal_length": 6.3, "sepal_width": 3.3, "petal_length": 6.0, "petal_width": 2.5}"#;

/// The canonical logistic regression artifact shipped with the service.
pub fn bundled_model() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models/iris_logreg.json")
}

/// An artifact whose logits overflow, so every prediction fails inside the
/// classifier.
pub fn overflowing_model() -> ModelArtifact {
    ModelArtifact {
        format_version: 1,
        name: Some("overflow".into()),
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        classes: vec!["setosa".into(), "versicolor".into(), "virginica".into()],
        classifier: Classifier::LogisticRegression {
            coefficients: vec![vec![f64::MAX; 4], vec![0.0; 4], vec![0.0; 4]],
            intercepts: vec![0.0; 3],
        },
    }
}

pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.tracing.scheduled_delay_ms = 10;
    config.tracing.export_timeout_ms = 500;
    config
}

/// The full layered router over a fresh store, exporting spans in memory.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<ModelStore>,
    pub spans: InMemorySpanExporter,
    export_shutdown: broadcast::Sender<()>,
    processor: JoinHandle<()>,
}

impl TestApp {
    pub fn new() -> Self {
        let spans = InMemorySpanExporter::new();
        let mut app = Self::with_exporter(Arc::new(spans.clone()));
        app.spans = spans;
        app
    }

    pub fn with_exporter(exporter: Arc<dyn SpanExporter>) -> Self {
        Self::build(test_config(), exporter)
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let spans = InMemorySpanExporter::new();
        let mut app = Self::build(config, Arc::new(spans.clone()));
        app.spans = spans;
        app
    }

    fn build(config: ServiceConfig, exporter: Arc<dyn SpanExporter>) -> Self {
        let (export_shutdown, shutdown_rx) = broadcast::channel(1);
        let (queue, processor) =
            BatchSpanProcessor::spawn(exporter, BatchConfig::from(&config.tracing), shutdown_rx);

        let store = Arc::new(ModelStore::new(Arc::new(ReadinessState::new())));
        let server = HttpServer::new(config, store.clone(), Tracer::new(queue));
        Self {
            router: server.router(),
            store,
            spans: InMemorySpanExporter::new(),
            export_shutdown,
            processor,
        }
    }

    /// A ready app serving the bundled model.
    pub fn ready() -> Self {
        let app = Self::new();
        app.store.load(&bundled_model()).unwrap();
        app
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn predict(&self, body: &str) -> TestResponse {
        self.send(predict_request(body)).await
    }

    /// Stop the span processor and return everything it exported.
    pub async fn finished_spans(self) -> Vec<SpanRecord> {
        let _ = self.export_shutdown.send(());
        self.processor.await.unwrap();
        self.spans.finished_spans()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn predict_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
