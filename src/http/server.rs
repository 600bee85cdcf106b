//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::FromRef,
    http::{Request, Response},
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    body::Limited,
    limit::{RequestBodyLimitLayer, ResponseBody},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::config::ServiceConfig;
use crate::health::{live_check, ready_check, ReadinessState};
use crate::http::predict::predict;
use crate::http::request::MakeRequestUuid;
use crate::inference::Predictor;
use crate::model::ModelStore;
use crate::observability::{trace_requests, Tracer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Predictor,
    pub readiness: Arc<ReadinessState>,
    pub max_body_size: usize,
}

impl FromRef<AppState> for Arc<ReadinessState> {
    fn from_ref(state: &AppState) -> Self {
        state.readiness.clone()
    }
}

/// HTTP server for the classification service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    pub fn new(config: ServiceConfig, store: Arc<ModelStore>, tracer: Tracer) -> Self {
        let state = AppState {
            readiness: store.readiness().clone(),
            predictor: Predictor::new(store, tracer.clone()),
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(&config, state, tracer);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState, tracer: Tracer) -> Router {
        Router::new()
            .route("/predict", post(predict))
            .route("/live_check", get(live_check))
            .route("/ready_check", get(ready_check))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    // Outside the timeout and body limit so 408 and 413 still get a root span.
                    .layer(middleware::from_fn_with_state(tracer, trace_requests))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    )))
                    .map_response(|res: Response<ResponseBody<Body>>| res.map(Body::new))
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
                    .map_request(|req: Request<Limited<Body>>| req.map(Body::new)),
            )
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            max_body_size = self.config.security.max_body_size,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
