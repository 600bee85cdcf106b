//! Iris classification service (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  IRIS SERVE                      │
//!                         │                                                  │
//!     Client Request      │  ┌────────────┐   ┌────────────┐   ┌──────────┐  │
//!     ────────────────────┼─▶│   http     │──▶│ inference  │──▶│  model   │  │
//!                         │  │  server    │   │ predictor  │   │  store   │  │
//!                         │  └─────┬──────┘   └────────────┘   └────┬─────┘  │
//!                         │        │                                │        │
//!     Client Response     │        ▼                                ▼        │
//!     ◀───────────────────┼── trace middleware               health state  │
//!                         │                                                  │
//!                         │  ┌────────────────────────────────────────────┐  │
//!                         │  │           Cross-Cutting Concerns            │  │
//!                         │  │  config · observability · lifecycle         │  │
//!                         │  └────────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use iris_serve::config::{load_config, validate_config, ServiceConfig};
use iris_serve::health::ReadinessState;
use iris_serve::lifecycle::{spawn_model_load, start_tracer, wait_for_signal, Shutdown};
use iris_serve::observability::{init_logging, metrics};
use iris_serve::{HttpServer, ModelStore};

#[derive(Parser)]
#[command(name = "iris-serve")]
#[command(about = "HTTP inference service for Iris species classification", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model artifact path (overrides model.path).
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Listen address (overrides listener.bind_address).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(model) = args.model {
        config.model.path = model;
    }
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if let Err(violations) = validate_config(&config) {
        for violation in &violations {
            eprintln!("config error: {}", violation);
        }
        return Err(format!("{} configuration error(s)", violations.len()).into());
    }

    init_logging(&config.observability)?;
    tracing::info!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        model_path = %config.model.path.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Starting up"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // Span export stops only after the server has drained.
    let shutdown = Shutdown::new();
    let export_shutdown = Shutdown::new();
    let tracer = start_tracer(&config, export_shutdown.subscribe())?;

    let readiness = Arc::new(ReadinessState::new());
    metrics::record_readiness(readiness.get());
    let store = Arc::new(ModelStore::new(readiness));
    let model_load = spawn_model_load(store.clone(), config.model.path.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);
    let server = HttpServer::new(config, store, tracer.tracer);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = wait_for_signal() => {
            shutdown.trigger();
            match tokio::time::timeout(grace, &mut server_task).await {
                Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server error"),
                Err(_) => tracing::warn!("In-flight requests still running after grace period"),
                _ => {}
            }
        }
        result = &mut server_task => {
            shutdown.trigger();
            if let Ok(Err(e)) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
    }
    export_shutdown.trigger();

    let mut tasks = vec![model_load];
    tasks.extend(tracer.processor);
    Shutdown::drain(tasks, grace).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
