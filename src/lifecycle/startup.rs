//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the span exporter and processor from configuration
//! - Kick off the model load without holding up the listener
//!
//! # Design Decisions
//! - Fail fast: a bad exporter configuration is fatal
//! - A failed model load is not fatal; the process stays live and reports
//!   Failed on the readiness probe

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{ExporterKind, ServiceConfig};
use crate::model::ModelStore;
use crate::observability::{
    BatchConfig, BatchSpanProcessor, ExportError, HttpSpanExporter, LogSpanExporter,
    SpanExporter, Tracer,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("tracing exporter 'http' requires tracing.endpoint")]
    MissingEndpoint,

    #[error("failed to build span exporter: {0}")]
    Exporter(#[from] ExportError),
}

/// Tracer plus the processor task that must be awaited on shutdown.
pub struct TracerHandle {
    pub tracer: Tracer,
    pub processor: Option<JoinHandle<()>>,
}

/// The configured exporter, or `None` when export is switched off.
pub fn build_exporter(config: &ServiceConfig) -> Result<Option<Arc<dyn SpanExporter>>, StartupError> {
    let tracing_config = &config.tracing;
    if !tracing_config.enabled {
        return Ok(None);
    }

    let exporter: Arc<dyn SpanExporter> = match tracing_config.exporter {
        ExporterKind::None => return Ok(None),
        ExporterKind::Log => Arc::new(LogSpanExporter),
        ExporterKind::Http => {
            let endpoint = tracing_config
                .endpoint
                .as_deref()
                .ok_or(StartupError::MissingEndpoint)?;
            Arc::new(HttpSpanExporter::new(
                endpoint,
                &config.observability.service_name,
                BatchConfig::from(tracing_config).export_timeout,
            )?)
        }
    };
    Ok(Some(exporter))
}

/// Build the tracer and, if export is enabled, spawn its batch processor.
pub fn start_tracer(
    config: &ServiceConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<TracerHandle, StartupError> {
    let Some(exporter) = build_exporter(config)? else {
        tracing::info!("Span export disabled");
        return Ok(TracerHandle {
            tracer: Tracer::disabled(),
            processor: None,
        });
    };

    let (queue, processor) =
        BatchSpanProcessor::spawn(exporter, BatchConfig::from(&config.tracing), shutdown);
    Ok(TracerHandle {
        tracer: Tracer::new(queue),
        processor: Some(processor),
    })
}

/// Load the model on the blocking pool. The outcome is reported through
/// the store's readiness state and logs.
pub fn spawn_model_load(store: Arc<ModelStore>, path: PathBuf) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let _ = store.load(&path);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{Readiness, ReadinessState};

    #[test]
    fn test_exporter_selection() {
        let mut config = ServiceConfig::default();
        assert_eq!(build_exporter(&config).unwrap().unwrap().name(), "log");

        config.tracing.exporter = ExporterKind::None;
        assert!(build_exporter(&config).unwrap().is_none());

        config.tracing.exporter = ExporterKind::Http;
        assert!(matches!(
            build_exporter(&config),
            Err(StartupError::MissingEndpoint)
        ));

        config.tracing.endpoint = Some("http://127.0.0.1:4318/v1/spans".into());
        assert_eq!(build_exporter(&config).unwrap().unwrap().name(), "http");

        config.tracing.enabled = false;
        assert!(build_exporter(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_model_settles_failed() {
        let store = Arc::new(ModelStore::new(Arc::new(ReadinessState::new())));
        spawn_model_load(store.clone(), PathBuf::from("/nonexistent/iris.json"))
            .await
            .unwrap();
        assert_eq!(store.readiness().get(), Readiness::Failed);
    }

    #[tokio::test]
    async fn test_bundled_model_settles_ready() {
        let store = Arc::new(ModelStore::new(Arc::new(ReadinessState::new())));
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models/iris_logreg.json");
        spawn_model_load(store.clone(), path).await.unwrap();
        assert_eq!(store.readiness().get(), Readiness::Ready);
    }
}
