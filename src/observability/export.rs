//! Asynchronous span export.
//!
//! # Data Flow
//! ```text
//! TraceSpan::end()
//!     → SpanQueue::submit (try_send, never blocks)
//!     → bounded mpsc channel
//!     → BatchSpanProcessor task (size / interval / shutdown flush)
//!     → SpanExporter::export (bounded by export timeout)
//! ```
//!
//! # Design Decisions
//! - Export is fire-and-forget: a full queue drops the span and logs it
//! - Exporter errors and timeouts are logged locally, never retried
//! - Shutdown drains whatever is already queued before the task exits

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::TracingConfig;
use crate::observability::metrics;
use crate::observability::tracing::SpanRecord;

/// Failure to deliver spans to the collector. Never surfaced to clients.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("collector request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collector rejected batch with status {0}")]
    Rejected(u16),

    #[error("export timed out after {0:?}")]
    Timeout(Duration),

    #[error("exporter unavailable: {0}")]
    Unavailable(String),
}

/// Destination for finished spans.
#[async_trait]
pub trait SpanExporter: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn export(&self, batch: Vec<SpanRecord>) -> Result<(), ExportError>;
}

/// Producer side of the export queue.
#[derive(Debug, Clone)]
pub struct SpanQueue {
    tx: Option<mpsc::Sender<SpanRecord>>,
}

impl SpanQueue {
    /// A queue and its receiving end.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<SpanRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A queue that silently discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Enqueue a finished span without waiting.
    pub fn submit(&self, record: SpanRecord) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                metrics::record_span_dropped();
                tracing::warn!(
                    error_kind = "export_error",
                    trace_id = %record.context.trace_id,
                    span_id = %record.context.span_id,
                    span = %record.name,
                    "Span export queue full; dropping span"
                );
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                metrics::record_span_dropped();
                tracing::debug!(span = %record.name, "Span processor stopped; dropping span");
            }
        }
    }
}

/// Batching parameters for the processor.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_queue_size: usize,
    pub max_batch_size: usize,
    pub scheduled_delay: Duration,
    pub export_timeout: Duration,
}

impl From<&TracingConfig> for BatchConfig {
    fn from(config: &TracingConfig) -> Self {
        Self {
            max_queue_size: config.max_queue_size,
            max_batch_size: config.max_batch_size,
            scheduled_delay: Duration::from_millis(config.scheduled_delay_ms),
            export_timeout: Duration::from_millis(config.export_timeout_ms),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from(&TracingConfig::default())
    }
}

/// Background task moving spans from the queue to an exporter.
pub struct BatchSpanProcessor;

impl BatchSpanProcessor {
    /// Start the processor. The task ends after `shutdown` fires (or its
    /// sender is dropped) and the queue has been flushed.
    pub fn spawn(
        exporter: Arc<dyn SpanExporter>,
        config: BatchConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> (SpanQueue, JoinHandle<()>) {
        let (queue, rx) = SpanQueue::bounded(config.max_queue_size);
        tracing::info!(
            exporter = exporter.name(),
            max_queue_size = config.max_queue_size,
            max_batch_size = config.max_batch_size,
            "Span processor starting"
        );
        let handle = tokio::spawn(run_processor(rx, exporter, config, shutdown));
        (queue, handle)
    }
}

async fn run_processor(
    mut rx: mpsc::Receiver<SpanRecord>,
    exporter: Arc<dyn SpanExporter>,
    config: BatchConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let max_batch = config.max_batch_size.max(1);
    let mut batch = Vec::with_capacity(max_batch);
    let mut ticker = time::interval(config.scheduled_delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(span) => {
                    batch.push(span);
                    if batch.len() >= max_batch {
                        flush(exporter.as_ref(), &mut batch, config.export_timeout).await;
                    }
                }
                None => {
                    flush(exporter.as_ref(), &mut batch, config.export_timeout).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush(exporter.as_ref(), &mut batch, config.export_timeout).await;
            }
            _ = shutdown.recv() => {
                while let Ok(span) = rx.try_recv() {
                    batch.push(span);
                    if batch.len() >= max_batch {
                        flush(exporter.as_ref(), &mut batch, config.export_timeout).await;
                    }
                }
                flush(exporter.as_ref(), &mut batch, config.export_timeout).await;
                break;
            }
        }
    }

    tracing::debug!(exporter = exporter.name(), "Span processor stopped");
}

async fn flush(exporter: &dyn SpanExporter, batch: &mut Vec<SpanRecord>, timeout: Duration) {
    if batch.is_empty() {
        return;
    }
    let spans = std::mem::take(batch);
    let count = spans.len();

    match time::timeout(timeout, exporter.export(spans)).await {
        Ok(Ok(())) => {
            tracing::trace!(exporter = exporter.name(), spans = count, "Exported spans");
        }
        Ok(Err(e)) => report_failure(exporter.name(), count, &e),
        Err(_) => report_failure(exporter.name(), count, &ExportError::Timeout(timeout)),
    }
}

fn report_failure(exporter: &'static str, spans: usize, error: &ExportError) {
    metrics::record_export_failure(exporter);
    tracing::warn!(
        error_kind = "export_error",
        exporter,
        spans,
        error = %error,
        "Span export failed"
    );
}

#[derive(Serialize)]
struct ExportRequest<'a> {
    resource: Resource<'a>,
    spans: &'a [SpanRecord],
}

#[derive(Serialize)]
struct Resource<'a> {
    #[serde(rename = "service.name")]
    service_name: &'a str,
}

/// Pushes span batches as JSON to a collector endpoint.
pub struct HttpSpanExporter {
    client: reqwest::Client,
    endpoint: String,
    service_name: String,
}

impl HttpSpanExporter {
    pub fn new(
        endpoint: impl Into<String>,
        service_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            service_name: service_name.into(),
        })
    }
}

#[async_trait]
impl SpanExporter for HttpSpanExporter {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn export(&self, batch: Vec<SpanRecord>) -> Result<(), ExportError> {
        let body = ExportRequest {
            resource: Resource {
                service_name: &self.service_name,
            },
            spans: &batch,
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ExportError::Rejected(status.as_u16()))
        }
    }
}

/// Writes finished spans to the log stream at debug level.
#[derive(Debug, Default)]
pub struct LogSpanExporter;

#[async_trait]
impl SpanExporter for LogSpanExporter {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn export(&self, batch: Vec<SpanRecord>) -> Result<(), ExportError> {
        for span in &batch {
            let attributes = serde_json::to_string(&span.attributes)
                .map_err(|e| ExportError::Unavailable(e.to_string()))?;
            tracing::debug!(
                target: "iris_serve::spans",
                trace_id = %span.context.trace_id,
                span_id = %span.context.span_id,
                parent_span_id = ?span.context.parent_span_id.map(|id| id.to_string()),
                span = %span.name,
                duration_us = span.duration_us,
                status = ?span.status,
                attributes = %attributes,
                "Span finished"
            );
        }
        Ok(())
    }
}

/// Keeps exported spans in memory. Intended for tests and local tooling.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl InMemorySpanExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything exported so far.
    pub fn finished_spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.clear();
        }
    }
}

#[async_trait]
impl SpanExporter for InMemorySpanExporter {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    async fn export(&self, batch: Vec<SpanRecord>) -> Result<(), ExportError> {
        let mut spans = self
            .spans
            .lock()
            .map_err(|_| ExportError::Unavailable("span buffer poisoned".into()))?;
        spans.extend(batch);
        Ok(())
    }
}
