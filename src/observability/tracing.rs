//! Distributed tracing support.
//!
//! # Responsibilities
//! - Create spans for requests and inference calls
//! - Link child spans to their parent within one trace
//! - Hand finished spans to the export queue
//!
//! # Design Decisions
//! - A span is closed exactly once: on `end()` or, failing that, on drop
//! - Each trace span also opens a `tracing` span carrying its ids, so log
//!   events emitted inside it are correlated by the JSON log layer
//! - Closing a span never waits on export

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::observability::context::TraceContext;
use crate::observability::export::SpanQueue;

/// Role of a span within the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Root span for an inbound request.
    Server,
    /// Work performed inside the process.
    Internal,
}

/// Final status of a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error { message: String },
}

/// A finished span, as handed to exporters.
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub name: String,
    pub kind: SpanKind,
    #[serde(flatten)]
    pub context: TraceContext,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_us: u64,
    pub attributes: BTreeMap<String, Value>,
    pub status: SpanStatus,
}

impl SpanRecord {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, SpanStatus::Error { .. })
    }
}

struct OpenSpan {
    name: String,
    kind: SpanKind,
    start_time: DateTime<Utc>,
    started: Instant,
    attributes: BTreeMap<String, Value>,
    status: SpanStatus,
}

/// An in-progress span.
pub struct TraceSpan {
    open: Option<OpenSpan>,
    context: TraceContext,
    span: tracing::Span,
    queue: SpanQueue,
}

impl TraceSpan {
    pub fn context(&self) -> TraceContext {
        self.context
    }

    /// The `tracing` span mirroring this trace span.
    pub fn tracing_span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(open) = self.open.as_mut() {
            open.attributes.insert(key.into(), value.into());
        }
    }

    /// Mark success unless an error was already recorded.
    pub fn set_ok(&mut self) {
        if let Some(open) = self.open.as_mut() {
            if !matches!(open.status, SpanStatus::Error { .. }) {
                open.status = SpanStatus::Ok;
            }
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        if let Some(open) = self.open.as_mut() {
            open.status = SpanStatus::Error {
                message: message.into(),
            };
        }
    }

    /// Close the span and enqueue it for export.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        let duration = open.started.elapsed();
        let record = SpanRecord {
            name: open.name,
            kind: open.kind,
            context: self.context,
            start_time: open.start_time,
            end_time: open.start_time
                + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero()),
            duration_us: duration.as_micros() as u64,
            attributes: open.attributes,
            status: open.status,
        };
        self.queue.submit(record);
    }
}

impl Drop for TraceSpan {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Span factory bound to an export queue.
#[derive(Debug, Clone)]
pub struct Tracer {
    queue: SpanQueue,
}

impl Tracer {
    pub fn new(queue: SpanQueue) -> Self {
        Self { queue }
    }

    /// A tracer whose spans are correlated in logs but never exported.
    pub fn disabled() -> Self {
        Self::new(SpanQueue::disabled())
    }

    /// Open the root span of a request, continuing `remote_parent` when the
    /// caller sent one.
    pub fn start_root(&self, name: &str, remote_parent: Option<&TraceContext>) -> TraceSpan {
        let context = remote_parent
            .map(TraceContext::child)
            .unwrap_or_else(TraceContext::new_root);
        self.start(name, SpanKind::Server, context)
    }

    /// Open a span nested under `parent`.
    pub fn start_child(&self, parent: &TraceContext, name: &str) -> TraceSpan {
        self.start(name, SpanKind::Internal, parent.child())
    }

    fn start(&self, name: &str, kind: SpanKind, context: TraceContext) -> TraceSpan {
        let span = tracing::info_span!(
            "trace_span",
            span.name = name,
            trace_id = %context.trace_id,
            span_id = %context.span_id,
        );
        TraceSpan {
            open: Some(OpenSpan {
                name: name.to_string(),
                kind,
                start_time: Utc::now(),
                started: Instant::now(),
                attributes: BTreeMap::new(),
                status: SpanStatus::Unset,
            }),
            context,
            span,
            queue: self.queue.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::export::SpanQueue;

    #[test]
    fn test_drop_closes_span() {
        let (queue, mut rx) = SpanQueue::bounded(8);
        let tracer = Tracer::new(queue);
        {
            let mut span = tracer.start_root("/predict", None);
            span.set_attribute("endpoint", "/predict");
        }
        let record = rx.try_recv().unwrap();
        assert_eq!(record.name, "/predict");
        assert_eq!(record.kind, SpanKind::Server);
        assert_eq!(record.status, SpanStatus::Unset);
        assert_eq!(record.attribute("endpoint"), Some(&Value::from("/predict")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_end_submits_once() {
        let (queue, mut rx) = SpanQueue::bounded(8);
        let tracer = Tracer::new(queue);
        let mut span = tracer.start_root("/live_check", None);
        span.set_ok();
        span.end();
        assert_eq!(rx.try_recv().unwrap().status, SpanStatus::Ok);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_child_span_links_to_root() {
        let (queue, mut rx) = SpanQueue::bounded(8);
        let tracer = Tracer::new(queue);
        let root = tracer.start_root("/predict", None);
        let child = tracer.start_child(&root.context(), "model_inference");
        let (root_ctx, child_ctx) = (root.context(), child.context());
        child.end();
        root.end();

        let child_record = rx.try_recv().unwrap();
        let root_record = rx.try_recv().unwrap();
        assert_eq!(child_record.name, "model_inference");
        assert_eq!(child_record.kind, SpanKind::Internal);
        assert_eq!(child_record.context.trace_id, root_record.context.trace_id);
        assert_eq!(child_record.context.parent_span_id, Some(root_ctx.span_id));
        assert_eq!(child_ctx.span_id, child_record.context.span_id);
        assert!(child_record.end_time >= child_record.start_time);
    }

    #[test]
    fn test_error_status_survives_set_ok() {
        let (queue, mut rx) = SpanQueue::bounded(8);
        let mut span = Tracer::new(queue).start_root("/predict", None);
        span.set_error("classifier produced 2 probabilities for 3 classes");
        span.set_ok();
        span.end();
        let record = rx.try_recv().unwrap();
        assert!(record.is_error());
    }

    #[test]
    fn test_remote_parent_is_continued() {
        let remote = TraceContext::new_root();
        let span = Tracer::disabled().start_root("/predict", Some(&remote));
        assert_eq!(span.context().trace_id, remote.trace_id);
        assert_eq!(span.context().parent_span_id, Some(remote.span_id));
    }
}
