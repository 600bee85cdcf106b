//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Render every event as one JSON line on stdout
//! - Stamp each record with the active trace id and span id
//!
//! # Record Layout
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.000000Z","severity":"INFO",
//!  "message":"Prediction successful","target":"iris_serve::inference::predictor",
//!  "trace_id":"4bf9...","span_id":"00f0...","fields":{"latency_ms":0.21,...}}
//! ```
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Explicit `trace_id`/`span_id` event fields win over the enclosing span's
//! - Log level configurable via config and environment

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, ObservabilityConfig};

const TRACE_ID: &str = "trace_id";
const SPAN_ID: &str = "span_id";
const MESSAGE: &str = "message";

/// Failure to install the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the process-wide subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(JsonLogLayer::new(std::io::stdout)).try_init()?,
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }
    Ok(())
}

/// Map a `tracing` level to the severity names log collectors expect.
fn severity(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Correlation ids captured from a span's fields at creation.
#[derive(Debug, Clone)]
struct CorrelationIds {
    trace_id: String,
    span_id: String,
}

#[derive(Default)]
struct CorrelationVisitor {
    trace_id: Option<String>,
    span_id: Option<String>,
}

impl CorrelationVisitor {
    fn capture(&mut self, field: &Field, value: String) {
        match field.name() {
            TRACE_ID => self.trace_id = Some(value),
            SPAN_ID => self.span_id = Some(value),
            _ => {}
        }
    }
}

impl Visit for CorrelationVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.capture(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.capture(field, format!("{:?}", value));
    }
}

/// Collects an event's fields into a JSON map.
#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        match field.name() {
            MESSAGE => {
                self.message = Some(match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                });
            }
            TRACE_ID => self.trace_id = Some(value_to_string(value)),
            SPAN_ID => self.span_id = Some(value_to_string(value)),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Visit for JsonVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.insert(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

/// Layer writing newline-delimited JSON records.
pub struct JsonLogLayer<W> {
    make_writer: W,
    write_failed: AtomicBool,
}

impl<W> JsonLogLayer<W>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    pub fn new(make_writer: W) -> Self {
        Self {
            make_writer,
            write_failed: AtomicBool::new(false),
        }
    }

    /// Write one rendered record. The first failed write is reported on
    /// stderr; later failures drop the record quietly.
    fn write_record(&self, mut writer: impl Write, line: &[u8]) {
        if let Err(e) = writer.write_all(line) {
            if !self.write_failed.swap(true, Ordering::Relaxed) {
                eprintln!("iris-serve: log sink write failed, dropping records: {}", e);
            }
        }
    }
}

impl<S, W> Layer<S> for JsonLogLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = CorrelationVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(trace_id), Some(span_id)) = (visitor.trace_id, visitor.span_id) {
            if let Some(span) = ctx.span(id) {
                span.extensions_mut()
                    .insert(CorrelationIds { trace_id, span_id });
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let inherited = if visitor.trace_id.is_none() || visitor.span_id.is_none() {
            ctx.event_scope(event).and_then(|mut scope| {
                scope.find_map(|span| span.extensions().get::<CorrelationIds>().cloned())
            })
        } else {
            None
        };
        let trace_id = visitor
            .trace_id
            .take()
            .or_else(|| inherited.as_ref().map(|ids| ids.trace_id.clone()));
        let span_id = visitor
            .span_id
            .take()
            .or_else(|| inherited.map(|ids| ids.span_id));

        let meta = event.metadata();
        let mut record = Map::new();
        record.insert(
            "timestamp".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        record.insert("severity".into(), Value::from(severity(meta.level())));
        record.insert(
            MESSAGE.into(),
            Value::from(visitor.message.take().unwrap_or_default()),
        );
        record.insert("target".into(), Value::from(meta.target()));
        if let Some(trace_id) = trace_id {
            record.insert(TRACE_ID.into(), Value::from(trace_id));
        }
        if let Some(span_id) = span_id {
            record.insert(SPAN_ID.into(), Value::from(span_id));
        }
        if !visitor.fields.is_empty() {
            record.insert("fields".into(), Value::Object(visitor.fields));
        }

        let Ok(mut line) = serde_json::to_vec(&Value::Object(record)) else {
            return;
        };
        line.push(b'\n');
        self.write_record(self.make_writer.make_writer_for(meta), &line);
    }
}

/// In-memory log sink. Plug it into `JsonLogLayer` to inspect records.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written so far, parsed.
    pub fn records(&self) -> Vec<Value> {
        let bytes = self.bytes.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut bytes) = self.bytes.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
