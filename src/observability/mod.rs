//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → middleware.rs (root span, correlation headers)
//!     → context.rs (trace id / span id, W3C traceparent)
//!     → tracing.rs (spans with correlation IDs)
//!     → export.rs (batched, asynchronous delivery)
//!
//! All subsystems produce:
//!     → logging.rs (structured JSON log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (NDJSON on stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Trace collector (HTTP push)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows through every log record of a request
//! - Metrics are cheap (atomic increments)
//! - Span export never sits on the response path

pub mod context;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod tracing;

pub use context::{SpanId, TraceContext, TraceId};
pub use export::{
    BatchConfig, BatchSpanProcessor, ExportError, HttpSpanExporter, InMemorySpanExporter,
    LogSpanExporter, SpanExporter, SpanQueue,
};
pub use logging::{init_logging, JsonLogLayer, LogBuffer, LoggingError};
pub use middleware::{trace_requests, FailureDetail, RequestTrace};
pub use self::tracing::{SpanKind, SpanRecord, SpanStatus, TraceSpan, Tracer};
