//! Metrics collection and exposition.
//!
//! # Metrics
//! - `iris_requests_total` (counter): requests by endpoint, status
//! - `iris_request_duration_seconds` (histogram): latency by endpoint
//! - `iris_predictions_total` (counter): predictions by outcome
//! - `iris_inference_duration_seconds` (histogram): time inside the classifier
//! - `iris_readiness` (gauge): 0=initializing, 1=ready, 2=failed
//! - `iris_spans_dropped_total` (counter): spans lost to a full queue
//! - `iris_span_export_failures_total` (counter): failed export calls
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::Readiness;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(endpoint: &str, status: u16, start: Instant) {
    let endpoint = endpoint.to_string();
    metrics::counter!(
        "iris_requests_total",
        "endpoint" => endpoint.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("iris_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_prediction(outcome: &'static str) {
    metrics::counter!("iris_predictions_total", "outcome" => outcome).increment(1);
}

pub fn record_inference_duration(elapsed: Duration) {
    metrics::histogram!("iris_inference_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_readiness(readiness: Readiness) {
    metrics::gauge!("iris_readiness").set(readiness as u8 as f64);
}

pub fn record_span_dropped() {
    metrics::counter!("iris_spans_dropped_total").increment(1);
}

pub fn record_export_failure(exporter: &'static str) {
    metrics::counter!("iris_span_export_failures_total", "exporter" => exporter).increment(1);
}
