//! Request tracing middleware.
//!
//! Wraps every route: opens the root span named for the matched route,
//! publishes the trace context to the handler through request extensions,
//! and after the handler returns records the outcome, stamps correlation
//! headers and closes the span.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::http::request::request_id;
use crate::observability::context::{TraceContext, TRACEPARENT, X_TRACE_ID};
use crate::observability::metrics;
use crate::observability::tracing::Tracer;

/// Response header carrying handler latency in milliseconds.
pub const X_PROCESS_TIME_MS: &str = "x-process-time-ms";

/// Metrics label for requests that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Trace context of the request being handled.
#[derive(Debug, Clone)]
pub struct RequestTrace {
    pub context: TraceContext,
    pub endpoint: String,
}

/// Failure details a handler attaches to its response for the root span.
/// Never serialized to the client.
#[derive(Debug, Clone)]
pub struct FailureDetail {
    pub kind: &'static str,
    pub detail: String,
}

pub async fn trace_requests(
    State(tracer): State<Tracer>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());
    let metrics_label = metrics_endpoint(matched.as_deref());
    let endpoint = matched.unwrap_or_else(|| request.uri().path().to_string());
    let remote_parent = remote_parent(request.headers());
    let request_id = request_id(request.headers()).unwrap_or("unknown").to_string();
    let method = request.method().clone();

    let mut span = tracer.start_root(&endpoint, remote_parent.as_ref());
    span.set_attribute("endpoint", endpoint.clone());
    span.set_attribute("http.method", method.as_str());
    span.set_attribute("http.route", endpoint.clone());
    span.set_attribute("request_id", request_id.clone());
    let context = span.context();

    tracing::info!(
        trace_id = %context.trace_id,
        span_id = %context.span_id,
        request_id = %request_id,
        method = %method,
        endpoint = %endpoint,
        "Request received"
    );

    request.extensions_mut().insert(RequestTrace {
        context,
        endpoint: endpoint.clone(),
    });

    let mut response = next
        .run(request)
        .instrument(span.tracing_span().clone())
        .await;

    let status = response.status();
    span.set_attribute("http.status_code", status.as_u16());
    match response.extensions().get::<FailureDetail>() {
        Some(failure) => {
            span.set_attribute("outcome", "error");
            span.set_attribute("error.kind", failure.kind);
            span.set_error(failure.detail.clone());
        }
        None if status.is_client_error() || status.is_server_error() => {
            span.set_attribute("outcome", "error");
            span.set_error(status.to_string());
        }
        None => {
            span.set_attribute("outcome", "success");
            span.set_ok();
        }
    }

    let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
    let headers = response.headers_mut();
    insert_header(headers, TRACEPARENT, &context.traceparent());
    insert_header(headers, X_TRACE_ID, &context.trace_id.to_string());
    insert_header(headers, X_PROCESS_TIME_MS, &format!("{:.2}", elapsed_ms));

    metrics::record_request(&metrics_label, status.as_u16(), start_time);
    span.end();
    response
}

/// Route template used as the metrics label. Raw paths of unmatched
/// requests never become label values.
fn metrics_endpoint(matched: Option<&str>) -> String {
    matched.unwrap_or(UNMATCHED_ENDPOINT).to_string()
}

fn remote_parent(headers: &HeaderMap) -> Option<TraceContext> {
    headers
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok())
        .and_then(TraceContext::from_traceparent)
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
