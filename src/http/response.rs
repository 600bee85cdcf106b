//! Response construction.
//!
//! # Responsibilities
//! - Map `PredictError` to status codes and the JSON error body
//! - Attach failure details for the root span
//!
//! # Design Decisions
//! - Inference failures surface as a generic "Prediction failed"; the
//!   diagnostic stays in logs and spans
//! - `Retry-After` only while the model is still loading

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::health::Readiness;
use crate::inference::PredictError;
use crate::observability::{FailureDetail, TraceContext};

/// Seconds a client should wait before retrying while the model loads.
pub const RETRY_AFTER_SECS: u64 = 5;

const GENERIC_INFERENCE_DETAIL: &str = "Prediction failed";

/// JSON error body returned for every failed prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub trace_id: String,
}

pub fn status_for(error: &PredictError) -> StatusCode {
    match error {
        PredictError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        PredictError::Validation(_) => StatusCode::BAD_REQUEST,
        PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the client response for `error` within the request's trace.
pub fn error_response(error: &PredictError, trace: &TraceContext) -> Response {
    let detail = match error {
        PredictError::Inference(_) => GENERIC_INFERENCE_DETAIL.to_string(),
        PredictError::NotReady(readiness) => {
            format!("Model not ready ({}), retry later", readiness)
        }
        PredictError::Validation(e) => e.to_string(),
    };
    let body = ErrorBody {
        error: error.kind().to_string(),
        detail,
        field: error.field().map(str::to_string),
        trace_id: trace.trace_id.to_string(),
    };

    let mut response = (status_for(error), Json(body)).into_response();
    if matches!(error, PredictError::NotReady(Readiness::Initializing)) {
        insert_retry_after(&mut response);
    }
    response.extensions_mut().insert(FailureDetail {
        kind: error.kind(),
        detail: error.to_string(),
    });
    response
}

pub fn insert_retry_after(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
}
