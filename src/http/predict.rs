//! `POST /predict` handler.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Json,
};

use crate::health::Readiness;
use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::inference::{PredictError, ValidationError, ValidationReason};
use crate::observability::{RequestTrace, TraceContext};

pub async fn predict(State(state): State<AppState>, request: Request<Body>) -> Response {
    let trace = request
        .extensions()
        .get::<RequestTrace>()
        .map(|t| t.context)
        .unwrap_or_else(TraceContext::new_root);

    let body = match axum::body::to_bytes(request.into_body(), state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let error = match state.predictor.readiness() {
                Readiness::Ready => PredictError::Validation(ValidationError {
                    field: None,
                    reason: ValidationReason::UnreadableBody(e.to_string()),
                }),
                readiness => PredictError::NotReady(readiness),
            };
            tracing::warn!(
                trace_id = %trace.trace_id,
                span_id = %trace.span_id,
                error_kind = error.kind(),
                error = %e,
                "Request body rejected"
            );
            return error_response(&error, &trace);
        }
    };

    match state.predictor.predict(&trace, &body) {
        Ok(prediction) => Json(prediction).into_response(),
        Err(e) => error_response(&e, &trace),
    }
}
