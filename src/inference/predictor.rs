//! Request-path prediction.
//!
//! # Order of Checks
//! ```text
//! readiness (503) → body validation (400) → model_inference span → classify (500 on failure)
//! ```
//!
//! The predictor is transport-agnostic: it takes the raw body and the
//! caller's trace context and returns either a response payload or a
//! `PredictError`. HTTP mapping lives in `http::response`.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::health::Readiness;
use crate::inference::error::PredictError;
use crate::inference::request::{fields_present, PredictionRequest};
use crate::model::{Classification, InferenceError, ModelStore};
use crate::observability::metrics;
use crate::observability::{TraceContext, Tracer};

/// Successful prediction payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub prediction_index: usize,
    pub confidence: f64,
}

impl From<Classification> for PredictionResponse {
    fn from(c: Classification) -> Self {
        Self {
            prediction: c.label,
            prediction_index: c.index,
            confidence: c.confidence,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Predictor {
    store: Arc<ModelStore>,
    tracer: Tracer,
}

impl Predictor {
    pub fn new(store: Arc<ModelStore>, tracer: Tracer) -> Self {
        Self { store, tracer }
    }

    pub fn readiness(&self) -> Readiness {
        self.store.readiness().get()
    }

    /// Validate `body` and classify it under the request's trace.
    pub fn predict(
        &self,
        trace: &TraceContext,
        body: &[u8],
    ) -> Result<PredictionResponse, PredictError> {
        let start_time = Instant::now();
        let result = self.run(trace, body);
        let latency_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        let input_fields = fields_present(body).join(",");

        match &result {
            Ok(response) => {
                metrics::record_prediction("success");
                tracing::info!(
                    trace_id = %trace.trace_id,
                    span_id = %trace.span_id,
                    input_fields = %input_fields,
                    prediction = %response.prediction,
                    prediction_index = response.prediction_index,
                    confidence = response.confidence,
                    outcome = "success",
                    latency_ms,
                    "Prediction successful"
                );
            }
            Err(e @ PredictError::Inference(_)) => {
                metrics::record_prediction(e.kind());
                tracing::error!(
                    trace_id = %trace.trace_id,
                    span_id = %trace.span_id,
                    input_fields = %input_fields,
                    outcome = "error",
                    error_kind = e.kind(),
                    error = %e,
                    latency_ms,
                    "Prediction failed"
                );
            }
            Err(e) => {
                metrics::record_prediction(e.kind());
                tracing::warn!(
                    trace_id = %trace.trace_id,
                    span_id = %trace.span_id,
                    input_fields = %input_fields,
                    outcome = "error",
                    error_kind = e.kind(),
                    error = %e,
                    field = e.field().unwrap_or(""),
                    latency_ms,
                    "Prediction rejected"
                );
            }
        }
        result
    }

    fn run(&self, trace: &TraceContext, body: &[u8]) -> Result<PredictionResponse, PredictError> {
        let readiness = self.readiness();
        if readiness != Readiness::Ready {
            return Err(PredictError::NotReady(readiness));
        }

        let request = PredictionRequest::from_json_bytes(body)?;
        let features = request.features();

        let mut span = self.tracer.start_child(trace, "model_inference");
        let started = Instant::now();
        let outcome = self
            .store
            .artifact()
            .ok_or(InferenceError::ModelUnavailable)
            .and_then(|artifact| {
                span.set_attribute("model.name", artifact.display_name());
                span.set_attribute("model.classes", artifact.num_classes());
                artifact.classify(&features)
            });
        metrics::record_inference_duration(started.elapsed());

        match outcome {
            Ok(classification) => {
                span.set_attribute("outcome", "success");
                span.set_attribute("prediction.index", classification.index);
                span.set_attribute("prediction.confidence", classification.confidence);
                span.set_ok();
                span.end();
                Ok(classification.into())
            }
            Err(e) => {
                span.set_attribute("outcome", "error");
                span.set_attribute("error.kind", "inference_error");
                span.set_error(e.to_string());
                span.end();
                Err(e.into())
            }
        }
    }
}
