//! Prediction errors.

use thiserror::Error;

use crate::health::Readiness;
use crate::inference::request::ValidationError;
use crate::model::InferenceError;

/// Why a prediction was not produced.
#[derive(Debug, Clone, Error)]
pub enum PredictError {
    #[error("model is not ready (readiness: {0})")]
    NotReady(Readiness),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl PredictError {
    /// Stable label used in error bodies, logs, span attributes and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::NotReady(_) => "not_ready",
            PredictError::Validation(_) => "validation_error",
            PredictError::Inference(_) => "inference_error",
        }
    }

    /// Name of the offending request field, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            PredictError::Validation(e) => e.field,
            _ => None,
        }
    }
}
