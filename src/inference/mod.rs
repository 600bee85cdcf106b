//! Prediction handling.
//!
//! # Data Flow
//! ```text
//! POST /predict body
//!     → predictor.rs (readiness gate)
//!     → request.rs (JSON object, four numeric fields, fixed order)
//!     → model::ModelArtifact::classify (inside `model_inference` span)
//!     → PredictionResponse | PredictError
//! ```
//!
//! # Design Decisions
//! - Readiness short-circuits before the body is even parsed
//! - Client-facing errors carry a stable `kind()`; inference detail stays in
//!   logs and spans

pub mod error;
pub mod predictor;
pub mod request;

pub use error::PredictError;
pub use predictor::{PredictionResponse, Predictor};
pub use request::{PredictionRequest, ValidationError, ValidationReason};
