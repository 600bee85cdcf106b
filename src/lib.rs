//! Iris species classification service.
//!
//! Serves a pre-trained classifier over HTTP with readiness gating,
//! structured JSON logging and distributed trace export.

// Core subsystems
pub mod config;
pub mod http;
pub mod inference;
pub mod model;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use inference::{PredictError, PredictionResponse, Predictor};
pub use lifecycle::Shutdown;
pub use model::ModelStore;
