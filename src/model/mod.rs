//! Model subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     artifact file (JSON)
//!     → artifact.rs (parse, schema checks)
//!     → store.rs (publish Arc<ModelArtifact>, readiness → Ready | Failed)
//!
//! Per request:
//!     store.rs (artifact(), only when Ready)
//!     → artifact.rs (predict_proba → arg-max → label)
//! ```
//!
//! # Design Decisions
//! - The artifact is immutable after load and shared via `Arc`
//! - Class index → label comes from the artifact's `classes` order
//! - Incompatible artifacts fail at load time, not on first request

pub mod artifact;
pub mod error;
pub mod store;

pub use artifact::{
    Classification, Classifier, FeatureVector, ModelArtifact, FEATURE_COUNT, FEATURE_NAMES,
};
pub use error::{InferenceError, LoadError, SchemaError};
pub use store::ModelStore;
