//! Model loading and inference errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::health::Readiness;

/// Why an artifact was rejected as incompatible.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("feature names {found:?} do not match expected {expected:?}")]
    FeatureMismatch { expected: Vec<String>, found: Vec<String> },

    #[error("artifact declares no classes")]
    NoClasses,

    #[error("class label '{0}' appears more than once")]
    DuplicateLabel(String),

    #[error("{what} has {found} entries, expected {expected}")]
    Dimension {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{0} contains a non-finite value")]
    NonFinite(&'static str),

    #[error("variance for class {class}, feature {feature} must be positive")]
    NonPositiveVariance { class: usize, feature: usize },

    #[error("class prior for class {0} must be positive")]
    NonPositivePrior(usize),
}

/// Failure to bring the model store to Ready.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model artifact not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("incompatible model artifact: {0}")]
    Schema(#[from] SchemaError),

    #[error("model store already initialized (readiness: {0})")]
    AlreadyInitialized(Readiness),
}

impl LoadError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NotFound { .. } => "artifact_not_found",
            LoadError::Io { .. } => "artifact_io",
            LoadError::Parse(_) => "artifact_parse",
            LoadError::Schema(_) => "artifact_schema",
            LoadError::AlreadyInitialized(_) => "already_initialized",
        }
    }
}

/// Server-side failure while computing a prediction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("model reported ready but no artifact is installed")]
    ModelUnavailable,

    #[error("classifier produced {found} probabilities for {expected} classes")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("probability for class {index} is not a finite value in [0, 1]")]
    InvalidProbability { index: usize },

    #[error("class probabilities sum to {sum}, expected 1")]
    NotNormalized { sum: f64 },

    #[error("class index {0} has no label")]
    UnknownClassIndex(usize),
}
