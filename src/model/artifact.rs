//! Serialized classifier artifact.
//!
//! An artifact is a JSON document carrying the ordered feature names, the
//! class labels (list position = class index) and the parameters of one of
//! the supported classifier kinds:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "feature_names": ["sepal_length", "sepal_width", "petal_length", "petal_width"],
//!   "classes": ["setosa", "versicolor", "virginica"],
//!   "classifier": { "kind": "logistic_regression", "coefficients": [[...]], "intercepts": [...] }
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::error::{InferenceError, LoadError, SchemaError};

/// Artifact layout understood by this build.
pub const SUPPORTED_FORMAT_VERSION: u32 = 1;

pub const FEATURE_COUNT: usize = 4;

/// Feature order every artifact must be trained on.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["sepal_length", "sepal_width", "petal_length", "petal_width"];

/// Input to the classifier, in `FEATURE_NAMES` order.
pub type FeatureVector = [f64; FEATURE_COUNT];

const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// Model parameters, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    /// Multinomial logistic regression; probabilities via softmax.
    LogisticRegression {
        /// `coefficients[class][feature]`.
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
    /// Gaussian naive Bayes with per-class feature means and variances.
    GaussianNaiveBayes {
        class_priors: Vec<f64>,
        means: Vec<Vec<f64>>,
        variances: Vec<Vec<f64>>,
    },
}

/// A trained classifier plus its metadata.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    #[serde(default)]
    pub name: Option<String>,
    pub feature_names: Vec<String>,
    /// Class index → label.
    pub classes: Vec<String>,
    pub classifier: Classifier,
}

/// Outcome of a single classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub index: usize,
    pub label: String,
    /// Maximum class probability.
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

impl ModelArtifact {
    /// Parse and validate an artifact.
    pub fn from_json(bytes: &[u8]) -> Result<Self, LoadError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Display name for logs and span attributes.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(match self.classifier {
            Classifier::LogisticRegression { .. } => "logistic_regression",
            Classifier::GaussianNaiveBayes { .. } => "gaussian_naive_bayes",
        })
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Check the artifact against the schema this service serves.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(SchemaError::UnsupportedVersion {
                found: self.format_version,
                supported: SUPPORTED_FORMAT_VERSION,
            });
        }

        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(SchemaError::FeatureMismatch {
                expected: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                found: self.feature_names.clone(),
            });
        }

        if self.classes.is_empty() {
            return Err(SchemaError::NoClasses);
        }
        let mut seen = HashSet::new();
        for label in &self.classes {
            if !seen.insert(label.as_str()) {
                return Err(SchemaError::DuplicateLabel(label.clone()));
            }
        }

        let n = self.classes.len();
        match &self.classifier {
            Classifier::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                check_matrix("coefficients", coefficients, n)?;
                check_len("intercepts", intercepts.len(), n)?;
                check_finite("intercepts", intercepts)?;
            }
            Classifier::GaussianNaiveBayes {
                class_priors,
                means,
                variances,
            } => {
                check_len("class_priors", class_priors.len(), n)?;
                check_finite("class_priors", class_priors)?;
                if let Some(i) = class_priors.iter().position(|p| *p <= 0.0) {
                    return Err(SchemaError::NonPositivePrior(i));
                }
                check_matrix("means", means, n)?;
                check_matrix("variances", variances, n)?;
                for (class, row) in variances.iter().enumerate() {
                    if let Some(feature) = row.iter().position(|v| *v <= 0.0) {
                        return Err(SchemaError::NonPositiveVariance { class, feature });
                    }
                }
            }
        }

        Ok(())
    }

    /// Class probabilities for one feature vector, in class-index order.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, InferenceError> {
        let n = self.classes.len();
        let probabilities = match &self.classifier {
            Classifier::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                ensure_shape(coefficients.len(), n)?;
                ensure_shape(intercepts.len(), n)?;
                let scores = coefficients
                    .iter()
                    .zip(intercepts)
                    .map(|(row, bias)| {
                        ensure_shape(row.len(), FEATURE_COUNT)?;
                        Ok(bias + dot(row, features))
                    })
                    .collect::<Result<Vec<_>, InferenceError>>()?;
                softmax(&scores)
            }
            Classifier::GaussianNaiveBayes {
                class_priors,
                means,
                variances,
            } => {
                ensure_shape(class_priors.len(), n)?;
                ensure_shape(means.len(), n)?;
                ensure_shape(variances.len(), n)?;
                let log_joint = class_priors
                    .iter()
                    .zip(means.iter().zip(variances))
                    .map(|(prior, (mu, var))| {
                        ensure_shape(mu.len(), FEATURE_COUNT)?;
                        ensure_shape(var.len(), FEATURE_COUNT)?;
                        Ok(prior.ln() + gaussian_log_likelihood(features, mu, var))
                    })
                    .collect::<Result<Vec<_>, InferenceError>>()?;
                softmax(&log_joint)
            }
        };

        check_distribution(&probabilities, n)?;
        Ok(probabilities)
    }

    /// Predict the most likely class. Ties resolve to the lowest index.
    pub fn classify(&self, features: &FeatureVector) -> Result<Classification, InferenceError> {
        let probabilities = self.predict_proba(features)?;
        let (index, confidence) = arg_max(&probabilities).ok_or(InferenceError::ShapeMismatch {
            expected: self.classes.len(),
            found: 0,
        })?;
        let label = self
            .label(index)
            .ok_or(InferenceError::UnknownClassIndex(index))?
            .to_string();

        Ok(Classification {
            index,
            label,
            confidence,
            probabilities,
        })
    }
}

fn check_len(what: &'static str, found: usize, expected: usize) -> Result<(), SchemaError> {
    if found == expected {
        Ok(())
    } else {
        Err(SchemaError::Dimension {
            what,
            expected,
            found,
        })
    }
}

fn check_finite(what: &'static str, values: &[f64]) -> Result<(), SchemaError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SchemaError::NonFinite(what))
    }
}

fn check_matrix(what: &'static str, rows: &[Vec<f64>], classes: usize) -> Result<(), SchemaError> {
    check_len(what, rows.len(), classes)?;
    for row in rows {
        check_len(what, row.len(), FEATURE_COUNT)?;
        check_finite(what, row)?;
    }
    Ok(())
}

fn ensure_shape(found: usize, expected: usize) -> Result<(), InferenceError> {
    if found == expected {
        Ok(())
    } else {
        Err(InferenceError::ShapeMismatch { expected, found })
    }
}

fn dot(weights: &[f64], features: &FeatureVector) -> f64 {
    weights.iter().zip(features).map(|(w, x)| w * x).sum()
}

fn gaussian_log_likelihood(features: &FeatureVector, means: &[f64], variances: &[f64]) -> f64 {
    features
        .iter()
        .zip(means.iter().zip(variances))
        .map(|(x, (mu, var))| {
            -0.5 * (2.0 * std::f64::consts::PI * var).ln() - (x - mu).powi(2) / (2.0 * var)
        })
        .sum()
}

/// Numerically stable softmax. Non-finite scores propagate as NaN and are
/// caught by `check_distribution`.
fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn check_distribution(probabilities: &[f64], classes: usize) -> Result<(), InferenceError> {
    ensure_shape(probabilities.len(), classes)?;
    if let Some(index) = probabilities
        .iter()
        .position(|p| !p.is_finite() || *p < 0.0 || *p > 1.0 + NORMALIZATION_TOLERANCE)
    {
        return Err(InferenceError::InvalidProbability { index });
    }
    let sum: f64 = probabilities.iter().sum();
    if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
        return Err(InferenceError::NotNormalized { sum });
    }
    Ok(())
}

fn arg_max(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}
