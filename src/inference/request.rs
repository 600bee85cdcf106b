//! Prediction request schema.
//!
//! The body is parsed as untyped JSON first so that a bad field can be
//! reported by name, then each of the fixed fields is checked in order.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{FeatureVector, FEATURE_NAMES};

/// Largest accepted absolute measurement. Anything beyond it can overflow
/// the classifier's scores.
pub const MAX_FEATURE_MAGNITUDE: f64 = 1.0e6;

/// Validated prediction input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

/// What was wrong with the request.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationReason {
    UnreadableBody(String),
    MalformedBody(String),
    NotAnObject,
    Missing,
    NotNumeric,
    NonFinite,
    OutOfRange,
}

/// A client-caused request error, optionally naming the offending field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: Option<&'static str>,
    pub reason: ValidationReason,
}

impl ValidationError {
    fn body(reason: ValidationReason) -> Self {
        Self { field: None, reason }
    }

    fn field(field: &'static str, reason: ValidationReason) -> Self {
        Self {
            field: Some(field),
            reason,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, self.field) {
            (ValidationReason::UnreadableBody(e), _) => {
                write!(f, "request body could not be read: {}", e)
            }
            (ValidationReason::MalformedBody(e), _) => {
                write!(f, "request body is not valid JSON: {}", e)
            }
            (ValidationReason::NotAnObject, _) => write!(f, "request body must be a JSON object"),
            (ValidationReason::Missing, Some(field)) => write!(f, "field `{}` is required", field),
            (ValidationReason::NotNumeric, Some(field)) => {
                write!(f, "field `{}` must be a number", field)
            }
            (ValidationReason::NonFinite, Some(field)) => {
                write!(f, "field `{}` must be a finite number", field)
            }
            (ValidationReason::OutOfRange, Some(field)) => write!(
                f,
                "field `{}` must be between -{:e} and {:e}",
                field, MAX_FEATURE_MAGNITUDE, MAX_FEATURE_MAGNITUDE
            ),
            (_, None) => write!(f, "invalid request"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl PredictionRequest {
    /// Parse and validate a raw request body.
    pub fn from_json_bytes(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::body(ValidationReason::MalformedBody(e.to_string())))?;
        Self::from_value(&value)
    }

    /// Validate an already-parsed body. The first offending field, in
    /// feature order, is reported.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::body(ValidationReason::NotAnObject))?;

        let mut features = [0.0; FEATURE_NAMES.len()];
        for (slot, name) in features.iter_mut().zip(FEATURE_NAMES) {
            *slot = numeric_field(object, name)?;
        }
        let [sepal_length, sepal_width, petal_length, petal_width] = features;

        Ok(Self {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
        })
    }

    /// Feature vector in the order the classifier was trained on.
    pub fn features(&self) -> FeatureVector {
        [
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }
}

fn numeric_field(object: &Map<String, Value>, name: &'static str) -> Result<f64, ValidationError> {
    let number = match object.get(name) {
        None | Some(Value::Null) => {
            return Err(ValidationError::field(name, ValidationReason::Missing));
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
    .ok_or_else(|| ValidationError::field(name, ValidationReason::NotNumeric))?;

    if !number.is_finite() {
        return Err(ValidationError::field(name, ValidationReason::NonFinite));
    }
    if number.abs() > MAX_FEATURE_MAGNITUDE {
        return Err(ValidationError::field(name, ValidationReason::OutOfRange));
    }
    Ok(number)
}

/// Which of the expected fields a raw body carries, for logging.
pub fn fields_present(body: &[u8]) -> Vec<&'static str> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => FEATURE_NAMES
            .into_iter()
            .filter(|name| object.get(*name).is_some_and(|v| !v.is_null()))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_request_in_feature_order() {
        let request = PredictionRequest::from_value(&json!({
            "petal_width": 0.2,
            "sepal_length": 5.1,
            "petal_length": 1.4,
            "sepal_width": 3.5,
            "extra": "ignored"
        }))
        .unwrap();
        assert_eq!(request.features(), [5.1, 3.5, 1.4, 0.2]);
    }

    #[test]
    fn test_integers_and_numeric_strings_accepted() {
        let request = PredictionRequest::from_value(&json!({
            "sepal_length": 5,
            "sepal_width": "3.5",
            "petal_length": " 1.4 ",
            "petal_width": 0
        }))
        .unwrap();
        assert_eq!(request.features(), [5.0, 3.5, 1.4, 0.0]);
    }

    #[test]
    fn test_missing_field_named() {
        let err = PredictionRequest::from_value(&json!({
            "sepal_length": 5.1,
            "petal_length": 1.4,
            "petal_width": 0.2
        }))
        .unwrap_err();
        assert_eq!(err.field, Some("sepal_width"));
        assert_eq!(err.to_string(), "field `sepal_width` is required");
    }

    #[test]
    fn test_null_counts_as_missing() {
        let err = PredictionRequest::from_value(&json!({
            "sepal_length": null, "sepal_width": 3.5, "petal_length": 1.4, "petal_width": 0.2
        }))
        .unwrap_err();
        assert_eq!(err, ValidationError::field("sepal_length", ValidationReason::Missing));
    }

    #[test]
    fn test_non_numeric_field_named() {
        for bad in [json!("wide"), json!(true), json!([1.0]), json!({"v": 1}), json!("NaN"), json!("inf")] {
            let err = PredictionRequest::from_value(&json!({
                "sepal_length": 5.1, "sepal_width": 3.5, "petal_length": bad, "petal_width": 0.2
            }))
            .unwrap_err();
            assert_eq!(err.field, Some("petal_length"), "{err}");
        }
    }

    #[test]
    fn test_huge_values_out_of_range() {
        let err = PredictionRequest::from_value(&json!({
            "sepal_length": 5.1, "sepal_width": 1e308, "petal_length": -1e308, "petal_width": 0.2
        }))
        .unwrap_err();
        assert_eq!(err, ValidationError::field("sepal_width", ValidationReason::OutOfRange));
        assert_eq!(err.to_string(), "field `sepal_width` must be between -1e6 and 1e6");

        let request = PredictionRequest::from_value(&json!({
            "sepal_length": MAX_FEATURE_MAGNITUDE, "sepal_width": -MAX_FEATURE_MAGNITUDE,
            "petal_length": 0.0, "petal_width": "1e6"
        }))
        .unwrap();
        assert_eq!(request.petal_width, MAX_FEATURE_MAGNITUDE);
    }

    #[test]
    fn test_body_level_errors() {
        let err = PredictionRequest::from_json_bytes(b"{not json").unwrap_err();
        assert!(matches!(err.reason, ValidationReason::MalformedBody(_)));
        assert_eq!(err.field, None);

        let err = PredictionRequest::from_json_bytes(b"[5.1, 3.5, 1.4, 0.2]").unwrap_err();
        assert_eq!(err.reason, ValidationReason::NotAnObject);
    }

    #[test]
    fn test_fields_present() {
        assert_eq!(
            fields_present(br#"{"sepal_length": 1, "petal_width": null, "petal_length": "x"}"#),
            vec!["sepal_length", "petal_length"]
        );
        assert!(fields_present(b"garbage").is_empty());
    }
}
