//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that the chosen exporter has what it needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ConfigViolation>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::schema::{ExporterKind, ServiceConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigViolation {
    /// Dotted path of the offending key.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigViolation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for values that would fail at runtime.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ConfigViolation>> {
    let mut violations = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        violations.push(ConfigViolation::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.model.path.as_os_str().is_empty() {
        violations.push(ConfigViolation::new("model.path", "must not be empty"));
    }

    if config.timeouts.request_secs == 0 {
        violations.push(ConfigViolation::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.security.max_body_size == 0 {
        violations.push(ConfigViolation::new("security.max_body_size", "must be greater than 0"));
    }

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        violations.push(ConfigViolation::new(
            "observability.log_level",
            format!("invalid filter directive: {}", e),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        violations.push(ConfigViolation::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let tracing = &config.tracing;
    if tracing.enabled && tracing.exporter == ExporterKind::Http {
        match tracing.endpoint.as_deref() {
            None => violations.push(ConfigViolation::new(
                "tracing.endpoint",
                "required when exporter = \"http\"",
            )),
            Some(endpoint) => {
                if reqwest::Url::parse(endpoint).is_err() {
                    violations.push(ConfigViolation::new(
                        "tracing.endpoint",
                        format!("'{}' is not a valid URL", endpoint),
                    ));
                }
            }
        }
    }

    if tracing.max_queue_size == 0 {
        violations.push(ConfigViolation::new("tracing.max_queue_size", "must be greater than 0"));
    }
    if tracing.max_batch_size == 0 {
        violations.push(ConfigViolation::new("tracing.max_batch_size", "must be greater than 0"));
    } else if tracing.max_batch_size > tracing.max_queue_size {
        violations.push(ConfigViolation::new(
            "tracing.max_batch_size",
            "must not exceed tracing.max_queue_size",
        ));
    }
    if tracing.scheduled_delay_ms == 0 {
        violations.push(ConfigViolation::new("tracing.scheduled_delay_ms", "must be greater than 0"));
    }
    if tracing.export_timeout_ms == 0 {
        violations.push(ConfigViolation::new("tracing.export_timeout_ms", "must be greater than 0"));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
