//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check the JWKS URL is a URL before the startup fetch depends on it
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::{BackendConfig, GatewayConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a gateway configuration.
pub fn validate_gateway_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }
    if config.backend.host.is_empty() {
        errors.push(ValidationError::new("backend.host", "must not be empty"));
    }
    if config.backend.port == 0 {
        errors.push(ValidationError::new("backend.port", "must not be zero"));
    }
    if config.backend.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("backend.rpc_timeout_secs", "must not be zero"));
    }
    if let Err(e) = Url::parse(&config.auth.jwks_url) {
        errors.push(ValidationError::new(
            "auth.jwks_url",
            format!("not a valid URL: {e}"),
        ));
    }
    if config.auth.token_secret.is_empty() {
        errors.push(ValidationError::new("auth.token_secret", "must not be empty"));
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token_ttl_secs", "must not be zero"));
    }
    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "breaker.failure_threshold",
            "must be at least 1",
        ));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.max_delay_ms < config.retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must be >= retries.base_delay_ms",
        ));
    }
    if config.monitor.interval_secs == 0 {
        errors.push(ValidationError::new("monitor.interval_secs", "must be at least 1"));
    }
    if config.monitor.probe_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "monitor.probe_timeout_secs",
            "must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a backend server configuration.
pub fn validate_backend_config(config: &BackendConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
