//! Configuration loading from disk and environment.

use std::env;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::config::schema::{BackendConfig, GatewayConfig};
use crate::config::validation::{
    validate_backend_config, validate_gateway_config, ValidationError,
};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {variable}: {message}")]
    Env { variable: String, message: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load the gateway configuration: TOML file when given, defaults otherwise,
/// then environment overrides, then semantic validation.
pub fn load_gateway_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(p) => parse_file(p)?,
        None => GatewayConfig::default(),
    };
    apply_gateway_env(&mut config)?;
    validate_gateway_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the backend server configuration, same precedence as the gateway's.
pub fn load_backend_config(path: Option<&Path>) -> Result<BackendConfig, ConfigError> {
    let mut config = match path {
        Some(p) => parse_file(p)?,
        None => BackendConfig::default(),
    };
    if let Ok(v) = env::var("BACKEND_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    validate_backend_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_gateway_env(config: &mut GatewayConfig) -> Result<(), ConfigError> {
    if let Ok(v) = env::var("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Ok(v) = env::var("BACKEND_HOST") {
        config.backend.host = v;
    }
    if let Ok(v) = env::var("BACKEND_PORT") {
        config.backend.port = v.parse().map_err(|_| ConfigError::Env {
            variable: "BACKEND_PORT".to_string(),
            message: format!("not a port number: {v}"),
        })?;
    }
    if let Ok(v) = env::var("JWKS_URL") {
        config.auth.jwks_url = v;
    }
    if let Ok(v) = env::var("TOKEN_ISSUER") {
        config.auth.issuer = v;
    }
    if let Ok(v) = env::var("TOKEN_AUDIENCE") {
        config.auth.audience = v;
    }
    if let Ok(v) = env::var("TOKEN_SECRET") {
        config.auth.token_secret = v;
    }
    Ok(())
}
