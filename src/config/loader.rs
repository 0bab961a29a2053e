//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the peer service base address.
pub const ENV_API_BASE_URL: &str = "POLLER_API_BASE_URL";
/// Overrides the worker interval in seconds.
pub const ENV_INTERVAL_SECS: &str = "POLLER_INTERVAL_SECS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {var}: {value}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Validate a configuration assembled in code (e.g. after CLI overrides).
pub fn validated(config: AppConfig) -> Result<AppConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides, then re-validate.
pub fn apply_env_overrides(config: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_overrides(config, |var| std::env::var(var).ok())
}

fn apply_overrides<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_BASE_URL) {
        config.peer_service.base_url = url;
    }
    if let Some(raw) = lookup(ENV_INTERVAL_SECS) {
        config.worker.interval_secs = raw.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_INTERVAL_SECS,
            value: raw.clone(),
        })?;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
