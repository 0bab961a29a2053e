//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and URLs. All errors are
//! collected, not just the first.

use thiserror::Error;
use url::Url;

use crate::config::schema::{AppConfig, BreakerConfig, RetryConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}': {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: base delay {base_ms}ms exceeds max delay {max_ms}ms")]
    DelayOrder {
        field: &'static str,
        base_ms: u64,
        max_ms: u64,
    },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("weather polling is enabled but no cities are configured")]
    NoCities,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url("peer_service.base_url", &config.peer_service.base_url, &mut errors);
    check_nonzero("peer_service.timeout_secs", config.peer_service.timeout_secs, &mut errors);
    check_nonzero(
        "peer_service.total_timeout_secs",
        config.peer_service.total_timeout_secs,
        &mut errors,
    );
    check_retry("peer_service.retry", &config.peer_service.retry, &mut errors);
    check_breaker("peer_service.breaker", &config.peer_service.breaker, &mut errors);

    if config.weather.enabled {
        check_url("weather.base_url", &config.weather.base_url, &mut errors);
        check_nonzero("weather.timeout_secs", config.weather.timeout_secs, &mut errors);
        check_nonzero("weather.total_timeout_secs", config.weather.total_timeout_secs, &mut errors);
        check_retry("weather.retry", &config.weather.retry, &mut errors);
        check_breaker("weather.breaker", &config.weather.breaker, &mut errors);
        if config.weather.cities.is_empty() {
            errors.push(ValidationError::NoCities);
        }
    }

    check_nonzero("worker.interval_secs", config.worker.interval_secs, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn check_nonzero(field: &'static str, value: u64, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}

fn check_retry(field: &'static str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.max_attempts == 0 {
        errors.push(ValidationError::Zero { field });
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::DelayOrder {
            field,
            base_ms: retry.base_delay_ms,
            max_ms: retry.max_delay_ms,
        });
    }
    if !(retry.backoff_factor >= 1.0) {
        errors.push(ValidationError::OutOfRange {
            field,
            value: retry.backoff_factor,
        });
    }
}

fn check_breaker(field: &'static str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    if !(breaker.failure_ratio > 0.0 && breaker.failure_ratio <= 1.0) {
        errors.push(ValidationError::OutOfRange {
            field,
            value: breaker.failure_ratio,
        });
    }
    if breaker.minimum_throughput == 0
        || breaker.sampling_window_secs == 0
        || breaker.break_duration_secs == 0
    {
        errors.push(ValidationError::Zero { field });
    }
}
