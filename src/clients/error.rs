//! Errors surfaced by the external service clients.

use thiserror::Error;

use crate::resilience::{CallOutcome, FailureKind};

/// A client call that produced neither data nor an authoritative absence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// The breaker for `service` is open; no request was sent.
    #[error("{service} unavailable: circuit open")]
    CircuitOpen { service: String },

    /// Every attempt failed transiently.
    #[error("{service} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        service: String,
        attempts: u32,
        last_error: String,
    },

    /// Malformed payload or client-side error.
    #[error("{service} call failed: {message}")]
    NonRetryable { service: String, message: String },

    #[error("{service} call cancelled")]
    Cancelled { service: String },

    /// Bad client setup (base URL, TLS backend).
    #[error("client configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Translate a failed outcome. Returns `None` for successes.
    pub fn from_outcome<T>(service: &str, outcome: &CallOutcome<T>) -> Option<Self> {
        let CallOutcome::Failure {
            kind,
            attempts,
            last_error,
        } = outcome
        else {
            return None;
        };
        let service = service.to_string();
        Some(match kind {
            FailureKind::CircuitOpen => ClientError::CircuitOpen { service },
            FailureKind::TransientExhausted => ClientError::Exhausted {
                service,
                attempts: *attempts,
                last_error: last_error.clone(),
            },
            FailureKind::NonRetryable => ClientError::NonRetryable {
                service,
                message: last_error.clone(),
            },
            FailureKind::Cancelled => ClientError::Cancelled { service },
        })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled { .. })
    }

    /// Breaker-open or retries exhausted: the dependency is unavailable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::CircuitOpen { .. } | ClientError::Exhausted { .. })
    }
}
