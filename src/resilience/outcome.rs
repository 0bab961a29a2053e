//! Outcome taxonomy for resilient calls.

use std::fmt;

use thiserror::Error;

/// Classification of a single attempt that did not produce a value.
///
/// Produced by the operation passed to the policy. `NotFound` is an
/// authoritative empty answer, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The dependency answered that the resource does not exist.
    #[error("not found")]
    NotFound,

    /// Timeout, connection failure or server-side error. Retryable.
    #[error("transient: {0}")]
    Transient(String),

    /// Malformed payload or client error. Never retried, counts toward the breaker.
    #[error("non-retryable: {0}")]
    NonRetryable(String),

    /// Validation rejection of a request we sent. Never retried, and not
    /// held against the dependency's breaker.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl AttemptError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AttemptError::Transient(_))
    }
}

/// Why a logical call ultimately failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Every attempt failed transiently (or the half-open trial failed).
    TransientExhausted,
    /// A non-transient error ended the call on its first occurrence.
    NonRetryable,
    /// The breaker was open; no attempt was made.
    CircuitOpen,
    /// The shutdown signal fired while the call was in flight or backing off.
    Cancelled,
}

impl FailureKind {
    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientExhausted => "transient_exhausted",
            FailureKind::NonRetryable => "non_retryable",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one logical call, after all retries.
///
/// `value` is `None` when the dependency answered "not found".
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success {
        value: Option<T>,
        /// One-based number of the attempt that succeeded.
        attempt: u32,
    },
    Failure {
        kind: FailureKind,
        attempts: u32,
        last_error: String,
    },
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CallOutcome::Success { .. } => None,
            CallOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Number of attempts the call consumed.
    pub fn attempts(&self) -> u32 {
        match self {
            CallOutcome::Success { attempt, .. } => *attempt,
            CallOutcome::Failure { attempts, .. } => *attempts,
        }
    }

    pub fn map<U, F>(self, f: F) -> CallOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            CallOutcome::Success { value, attempt } => CallOutcome::Success {
                value: value.map(f),
                attempt,
            },
            CallOutcome::Failure {
                kind,
                attempts,
                last_error,
            } => CallOutcome::Failure {
                kind,
                attempts,
                last_error,
            },
        }
    }
}
