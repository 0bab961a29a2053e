//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → circuit_breaker.rs (fail fast while open, single half-open trial)
//!     → policy.rs (per-attempt timeout, classify the attempt)
//!     → On transient failure: backoff.rs (wait, then retry)
//!     → window.rs (record the sample, evaluate the failure ratio)
//!     → outcome.rs (one CallOutcome per logical call)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - "Not found" is an answer, not a failure: no retry, no breaker sample
//! - One policy (and breaker) per external dependency, never process-wide
//! - Shutdown pre-empts attempts and backoff waits

pub mod backoff;
pub mod circuit_breaker;
pub mod outcome;
pub mod policy;
pub mod window;

pub use backoff::RetryPlan;
pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use outcome::{AttemptError, CallOutcome, FailureKind};
pub use policy::ResilientCallPolicy;
pub use window::FailureWindow;
