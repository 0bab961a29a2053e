//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every ShutdownSignal observes it
//!     → in-flight calls and backoff waits end as Cancelled
//!     → the worker leaves its inter-cycle wait and stops
//! ```
//!
//! # Design Decisions
//! - The signal is sticky: late subscribers still see a past trigger
//! - No forced exit; every blocking point is bounded by a timeout or the signal

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
