//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience, clients, worker produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every retry, breaker transition and fallback is a log event with a
//!   `service` field
//! - Metrics are off unless enabled in config

pub mod logging;
pub mod metrics;
