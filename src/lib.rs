//! Resilient polling worker library.
//!
//! A long-running worker periodically fetches data from a peer HTTP service
//! and an optional weather feed. Every outbound call goes through a
//! per-dependency policy: per-attempt timeout, retry with exponential
//! backoff and jitter, and a circuit breaker driven by the failure ratio.

pub mod clients;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod worker;

pub use clients::{PeerServiceClient, WeatherClient};
pub use config::AppConfig;
pub use lifecycle::Shutdown;
pub use resilience::ResilientCallPolicy;
pub use worker::PollingWorker;
