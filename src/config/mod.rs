//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → environment overrides (base URL, interval)
//!     → AppConfig (validated, immutable)
//!     → handed to the clients and the worker as plain values
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, parse_config, validated, ConfigError};
pub use schema::{
    AppConfig, BreakerConfig, ObservabilityConfig, PeerServiceConfig, RetryConfig, WeatherConfig,
    WorkerConfig,
};
pub use validation::ValidationError;
