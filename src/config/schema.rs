//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default, so an empty file is a valid configuration.
//! A partial `retry` or `breaker` table is merged over its client's preset.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the poller.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Peer service (user directory) client settings.
    pub peer_service: PeerServiceConfig,

    /// Weather feed client settings.
    pub weather: WeatherConfig,

    /// Background worker settings.
    pub worker: WorkerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Peer service client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PeerServiceConfig {
    /// Base address (e.g., "http://127.0.0.1:7000").
    pub base_url: String,

    /// Path of the user collection.
    pub resource_path: String,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Budget for one logical call across all attempts, in seconds.
    pub total_timeout_secs: u64,

    #[serde(deserialize_with = "peer_retry")]
    pub retry: RetryConfig,

    #[serde(deserialize_with = "peer_breaker")]
    pub breaker: BreakerConfig,
}

impl Default for PeerServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7000".to_string(),
            resource_path: "/api/user".to_string(),
            timeout_secs: 30,
            total_timeout_secs: 60,
            retry: RetryConfig {
                max_attempts: 4,
                base_delay_ms: 1_000,
                max_delay_ms: 30_000,
                backoff_factor: 2.0,
                jitter: true,
            },
            breaker: BreakerConfig {
                failure_ratio: 0.5,
                minimum_throughput: 5,
                sampling_window_secs: 10,
                break_duration_secs: 30,
            },
        }
    }
}

/// Weather feed client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    /// Poll the weather feed each cycle.
    pub enabled: bool,

    /// Base address of the feed.
    pub base_url: String,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Budget for one logical call across all attempts, in seconds.
    pub total_timeout_secs: u64,

    /// Cities fetched on every cycle.
    pub cities: Vec<String>,

    #[serde(deserialize_with = "weather_retry")]
    pub retry: RetryConfig,

    #[serde(deserialize_with = "weather_breaker")]
    pub breaker: BreakerConfig,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:7000".to_string(),
            timeout_secs: 30,
            total_timeout_secs: 45,
            cities: vec!["New York".to_string(), "London".to_string(), "Tokyo".to_string()],
            retry: RetryConfig {
                max_attempts: 4,
                base_delay_ms: 1_000,
                max_delay_ms: 10_000,
                backoff_factor: 2.0,
                jitter: true,
            },
            breaker: BreakerConfig {
                failure_ratio: 0.6,
                minimum_throughput: 3,
                sampling_window_secs: 10,
                break_duration_secs: 20,
            },
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt.
    pub backoff_factor: f64,

    /// Randomize each delay by ±25%.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failure ratio (0, 1] at which the circuit opens.
    pub failure_ratio: f64,

    /// Samples required in the window before the ratio is trusted.
    pub minimum_throughput: usize,

    /// Trailing window for the failure ratio, in seconds.
    pub sampling_window_secs: u64,

    /// How long the circuit stays open before a trial call, in seconds.
    pub break_duration_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            minimum_throughput: 5,
            sampling_window_secs: 10,
            break_duration_secs: 30,
        }
    }
}

/// A `retry` table as written; absent keys keep the preset.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryOverrides {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    backoff_factor: Option<f64>,
    jitter: Option<bool>,
}

impl RetryOverrides {
    fn over(self, preset: RetryConfig) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.unwrap_or(preset.max_attempts),
            base_delay_ms: self.base_delay_ms.unwrap_or(preset.base_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(preset.max_delay_ms),
            backoff_factor: self.backoff_factor.unwrap_or(preset.backoff_factor),
            jitter: self.jitter.unwrap_or(preset.jitter),
        }
    }
}

/// A `breaker` table as written; absent keys keep the preset.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BreakerOverrides {
    failure_ratio: Option<f64>,
    minimum_throughput: Option<usize>,
    sampling_window_secs: Option<u64>,
    break_duration_secs: Option<u64>,
}

impl BreakerOverrides {
    fn over(self, preset: BreakerConfig) -> BreakerConfig {
        BreakerConfig {
            failure_ratio: self.failure_ratio.unwrap_or(preset.failure_ratio),
            minimum_throughput: self.minimum_throughput.unwrap_or(preset.minimum_throughput),
            sampling_window_secs: self.sampling_window_secs.unwrap_or(preset.sampling_window_secs),
            break_duration_secs: self.break_duration_secs.unwrap_or(preset.break_duration_secs),
        }
    }
}

fn peer_retry<'de, D: Deserializer<'de>>(d: D) -> Result<RetryConfig, D::Error> {
    Ok(RetryOverrides::deserialize(d)?.over(PeerServiceConfig::default().retry))
}

fn peer_breaker<'de, D: Deserializer<'de>>(d: D) -> Result<BreakerConfig, D::Error> {
    Ok(BreakerOverrides::deserialize(d)?.over(PeerServiceConfig::default().breaker))
}

fn weather_retry<'de, D: Deserializer<'de>>(d: D) -> Result<RetryConfig, D::Error> {
    Ok(RetryOverrides::deserialize(d)?.over(WeatherConfig::default().retry))
}

fn weather_breaker<'de, D: Deserializer<'de>>(d: D) -> Result<BreakerConfig, D::Error> {
    Ok(BreakerOverrides::deserialize(d)?.over(WeatherConfig::default().breaker))
}

/// Background worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Wait between the end of one cycle and the start of the next, in seconds.
    pub interval_secs: u64,

    /// Simulated per-user processing time in milliseconds.
    pub process_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            process_delay_ms: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
