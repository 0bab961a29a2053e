//! Weather feed client.
//!
//! Weather is non-critical: when the feed is unavailable (breaker open or
//! retries exhausted) the client serves a locally synthesized record,
//! tagged [`Sourced::Synthetic`], instead of an error. Malformed payloads
//! and cancellation are still surfaced.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::clients::error::ClientError;
use crate::clients::transport::HttpTransport;
use crate::clients::types::{unix_now, Sourced, WeatherData, WeatherReport};
use crate::config::WeatherConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::{CallOutcome, FailureKind, ResilientCallPolicy, RetryPlan};

/// Service name used in logs, metrics and errors.
pub const WEATHER_SERVICE: &str = "weather_feed";

/// Path of the current-conditions endpoint.
const CURRENT_PATH: &str = "/current";

const SYNTHETIC_DESCRIPTIONS: [&str; 5] = ["Sunny", "Partly cloudy", "Cloudy", "Light rain", "Clear"];

/// HTTP client for the weather feed.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    transport: HttpTransport,
    policy: Arc<ResilientCallPolicy>,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, ClientError> {
        let policy = ResilientCallPolicy::new(
            WEATHER_SERVICE,
            Duration::from_secs(config.timeout_secs),
            RetryPlan::from(&config.retry),
            (&config.breaker).into(),
        )
        .with_total_timeout(Duration::from_secs(config.total_timeout_secs));
        Self::with_policy(&config.base_url, Arc::new(policy))
    }

    pub fn with_policy(base_url: &str, policy: Arc<ResilientCallPolicy>) -> Result<Self, ClientError> {
        Ok(Self {
            transport: HttpTransport::new(base_url)?,
            policy,
        })
    }

    pub fn policy(&self) -> &ResilientCallPolicy {
        &self.policy
    }

    /// Current conditions for `city`.
    ///
    /// `Ok(None)` when the feed does not know the city. Unavailability
    /// yields `Ok(Some(Sourced::Synthetic(..)))`.
    pub async fn fetch_weather(
        &self,
        city: &str,
        cancel: &ShutdownSignal,
    ) -> Result<Option<Sourced<WeatherData>>, ClientError> {
        tracing::info!(city, "Fetching weather");

        let query = [("city", city)];
        let outcome = self
            .policy
            .execute(
                || self.transport.get_json::<WeatherReport>(CURRENT_PATH, &query),
                cancel,
            )
            .await;

        match outcome {
            CallOutcome::Success { value: Some(report), .. } => {
                let data = WeatherData::from(report);
                tracing::info!(
                    location = %data.location,
                    temperature = data.temperature,
                    description = %data.description,
                    "Fetched weather"
                );
                Ok(Some(Sourced::Real(data)))
            }
            CallOutcome::Success { value: None, .. } => {
                tracing::warn!(city, "Weather not found");
                Ok(None)
            }
            CallOutcome::Failure {
                kind: kind @ (FailureKind::CircuitOpen | FailureKind::TransientExhausted),
                ref last_error,
                ..
            } => {
                tracing::warn!(
                    service = WEATHER_SERVICE,
                    city,
                    reason = kind.as_str(),
                    error = %last_error,
                    "Weather feed unavailable, serving synthetic data"
                );
                metrics::record_fallback(WEATHER_SERVICE);
                Ok(Some(Sourced::Synthetic(synthesize(city))))
            }
            CallOutcome::Failure { .. } => {
                let err = ClientError::from_outcome(WEATHER_SERVICE, &outcome).unwrap_or(ClientError::NonRetryable {
                    service: WEATHER_SERVICE.to_string(),
                    message: "unclassified failure".to_string(),
                });
                tracing::error!(city, error = %err, "Weather call failed");
                Err(err)
            }
        }
    }

    /// Fetch each city in turn, keeping real and synthetic records.
    ///
    /// Unknown cities and failed calls are skipped; one city never aborts
    /// the rest, except that cancellation stops the sweep.
    pub async fn fetch_weather_for_cities<S>(&self, cities: &[S], cancel: &ShutdownSignal) -> Vec<Sourced<WeatherData>>
    where
        S: AsRef<str>,
    {
        let mut results = Vec::with_capacity(cities.len());
        for city in cities {
            let city = city.as_ref();
            match self.fetch_weather(city, cancel).await {
                Ok(Some(data)) => results.push(data),
                Ok(None) => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => tracing::warn!(city, error = %e, "Skipping city"),
            }
        }

        let synthetic = results.iter().filter(|r| r.is_synthetic()).count();
        tracing::info!(count = results.len(), synthetic, "Fetched weather for cities");
        results
    }
}

/// A plausible substitute record for `city`.
///
/// Temperature 15–35 °C (one decimal), humidity 40–80 %, pressure 1000–1050 mb.
pub fn synthesize(city: &str) -> WeatherData {
    let mut rng = rand::thread_rng();
    let temperature = (rng.gen_range(15.0..=35.0_f64) * 10.0).round() / 10.0;
    let description = SYNTHETIC_DESCRIPTIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or("Clear")
        .to_string();

    WeatherData {
        location: city.to_string(),
        temperature,
        description,
        humidity: rng.gen_range(40.0..=80.0),
        pressure: rng.gen_range(1000.0..=1050.0),
        observed_at: unix_now(),
    }
}
