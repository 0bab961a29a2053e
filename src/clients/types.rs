//! Domain and wire types for the external services.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A user as served by the peer service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    /// RFC 3339 creation time, when the peer provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Payload for creating a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Body of `GET /current?city=`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature: f64,
    pub description: String,
    pub humidity: f64,
    pub pressure: f64,
}

/// Current conditions for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub location: String,
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: String,
    /// Percent.
    pub humidity: f64,
    /// Millibars.
    pub pressure: f64,
    /// Seconds since the Unix epoch when this value was produced locally.
    pub observed_at: u64,
}

impl From<WeatherReport> for WeatherData {
    fn from(report: WeatherReport) -> Self {
        Self {
            location: report.location,
            temperature: report.temperature,
            description: report.description,
            humidity: report.humidity,
            pressure: report.pressure,
            observed_at: unix_now(),
        }
    }
}

/// Marks whether a value came from the live dependency or was synthesized
/// locally while it was unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "data", rename_all = "snake_case")]
pub enum Sourced<T> {
    Real(T),
    Synthetic(T),
}

impl<T> Sourced<T> {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Sourced::Synthetic(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Sourced::Real(v) | Sourced::Synthetic(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Sourced::Real(v) | Sourced::Synthetic(v) => v,
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
