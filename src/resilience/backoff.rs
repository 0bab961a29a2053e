//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Spread applied around the computed delay when jitter is enabled (±25%).
const JITTER_SPREAD: f64 = 0.25;

/// Immutable retry configuration consumed once per logical call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPlan {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl RetryPlan {
    /// A plan that makes a single attempt and never waits.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
            jitter: false,
        }
    }

    /// Delay to wait after the failed attempt with zero-based index `attempt`.
    ///
    /// `min(base * factor^attempt, max)`, then randomized by ±25% when jitter
    /// is on. The jittered value is capped at `max_delay` again.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());

        let secs = if self.jitter && capped > 0.0 {
            let factor = rand::thread_rng().gen_range((1.0 - JITTER_SPREAD)..=(1.0 + JITTER_SPREAD));
            (capped * factor).min(self.max_delay.as_secs_f64())
        } else {
            capped
        };

        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    /// The concrete waits between attempts: `max_attempts - 1` durations.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(move |attempt| self.delay_for(attempt))
    }
}

impl From<&RetryConfig> for RetryPlan {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_factor: config.backoff_factor,
            jitter: config.jitter,
        }
    }
}
