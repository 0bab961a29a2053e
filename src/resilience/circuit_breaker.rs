//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: exactly one trial call tests recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure ratio >= threshold over the sampling window,
//!                with at least `minimum_throughput` samples
//! Open → Half-Open: after the break duration
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails (break timer restarts)
//! ```
//!
//! One breaker per dependency. All state sits behind a single mutex so
//! state reads, transitions and window updates are serialized.

use std::fmt;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::window::FailureWindow;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trip and recovery parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerSettings {
    pub failure_ratio: f64,
    pub minimum_throughput: usize,
    pub sampling_window: Duration,
    pub break_duration: Duration,
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_ratio: config.failure_ratio,
            minimum_throughput: config.minimum_throughput,
            sampling_window: Duration::from_secs(config.sampling_window_secs),
            break_duration: Duration::from_secs(config.break_duration_secs),
        }
    }
}

/// Admission granted by [`CircuitBreaker::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Closed circuit; the caller may retry as its plan allows.
    Normal,
    /// The single half-open trial; the caller must not retry on failure.
    Trial,
}

/// Call rejected because the circuit is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    pub retry_after: Duration,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerStats {
    pub state: CircuitState,
    pub samples: usize,
    pub failures: usize,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    window: FailureWindow,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Per-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);
        Self {
            name,
            settings,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: FailureWindow::new(settings.sampling_window),
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn stats(&self) -> BreakerStats {
        let mut inner = self.inner.lock().await;
        inner.window.prune(Instant::now());
        BreakerStats {
            state: inner.state,
            samples: inner.window.len(),
            failures: inner.window.failures(),
        }
    }

    /// Ask to make a call.
    ///
    /// Moves Open to Half-Open once the break duration has elapsed, and hands
    /// out the trial permit to exactly one caller.
    pub async fn acquire(&self) -> Result<Permit, Rejected> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Ok(Permit::Normal),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.settings.break_duration {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.trial_in_flight = true;
                    Ok(Permit::Trial)
                } else {
                    Err(Rejected {
                        retry_after: self.settings.break_duration - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(Rejected {
                        retry_after: Duration::ZERO,
                    })
                } else {
                    inner.trial_in_flight = true;
                    Ok(Permit::Trial)
                }
            }
        }
    }

    pub async fn record_success(&self, permit: Permit) {
        let mut inner = self.inner.lock().await;
        inner.window.record_success(Instant::now());
        if permit == Permit::Trial && inner.state == CircuitState::HalfOpen {
            self.close(&mut inner);
        }
    }

    pub async fn record_failure(&self, permit: Permit) {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        inner.window.record_failure(now);
        if permit == Permit::Trial && inner.state == CircuitState::HalfOpen {
            self.open(&mut inner, now);
        }
    }

    /// An authoritative "not found": proof the dependency is answering,
    /// but never a sample in the failure window.
    pub async fn record_not_found(&self, permit: Permit) {
        let mut inner = self.inner.lock().await;
        if permit == Permit::Trial && inner.state == CircuitState::HalfOpen {
            self.close(&mut inner);
        }
    }

    /// Give back a permit without an outcome (cancelled or rejected request).
    pub async fn release(&self, permit: Permit) {
        let mut inner = self.inner.lock().await;
        if permit == Permit::Trial && inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    /// Re-evaluate the rolling failure ratio after a failed call.
    ///
    /// Returns the state after evaluation.
    pub async fn evaluate(&self) -> CircuitState {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        inner.window.prune(now);

        if inner.state == CircuitState::Closed
            && inner.window.len() >= self.settings.minimum_throughput
            && inner.window.failure_ratio() >= self.settings.failure_ratio
        {
            tracing::warn!(
                service = %self.name,
                samples = inner.window.len(),
                failures = inner.window.failures(),
                ratio = inner.window.failure_ratio(),
                "Failure ratio over threshold"
            );
            self.open(&mut inner, now);
        }
        inner.state
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        self.transition(inner, CircuitState::Open);
        inner.opened_at = Some(now);
        inner.trial_in_flight = false;
    }

    fn close(&self, inner: &mut Inner) {
        self.transition(inner, CircuitState::Closed);
        inner.opened_at = None;
        inner.trial_in_flight = false;
        inner.window.clear();
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;

        match to {
            CircuitState::Open => tracing::warn!(
                service = %self.name,
                from = %from,
                to = %to,
                break_secs = self.settings.break_duration.as_secs_f64(),
                "Circuit breaker state change"
            ),
            _ => tracing::info!(
                service = %self.name,
                from = %from,
                to = %to,
                "Circuit breaker state change"
            ),
        }
        metrics::record_breaker_transition(&self.name, to);
    }
}
