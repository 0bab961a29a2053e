//! Metrics collection and exposition.
//!
//! # Metrics
//! - `poller_calls_total` (counter): logical calls by service, outcome
//! - `poller_retries_total` (counter): retry attempts by service
//! - `poller_breaker_transitions_total` (counter): transitions by service, target state
//! - `poller_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `poller_fallbacks_total` (counter): synthetic values served by service
//! - `poller_cycles_total` (counter): worker cycles by result
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call_outcome(service: &str, outcome: &'static str) {
    counter!("poller_calls_total", "service" => service.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_retry(service: &str) {
    counter!("poller_retries_total", "service" => service.to_string()).increment(1);
}

pub fn record_breaker_transition(service: &str, to: CircuitState) {
    counter!(
        "poller_breaker_transitions_total",
        "service" => service.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(service, to);
}

pub fn record_breaker_state(service: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("poller_breaker_state", "service" => service.to_string()).set(value);
}

pub fn record_fallback(service: &str) {
    counter!("poller_fallbacks_total", "service" => service.to_string()).increment(1);
}

pub fn record_cycle(result: &'static str) {
    counter!("poller_cycles_total", "result" => result).increment(1);
}
