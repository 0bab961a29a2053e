//! Rolling failure window.
//!
//! Holds the success/failure flags of recent attempts with their timestamps.
//! Entries older than the sampling duration are pruned lazily, on each
//! evaluation, never by a background task.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Upper bound on retained samples, independent of the sampling duration.
const MAX_SAMPLES: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    failed: bool,
}

/// Time-ordered record of recent outcomes.
#[derive(Debug)]
pub struct FailureWindow {
    sampling: Duration,
    samples: VecDeque<Sample>,
}

impl FailureWindow {
    pub fn new(sampling: Duration) -> Self {
        Self {
            sampling,
            samples: VecDeque::new(),
        }
    }

    pub fn record_success(&mut self, at: Instant) {
        self.push(Sample { at, failed: false });
    }

    pub fn record_failure(&mut self, at: Instant) {
        self.push(Sample { at, failed: true });
    }

    fn push(&mut self, sample: Sample) {
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Drop samples that fell out of the sampling duration.
    pub fn prune(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.saturating_duration_since(front.at) > self.sampling {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.samples.iter().filter(|s| s.failed).count()
    }

    /// Fraction of retained samples that are failures; 0.0 when empty.
    pub fn failure_ratio(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.failures() as f64 / self.samples.len() as f64
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
