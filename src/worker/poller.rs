//! The polling loop.
//!
//! # States
//! ```text
//! Starting → Running(cycle) → Waiting → Running(cycle) → … → Stopping → Stopped
//! ```
//! A failed cycle is logged and the loop moves on to Waiting. Only the
//! shutdown signal stops the loop; the wait is interrupted as soon as it
//! fires.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::clients::ClientError;
use crate::config::WorkerConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Why a cycle did not complete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CycleError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("cycle cancelled by shutdown")]
    Cancelled,
}

impl CycleError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            CycleError::Cancelled => true,
            CycleError::Client(e) => e.is_cancelled(),
        }
    }
}

/// What one cycle accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Items fetched and processed (users, weather records).
    pub processed: usize,
    /// How many of those were synthetic substitutes.
    pub synthetic: usize,
}

impl CycleSummary {
    pub fn merge(self, other: CycleSummary) -> CycleSummary {
        CycleSummary {
            processed: self.processed + other.processed,
            synthetic: self.synthetic + other.synthetic,
        }
    }
}

/// One scheduled cycle: its cancellation signal and start time.
#[derive(Debug, Clone)]
pub struct WorkerTick {
    cancel: ShutdownSignal,
    started_at: Instant,
}

impl WorkerTick {
    pub fn new(cancel: ShutdownSignal) -> Self {
        Self {
            cancel,
            started_at: Instant::now(),
        }
    }

    pub fn cancel(&self) -> &ShutdownSignal {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_triggered()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Sleep for `duration` unless shutdown fires first.
    pub async fn pause(&self, duration: Duration) -> Result<(), CycleError> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.recv() => Err(CycleError::Cancelled),
            _ = sleep(duration) => Ok(()),
        }
    }
}

/// The unit of work run on every tick.
pub trait CycleJob: Send {
    fn run_cycle(&mut self, tick: &WorkerTick) -> impl Future<Output = Result<CycleSummary, CycleError>> + Send;
}

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
}

/// Runs a [`CycleJob`] every `interval` until shutdown.
pub struct PollingWorker<J> {
    interval: Duration,
    job: J,
    shutdown: ShutdownSignal,
}

impl<J: CycleJob> PollingWorker<J> {
    pub fn new(interval: Duration, job: J, shutdown: ShutdownSignal) -> Self {
        Self {
            interval,
            job,
            shutdown,
        }
    }

    pub fn from_config(config: &WorkerConfig, job: J, shutdown: ShutdownSignal) -> Self {
        Self::new(Duration::from_secs(config.interval_secs), job, shutdown)
    }

    /// Run the loop until the shutdown signal fires.
    pub async fn run(mut self) -> WorkerStats {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            "Worker starting"
        );

        let mut stats = WorkerStats::default();

        while !self.shutdown.is_triggered() {
            stats.cycles += 1;
            let tick = WorkerTick::new(self.shutdown.clone());
            tracing::info!(cycle = stats.cycles, "Cycle starting");

            match self.job.run_cycle(&tick).await {
                Ok(summary) => {
                    tracing::info!(
                        cycle = stats.cycles,
                        processed = summary.processed,
                        synthetic = summary.synthetic,
                        elapsed_ms = tick.elapsed().as_millis() as u64,
                        "Cycle completed"
                    );
                    metrics::record_cycle("success");
                }
                Err(e) if e.is_cancelled() => {
                    tracing::info!(cycle = stats.cycles, "Cycle interrupted by shutdown");
                    metrics::record_cycle("cancelled");
                    break;
                }
                Err(e) => {
                    stats.failed_cycles += 1;
                    tracing::error!(
                        cycle = stats.cycles,
                        error = %e,
                        elapsed_ms = tick.elapsed().as_millis() as u64,
                        "Cycle failed"
                    );
                    metrics::record_cycle("failure");
                }
            }

            tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    tracing::info!("Worker received shutdown signal, exiting loop");
                    break;
                }
                _ = sleep(self.interval) => {}
            }
        }

        tracing::info!(
            cycles = stats.cycles,
            failed_cycles = stats.failed_cycles,
            "Worker stopped"
        );
        stats
    }
}
