//! Background polling worker.
//!
//! # Data Flow
//! ```text
//! PollingWorker::run (poller.rs)
//!     → WorkerTick (cancellation signal + start time)
//!     → CycleJob::run_cycle (jobs.rs)
//!         → UserSweep: peer client → process each distinct user
//!         → WeatherSweep: weather client → real or synthetic records
//!     → log result, wait `interval` or stop on shutdown
//! ```
//!
//! # Design Decisions
//! - Cycles never overlap; the wait starts after the cycle ends
//! - A failed cycle is logged and counted, never fatal
//! - The worker holds no state between cycles beyond its counters

pub mod jobs;
pub mod poller;

pub use jobs::{CompositeJob, UserSweep, WeatherSweep};
pub use poller::{CycleError, CycleJob, CycleSummary, PollingWorker, WorkerStats, WorkerTick};
