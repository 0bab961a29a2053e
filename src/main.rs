//! Resilient polling worker.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────┐
//!   │                      POLLING WORKER                        │
//!   │                                                            │
//!   │  ┌──────────┐   tick   ┌────────────┐                      │
//!   │  │  worker  │─────────▶│ UserSweep  │──┐                   │
//!   │  │  loop    │          └────────────┘  │  ┌─────────────┐  │     Peer
//!   │  │          │          ┌────────────┐  ├─▶│ resilience  │──┼───▶ service
//!   │  │          │─────────▶│WeatherSweep│──┘  │ timeout /   │  │
//!   │  └────▲─────┘          └─────┬──────┘     │ retry / cb  │──┼───▶ Weather
//!   │       │                      │ fallback   └─────────────┘  │     feed
//!   │       │                      ▼                             │
//!   │  ┌────┴─────┐          synthetic data                      │
//!   │  │lifecycle │                                              │
//!   │  │ shutdown │◀── SIGINT / SIGTERM                          │
//!   │  └──────────┘                                              │
//!   └───────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use resilient_poller::clients::{PeerServiceClient, WeatherClient};
use resilient_poller::config::{apply_env_overrides, load_config, validated, AppConfig, ConfigError};
use resilient_poller::lifecycle::{signals, Shutdown};
use resilient_poller::observability::{logging, metrics};
use resilient_poller::worker::{CompositeJob, PollingWorker, UserSweep, WeatherSweep};

#[derive(Parser)]
#[command(name = "resilient-poller")]
#[command(about = "Periodically polls a peer service with retries and circuit breaking", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between cycles, overriding config and environment
    #[arg(short, long)]
    interval: Option<u64>,

    /// Disable the weather sweep
    #[arg(long)]
    no_weather: bool,
}

/// File (or defaults), then environment, then command line; validated last.
fn resolve_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    let mut config = apply_env_overrides(config)?;
    if let Some(secs) = args.interval {
        config.worker.interval_secs = secs;
    }
    if args.no_weather {
        config.weather.enabled = false;
    }
    validated(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    logging::init_logging(&config.observability);
    tracing::info!("resilient-poller v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        peer_base_url = %config.peer_service.base_url,
        interval_secs = config.worker.interval_secs,
        weather_enabled = config.weather.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let peer = PeerServiceClient::new(&config.peer_service)?;
    let users = UserSweep::new(peer, Duration::from_millis(config.worker.process_delay_ms));
    let weather = if config.weather.enabled {
        let client = WeatherClient::new(&config.weather)?;
        Some(WeatherSweep::new(client, config.weather.cities.clone()))
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let worker = PollingWorker::from_config(
        &config.worker,
        CompositeJob::new(users, weather),
        shutdown.subscribe(),
    );
    let mut handle = tokio::spawn(worker.run());

    let stats = tokio::select! {
        joined = &mut handle => joined?,
        _ = signals::trigger_on_signal(&shutdown) => {
            tracing::info!("Shutdown requested, waiting for worker to stop");
            handle.await?
        }
    };

    tracing::info!(
        cycles = stats.cycles,
        failed_cycles = stats.failed_cycles,
        "Shutdown complete"
    );
    Ok(())
}
