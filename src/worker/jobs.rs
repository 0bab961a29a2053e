//! Cycle jobs run by the polling worker.

use std::collections::HashSet;
use std::time::Duration;

use crate::clients::{Sourced, User, UserDirectory, WeatherClient};
use crate::worker::poller::{CycleError, CycleJob, CycleSummary, WorkerTick};

/// Fetches the user collection and processes each distinct user once.
pub struct UserSweep<D> {
    directory: D,
    process_delay: Duration,
}

impl<D: UserDirectory> UserSweep<D> {
    pub fn new(directory: D, process_delay: Duration) -> Self {
        Self {
            directory,
            process_delay,
        }
    }

    async fn process(&self, user: &User, tick: &WorkerTick) -> Result<(), CycleError> {
        tracing::debug!(user_id = user.id, "Processing user");
        tick.pause(self.process_delay).await
    }
}

impl<D: UserDirectory> CycleJob for UserSweep<D> {
    async fn run_cycle(&mut self, tick: &WorkerTick) -> Result<CycleSummary, CycleError> {
        let users = self.directory.fetch_users(tick.cancel()).await?;

        let mut seen = HashSet::with_capacity(users.len());
        for user in &users {
            if !seen.insert(user.id) {
                tracing::debug!(user_id = user.id, "Skipping duplicate user");
                continue;
            }
            tracing::info!(user_id = user.id, name = %user.name, email = %user.email, "User");
            self.process(user, tick).await?;
        }

        tracing::info!(count = seen.len(), "Completed processing all users");
        Ok(CycleSummary {
            processed: seen.len(),
            synthetic: 0,
        })
    }
}

/// Fetches current weather for a fixed list of cities.
pub struct WeatherSweep {
    client: WeatherClient,
    cities: Vec<String>,
}

impl WeatherSweep {
    pub fn new(client: WeatherClient, cities: Vec<String>) -> Self {
        Self { client, cities }
    }
}

impl CycleJob for WeatherSweep {
    async fn run_cycle(&mut self, tick: &WorkerTick) -> Result<CycleSummary, CycleError> {
        let results = self
            .client
            .fetch_weather_for_cities(&self.cities, tick.cancel())
            .await;
        if tick.is_cancelled() {
            return Err(CycleError::Cancelled);
        }

        for record in &results {
            let data = record.get();
            let source = match record {
                Sourced::Real(_) => "live",
                Sourced::Synthetic(_) => "synthetic",
            };
            tracing::info!(
                location = %data.location,
                temperature = data.temperature,
                description = %data.description,
                source,
                "Weather"
            );
        }

        Ok(CycleSummary {
            processed: results.len(),
            synthetic: results.iter().filter(|r| r.is_synthetic()).count(),
        })
    }
}

/// A disabled job: every cycle is an empty success.
impl<J: CycleJob> CycleJob for Option<J> {
    async fn run_cycle(&mut self, tick: &WorkerTick) -> Result<CycleSummary, CycleError> {
        match self {
            Some(job) => job.run_cycle(tick).await,
            None => Ok(CycleSummary::default()),
        }
    }
}

/// Runs two jobs per cycle. The second still runs when the first fails;
/// the cycle reports the first error seen.
pub struct CompositeJob<A, B> {
    first: A,
    second: B,
}

impl<A: CycleJob, B: CycleJob> CompositeJob<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: CycleJob, B: CycleJob> CycleJob for CompositeJob<A, B> {
    async fn run_cycle(&mut self, tick: &WorkerTick) -> Result<CycleSummary, CycleError> {
        let first = self.first.run_cycle(tick).await;
        if let Err(e) = &first {
            if e.is_cancelled() {
                return first;
            }
        }

        let second = self.second.run_cycle(tick).await;
        match (first, second) {
            (Ok(a), Ok(b)) => Ok(a.merge(b)),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use crate::lifecycle::{Shutdown, ShutdownSignal};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedDirectory {
        users: Result<Vec<User>, ClientError>,
        calls: AtomicUsize,
    }

    impl FixedDirectory {
        fn with(users: Result<Vec<User>, ClientError>) -> Arc<Self> {
            Arc::new(Self {
                users,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl UserDirectory for FixedDirectory {
        async fn fetch_users(&self, _cancel: &ShutdownSignal) -> Result<Vec<User>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.users.clone()
        }

        async fn fetch_user(&self, id: u64, _cancel: &ShutdownSignal) -> Result<Option<User>, ClientError> {
            let users = self.users.clone()?;
            Ok(users.into_iter().find(|u| u.id == id))
        }
    }

    fn user(id: u64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            created_at: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_sweep_processes_each_id_once() {
        let directory = FixedDirectory::with(Ok(vec![user(1, "Ann"), user(2, "Ben"), user(1, "Ann")]));
        let mut job = UserSweep::new(directory.clone(), Duration::from_millis(100));
        let tick = WorkerTick::new(ShutdownSignal::never());

        let summary = job.run_cycle(&tick).await.unwrap();
        assert_eq!(summary, CycleSummary { processed: 2, synthetic: 0 });
        assert!(tick.elapsed() >= Duration::from_millis(200));
        assert!(tick.elapsed() < Duration::from_millis(210));
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_sweep_propagates_peer_failure() {
        let err = ClientError::CircuitOpen {
            service: "peer_service".into(),
        };
        let mut job = UserSweep::new(FixedDirectory::with(Err(err.clone())), Duration::ZERO);
        let tick = WorkerTick::new(ShutdownSignal::never());
        assert_eq!(job.run_cycle(&tick).await, Err(CycleError::Client(err)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_sweep_stops_on_shutdown() {
        let shutdown = Shutdown::new();
        let users = (1..=10).map(|i| user(i, "User")).collect();
        let mut job = UserSweep::new(FixedDirectory::with(Ok(users)), Duration::from_secs(1));
        let tick = WorkerTick::new(shutdown.subscribe());

        let trigger = async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            shutdown.trigger();
        };
        let (result, _) = tokio::join!(job.run_cycle(&tick), trigger);
        assert_eq!(result, Err(CycleError::Cancelled));
        assert!(tick.elapsed() < Duration::from_secs(3));
    }

    struct Failing;

    impl CycleJob for Failing {
        async fn run_cycle(&mut self, _tick: &WorkerTick) -> Result<CycleSummary, CycleError> {
            Err(CycleError::Client(ClientError::NonRetryable {
                service: "peer_service".into(),
                message: "malformed payload".into(),
            }))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl CycleJob for Counting {
        async fn run_cycle(&mut self, _tick: &WorkerTick) -> Result<CycleSummary, CycleError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(CycleSummary { processed: 3, synthetic: 1 })
        }
    }

    #[tokio::test]
    async fn test_composite_runs_second_after_first_fails() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut job = CompositeJob::new(Failing, Counting(runs.clone()));
        let tick = WorkerTick::new(ShutdownSignal::never());

        let result = job.run_cycle(&tick).await;
        assert!(matches!(result, Err(CycleError::Client(ClientError::NonRetryable { .. }))));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_composite_merges_summaries() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut job = CompositeJob::new(Counting(runs.clone()), Some(Counting(runs.clone())));
        let tick = WorkerTick::new(ShutdownSignal::never());
        assert_eq!(
            job.run_cycle(&tick).await,
            Ok(CycleSummary { processed: 6, synthetic: 2 })
        );

        let mut disabled = CompositeJob::new(Counting(runs.clone()), None::<Counting>);
        assert_eq!(
            disabled.run_cycle(&tick).await,
            Ok(CycleSummary { processed: 3, synthetic: 1 })
        );
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
