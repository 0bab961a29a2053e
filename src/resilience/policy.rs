//! Resilient call policy: timeout, retry and circuit breaker around one
//! outbound operation.
//!
//! The policy knows nothing about what it calls. The operation classifies
//! its own failures as [`AttemptError`]s; the policy decides whether to
//! retry, what to record in the breaker, and returns a single
//! [`CallOutcome`]. It never returns an error across its boundary.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};

use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::backoff::RetryPlan;
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState, Permit};
use crate::resilience::outcome::{AttemptError, CallOutcome, FailureKind};

/// Timeout, retry plan and breaker for one external dependency.
#[derive(Debug)]
pub struct ResilientCallPolicy {
    name: String,
    timeout: Duration,
    total_timeout: Option<Duration>,
    plan: RetryPlan,
    breaker: CircuitBreaker,
}

impl ResilientCallPolicy {
    pub fn new(
        name: impl Into<String>,
        timeout: Duration,
        plan: RetryPlan,
        breaker: BreakerSettings,
    ) -> Self {
        let name = name.into();
        Self {
            breaker: CircuitBreaker::new(name.clone(), breaker),
            name,
            timeout,
            total_timeout: None,
            plan,
        }
    }

    /// Bound a whole logical call, retries and backoff included.
    pub fn with_total_timeout(mut self, total: Duration) -> Self {
        self.total_timeout = Some(total);
        self
    }

    pub fn total_timeout(&self) -> Option<Duration> {
        self.total_timeout
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> &RetryPlan {
        &self.plan
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.state().await
    }

    /// Run `operation` under the policy.
    ///
    /// Each attempt runs under the per-attempt timeout. Transient failures
    /// are retried with backoff up to the plan's attempt budget; a half-open
    /// trial gets exactly one attempt. `cancel` pre-empts both in-flight
    /// attempts and backoff waits.
    pub async fn execute<T, F, Fut>(&self, operation: F, cancel: &ShutdownSignal) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        self.execute_with_plan(&self.plan, operation, cancel).await
    }

    /// Like [`execute`](Self::execute) with a different retry plan, sharing
    /// the same timeout and breaker. Used for non-idempotent requests.
    pub async fn execute_with_plan<T, F, Fut>(
        &self,
        plan: &RetryPlan,
        mut operation: F,
        cancel: &ShutdownSignal,
    ) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let permit = match self.breaker.acquire().await {
            Ok(permit) => permit,
            Err(rejected) => {
                tracing::debug!(
                    service = %self.name,
                    retry_after_ms = rejected.retry_after.as_millis() as u64,
                    "Circuit open, failing fast"
                );
                return self.finish(CallOutcome::Failure {
                    kind: FailureKind::CircuitOpen,
                    attempts: 0,
                    last_error: format!(
                        "circuit '{}' is open, retry after {:?}",
                        self.name, rejected.retry_after
                    ),
                });
            }
        };

        let mut cancel = cancel.clone();
        let max_attempts = match permit {
            Permit::Trial => 1,
            Permit::Normal => plan.max_attempts.max(1),
        };
        let deadline = self.total_timeout.map(|total| Instant::now() + total);
        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            if cancel.is_triggered() {
                return self.cancelled(permit, attempt - 1).await;
            }

            let attempt_timeout = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        tracing::warn!(service = %self.name, attempts, "Total time budget exhausted");
                        break;
                    }
                    remaining.min(self.timeout)
                }
                None => self.timeout,
            };
            attempts = attempt;

            let result = tokio::select! {
                biased;
                _ = cancel.recv() => return self.cancelled(permit, attempt).await,
                result = timeout(attempt_timeout, operation()) => result,
            };
            let result = result.unwrap_or_else(|_| {
                Err(AttemptError::Transient(format!("timed out after {:?}", attempt_timeout)))
            });

            match result {
                Ok(value) => {
                    self.breaker.record_success(permit).await;
                    if attempt > 1 {
                        tracing::info!(service = %self.name, attempt, "Call succeeded after retry");
                    }
                    return self.finish(CallOutcome::Success {
                        value: Some(value),
                        attempt,
                    });
                }
                Err(AttemptError::NotFound) => {
                    self.breaker.record_not_found(permit).await;
                    return self.finish(CallOutcome::Success { value: None, attempt });
                }
                Err(AttemptError::Rejected(msg)) => {
                    self.breaker.release(permit).await;
                    tracing::warn!(service = %self.name, error = %msg, "Request rejected");
                    return self.finish(CallOutcome::Failure {
                        kind: FailureKind::NonRetryable,
                        attempts: attempt,
                        last_error: msg,
                    });
                }
                Err(AttemptError::NonRetryable(msg)) => {
                    self.breaker.record_failure(permit).await;
                    self.breaker.evaluate().await;
                    tracing::warn!(service = %self.name, attempt, error = %msg, "Non-retryable failure");
                    return self.finish(CallOutcome::Failure {
                        kind: FailureKind::NonRetryable,
                        attempts: attempt,
                        last_error: msg,
                    });
                }
                Err(AttemptError::Transient(msg)) => {
                    self.breaker.record_failure(permit).await;
                    last_error = msg;

                    if permit == Permit::Trial {
                        tracing::warn!(service = %self.name, error = %last_error, "Half-open trial failed");
                        return self.finish(CallOutcome::Failure {
                            kind: FailureKind::TransientExhausted,
                            attempts: attempt,
                            last_error,
                        });
                    }

                    if attempt < max_attempts {
                        let mut delay = plan.delay_for(attempt - 1);
                        if let Some(deadline) = deadline {
                            delay = delay.min(deadline.saturating_duration_since(Instant::now()));
                        }
                        tracing::warn!(
                            service = %self.name,
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %last_error,
                            "Transient failure, retrying"
                        );
                        metrics::record_retry(&self.name);

                        tokio::select! {
                            biased;
                            _ = cancel.recv() => return self.cancelled(permit, attempt).await,
                            _ = sleep(delay) => {}
                        }
                    }
                }
            }
        }

        self.breaker.evaluate().await;
        tracing::warn!(
            service = %self.name,
            attempts,
            error = %last_error,
            "Retries exhausted"
        );
        self.finish(CallOutcome::Failure {
            kind: FailureKind::TransientExhausted,
            attempts,
            last_error,
        })
    }

    async fn cancelled<T>(&self, permit: Permit, attempts: u32) -> CallOutcome<T> {
        self.breaker.release(permit).await;
        tracing::info!(service = %self.name, attempts, "Call cancelled by shutdown");
        self.finish(CallOutcome::Failure {
            kind: FailureKind::Cancelled,
            attempts,
            last_error: "cancelled".to_string(),
        })
    }

    fn finish<T>(&self, outcome: CallOutcome<T>) -> CallOutcome<T> {
        let label = match &outcome {
            CallOutcome::Success { value: Some(_), .. } => "success",
            CallOutcome::Success { value: None, .. } => "not_found",
            CallOutcome::Failure { kind, .. } => kind.as_str(),
        };
        metrics::record_call_outcome(&self.name, label);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn plan(max_attempts: u32) -> RetryPlan {
        RetryPlan {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            jitter: false,
        }
    }

    fn lenient_breaker() -> BreakerSettings {
        BreakerSettings {
            failure_ratio: 1.0,
            minimum_throughput: 1_000,
            sampling_window: Duration::from_secs(10),
            break_duration: Duration::from_secs(20),
        }
    }

    fn scenario_breaker() -> BreakerSettings {
        BreakerSettings {
            failure_ratio: 0.6,
            minimum_throughput: 3,
            sampling_window: Duration::from_secs(10),
            break_duration: Duration::from_secs(20),
        }
    }

    fn policy(max_attempts: u32, breaker: BreakerSettings) -> ResilientCallPolicy {
        ResilientCallPolicy::new("test", Duration::from_secs(1), plan(max_attempts), breaker)
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_use_every_attempt() {
        let cancel = ShutdownSignal::never();
        for n in 1..=5 {
            let p = policy(n, lenient_breaker());
            let calls = AtomicU32::new(0);
            let outcome: CallOutcome<()> = p
                .execute(
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err(AttemptError::Transient("boom".into())) }
                    },
                    &cancel,
                )
                .await;

            assert_eq!(calls.load(Ordering::SeqCst), n);
            assert_eq!(
                outcome,
                CallOutcome::Failure {
                    kind: FailureKind::TransientExhausted,
                    attempts: n,
                    last_error: "boom".into(),
                }
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_later_attempt() {
        let p = policy(3, lenient_breaker());
        let calls = AtomicU32::new(0);
        let outcome = p
            .execute(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(AttemptError::Transient("flaky".into()))
                        } else {
                            Ok(n)
                        }
                    }
                },
                &ShutdownSignal::never(),
            )
            .await;
        assert_eq!(outcome, CallOutcome::Success { value: Some(2), attempt: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let p = policy(3, lenient_breaker());
        let start = tokio::time::Instant::now();
        let _: CallOutcome<()> = p
            .execute(
                || async { Err(AttemptError::Transient("down".into())) },
                &ShutdownSignal::never(),
            )
            .await;
        // 100ms + 200ms of backoff, no jitter.
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let p = policy(2, lenient_breaker());
        let calls = AtomicU32::new(0);
        let outcome: CallOutcome<()> = p
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        sleep(Duration::from_secs(60)).await;
                        Ok(())
                    }
                },
                &ShutdownSignal::never(),
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::TransientExhausted));
        if let CallOutcome::Failure { last_error, .. } = outcome {
            assert!(last_error.contains("timed out"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_timeout_bounds_whole_call() {
        // 4 attempts of 30s plus 1s + 2s + 4s backoff would take 127s.
        let p = ResilientCallPolicy::new(
            "test",
            Duration::from_secs(30),
            RetryPlan {
                max_attempts: 4,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
                backoff_factor: 2.0,
                jitter: false,
            },
            lenient_breaker(),
        )
        .with_total_timeout(Duration::from_secs(60));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let outcome: CallOutcome<()> = p
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        sleep(Duration::from_secs(3600)).await;
                        Ok(())
                    }
                },
                &ShutdownSignal::never(),
            )
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert_eq!(outcome.failure_kind(), Some(FailureKind::TransientExhausted));
        // 30s, 1s backoff, then the second attempt is cut to the 29s left.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_timeout_leaves_fast_calls_alone() {
        let p = policy(3, lenient_breaker()).with_total_timeout(Duration::from_secs(60));
        let outcome: CallOutcome<()> = p
            .execute(
                || async { Err(AttemptError::Transient("down".into())) },
                &ShutdownSignal::never(),
            )
            .await;
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(p.total_timeout(), Some(Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_surfaces_immediately() {
        let p = policy(5, scenario_breaker());
        let calls = AtomicU32::new(0);
        let outcome: CallOutcome<()> = p
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(AttemptError::NonRetryable("bad json".into())) }
                },
                &ShutdownSignal::never(),
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome,
            CallOutcome::Failure {
                kind: FailureKind::NonRetryable,
                attempts: 1,
                last_error: "bad json".into(),
            }
        );
        assert_eq!(p.breaker().stats().await.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_not_held_against_breaker() {
        let p = policy(5, scenario_breaker());
        for _ in 0..5 {
            let outcome: CallOutcome<()> = p
                .execute(
                    || async { Err(AttemptError::Rejected("name required".into())) },
                    &ShutdownSignal::never(),
                )
                .await;
            assert_eq!(outcome.failure_kind(), Some(FailureKind::NonRetryable));
        }
        assert_eq!(p.breaker().stats().await.samples, 0);
        assert_eq!(p.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_never_retries_or_trips() {
        let p = policy(3, scenario_breaker());
        let calls = AtomicU32::new(0);
        for _ in 0..10 {
            let outcome: CallOutcome<u32> = p
                .execute(
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err(AttemptError::NotFound) }
                    },
                    &ShutdownSignal::never(),
                )
                .await;
            assert_eq!(outcome, CallOutcome::Success { value: None, attempt: 1 });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(p.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_skips_transport() {
        let p = policy(1, scenario_breaker());
        let calls = Arc::new(AtomicU32::new(0));
        let failing = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AttemptError::Transient("refused".into())) }
        };

        for _ in 0..3 {
            p.execute(failing, &ShutdownSignal::never()).await;
        }
        assert_eq!(p.circuit_state().await, CircuitState::Open);

        let outcome = p.execute(failing, &ShutdownSignal::never()).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::CircuitOpen));
        assert_eq!(outcome.attempts(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_window_scenario() {
        // interval 30s, ratio 0.6 over 10s with 3 samples, 20s break.
        let p = policy(1, scenario_breaker());
        let cancel = ShutdownSignal::never();
        let calls = AtomicU32::new(0);
        let healthy = std::sync::atomic::AtomicBool::new(false);
        let op = || {
            calls.fetch_add(1, Ordering::SeqCst);
            let ok = healthy.load(Ordering::SeqCst);
            async move {
                if ok {
                    Ok(1u32)
                } else {
                    Err(AttemptError::Transient("refused".into()))
                }
            }
        };

        for _ in 0..3 {
            p.execute(op, &cancel).await;
            tokio::time::advance(Duration::from_secs(2)).await;
        }
        let fourth = p.execute(op, &cancel).await;
        assert_eq!(fourth.failure_kind(), Some(FailureKind::CircuitOpen));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_secs(20)).await;
        healthy.store(true, Ordering::SeqCst);
        let trial = p.execute(op, &cancel).await;
        assert_eq!(trial, CallOutcome::Success { value: Some(1), attempt: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(p.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_gets_single_attempt() {
        let p = policy(4, scenario_breaker());
        let cancel = ShutdownSignal::never();
        let calls = AtomicU32::new(0);
        let op = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AttemptError::Transient("refused".into())) }
        };

        // One call of 4 attempts fills the window and trips the breaker.
        let first = p.execute(op, &cancel).await;
        assert_eq!(first.attempts(), 4);
        assert_eq!(p.circuit_state().await, CircuitState::Open);

        tokio::time::advance(Duration::from_secs(20)).await;
        let trial = p.execute(op, &cancel).await;
        assert_eq!(trial.failure_kind(), Some(FailureKind::TransientExhausted));
        assert_eq!(trial.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(p.circuit_state().await, CircuitState::Open);

        let after = p.execute(op, &cancel).await;
        assert_eq!(after.failure_kind(), Some(FailureKind::CircuitOpen));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let p = ResilientCallPolicy::new(
            "test",
            Duration::from_secs(1),
            RetryPlan {
                max_attempts: 5,
                base_delay: Duration::from_secs(30),
                max_delay: Duration::from_secs(30),
                backoff_factor: 1.0,
                jitter: false,
            },
            lenient_breaker(),
        );
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        let calls = AtomicU32::new(0);

        let call = p.execute(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(AttemptError::Transient("down".into())) }
            },
            &signal,
        );
        let trigger = async {
            sleep(Duration::from_secs(5)).await;
            shutdown.trigger();
        };
        let start = tokio::time::Instant::now();
        let (outcome, _) = tokio::join!(call, trigger);

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_attempt() {
        let p = ResilientCallPolicy::new("test", Duration::from_secs(60), plan(3), lenient_breaker());
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();

        let call = p.execute(
            || async {
                sleep(Duration::from_secs(50)).await;
                Ok::<(), AttemptError>(())
            },
            &signal,
        );
        let trigger = async {
            sleep(Duration::from_secs(1)).await;
            shutdown.trigger();
        };
        let (outcome, _) = tokio::join!(call, trigger);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(p.breaker().stats().await.samples, 0);
    }
}
