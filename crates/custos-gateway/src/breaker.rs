//! Per-operation circuit breaker with bounded concurrency and a timeout race

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::GatewaySettings;
use crate::error::GatewayError;

/// Breaker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through; outcomes feed the rolling statistics
    Closed,
    /// Calls fail fast until the sleep window elapses
    Open,
    /// One trial call is in flight; its outcome decides the next state
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Timeout,
    Rejected,
}

impl Outcome {
    fn is_error(self) -> bool {
        self != Outcome::Success
    }
}

/// One-second statistics bucket
struct Bucket {
    start: Instant,
    requests: u32,
    errors: u32,
}

/// Rolling outcome counters, pruned to the configured window
struct RollingStats {
    buckets: VecDeque<Bucket>,
    width: Duration,
}

const BUCKET_GRANULARITY: Duration = Duration::from_secs(1);

impl RollingStats {
    fn new(width: Duration) -> Self {
        Self {
            buckets: VecDeque::new(),
            width,
        }
    }

    fn record(&mut self, outcome: Outcome, now: Instant) {
        self.prune(now);

        let needs_new = match self.buckets.back() {
            Some(bucket) => now.duration_since(bucket.start) >= BUCKET_GRANULARITY,
            None => true,
        };
        if needs_new {
            self.buckets.push_back(Bucket {
                start: now,
                requests: 0,
                errors: 0,
            });
        }

        let bucket = self.buckets.back_mut().expect("bucket just pushed");
        bucket.requests += 1;
        if outcome.is_error() {
            bucket.errors += 1;
        }
    }

    /// Total requests and errors currently inside the window
    fn totals(&mut self, now: Instant) -> (u32, u32) {
        self.prune(now);
        self.buckets
            .iter()
            .fold((0, 0), |(requests, errors), bucket| {
                (requests + bucket.requests, errors + bucket.errors)
            })
    }

    fn reset(&mut self) {
        self.buckets.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.duration_since(front.start) > self.width {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    stats: RollingStats,
}

/// Failure isolation for one named operation.
///
/// Shared by every concurrent caller of that operation; all mutation
/// happens under the inner lock, which is never held across an await.
pub struct CircuitBreaker {
    name: String,
    settings: GatewaySettings,
    permits: Arc<Semaphore>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: GatewaySettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent));
        let stats = RollingStats::new(settings.rolling_window);
        Self {
            name: name.into(),
            settings,
            permits,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                opened_at: None,
                trial_in_flight: false,
                stats,
            }),
        }
    }

    /// Current state as last observed (an elapsed sleep window only takes
    /// effect when the next call arrives)
    pub fn state(&self) -> CircuitState {
        self.lock_inner().state
    }

    /// Run `op` under the breaker, the concurrency ceiling, and the timeout.
    ///
    /// The operation is dispatched onto its own task; on timeout the task is
    /// left to finish in the background and its result is never observed.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, GatewayError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let trial = match self.try_admit() {
            Some(trial) => trial,
            None => return Err(GatewayError::CircuitOpen),
        };

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.settle(Outcome::Rejected, trial);
                return Err(GatewayError::CapacityExceeded);
            }
        };

        // The permit rides inside the task so stragglers that outlive the
        // deadline still count against the ceiling until they finish
        let future = op();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            future.await
        });

        match tokio::time::timeout(self.settings.timeout, handle).await {
            Ok(Ok(Ok(value))) => {
                self.settle(Outcome::Success, trial);
                Ok(value)
            }
            Ok(Ok(Err(err))) => {
                self.settle(Outcome::Failure, trial);
                Err(GatewayError::Inner(err))
            }
            Ok(Err(join_err)) => {
                self.settle(Outcome::Failure, trial);
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
                // A cancelled task never produced a result before the
                // rendezvous ended
                Err(GatewayError::Timeout)
            }
            Err(_elapsed) => {
                self.settle(Outcome::Timeout, trial);
                warn!(operation = %self.name, "operation timed out");
                Err(GatewayError::Timeout)
            }
        }
    }

    /// Decide whether a call may proceed. Returns `Some(is_trial)` or
    /// `None` to fail fast.
    fn try_admit(&self) -> Option<bool> {
        let mut inner = self.lock_inner();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Some(false),
            CircuitState::Open => {
                let expired = inner
                    .opened_at
                    .map_or(true, |at| now.duration_since(at) >= self.settings.sleep_window);
                if expired {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    debug!(operation = %self.name, "circuit half-open, admitting trial call");
                    Some(true)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(true)
                }
            }
        }
    }

    /// Record an outcome and drive state transitions
    fn settle(&self, outcome: Outcome, trial: bool) {
        let mut inner = self.lock_inner();
        let now = Instant::now();
        inner.stats.record(outcome, now);

        if trial {
            inner.trial_in_flight = false;
            if outcome == Outcome::Success {
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
                inner.stats.reset();
                debug!(operation = %self.name, "trial call succeeded, circuit closed");
            } else {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                warn!(operation = %self.name, "trial call failed, circuit reopened");
            }
            return;
        }

        if inner.state == CircuitState::Closed {
            let (requests, errors) = inner.stats.totals(now);
            let volume_met = requests >= self.settings.request_volume_threshold;
            let rate_met =
                errors * 100 >= requests * u32::from(self.settings.error_percent_threshold);
            if volume_met && rate_met {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                warn!(
                    operation = %self.name,
                    requests,
                    errors,
                    "error rate threshold exceeded, circuit opened"
                );
            }
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_settings() -> GatewaySettings {
        GatewaySettings::default()
            .with_timeout(Duration::from_millis(50))
            .with_request_volume_threshold(5)
            .with_sleep_window(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let breaker = CircuitBreaker::new("ok", fast_settings());
        let result: Result<u32, GatewayError<std::io::Error>> =
            breaker.execute(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_domain_error_is_not_transient() {
        let breaker = CircuitBreaker::new("err", fast_settings());
        let result: Result<(), GatewayError<String>> =
            breaker.execute(|| async { Err("no such row".to_string()) }).await;

        match result.unwrap_err() {
            GatewayError::Inner(msg) => assert_eq!(msg, "no such row"),
            other => panic!("expected Inner, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_yields_timeout_error() {
        let breaker = CircuitBreaker::new("slow", fast_settings());
        let result: Result<(), GatewayError<String>> = breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result.unwrap_err(), GatewayError::Timeout));
    }

    #[tokio::test]
    async fn test_circuit_opens_after_consecutive_timeouts() {
        let breaker = CircuitBreaker::new("insert_wallet", fast_settings());
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..5 {
            let calls = Arc::clone(&calls);
            let result: Result<(), GatewayError<String>> = breaker
                .execute(move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                })
                .await;
            assert!(matches!(result.unwrap_err(), GatewayError::Timeout));
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        // The sixth call fails fast without invoking the function
        let calls_before = calls.load(Ordering::SeqCst);
        let result: Result<(), GatewayError<String>> = breaker
            .execute({
                let calls = Arc::clone(&calls);
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result.unwrap_err(), GatewayError::CircuitOpen));
        assert_eq!(calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn test_half_open_trial_success_closes() {
        let breaker = CircuitBreaker::new("recovering", fast_settings());

        for _ in 0..5 {
            let _: Result<(), GatewayError<String>> =
                breaker.execute(|| async { Err("down".to_string()) }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        // Cooldown elapses; the next call is the half-open trial
        tokio::time::sleep(Duration::from_millis(150)).await;
        let result: Result<u32, GatewayError<String>> =
            breaker.execute(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);

        // Back to normal behavior
        let result: Result<u32, GatewayError<String>> =
            breaker.execute(|| async { Ok(8) }).await;
        assert_eq!(result.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_half_open_trial_failure_reopens() {
        let breaker = CircuitBreaker::new("flapping", fast_settings());

        for _ in 0..5 {
            let _: Result<(), GatewayError<String>> =
                breaker.execute(|| async { Err("down".to_string()) }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let result: Result<(), GatewayError<String>> =
            breaker.execute(|| async { Err("still down".to_string()) }).await;
        assert!(matches!(result.unwrap_err(), GatewayError::Inner(_)));
        assert_eq!(breaker.state(), CircuitState::Open);

        // And the breaker fails fast again until the next cooldown
        let result: Result<(), GatewayError<String>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(matches!(result.unwrap_err(), GatewayError::CircuitOpen));
    }

    #[tokio::test]
    async fn test_capacity_ceiling_rejects() {
        let settings = fast_settings()
            .with_max_concurrent(1)
            .with_timeout(Duration::from_millis(500));
        let breaker = Arc::new(CircuitBreaker::new("narrow", settings));

        let slow = {
            let breaker = Arc::clone(&breaker);
            tokio::spawn(async move {
                let result: Result<(), GatewayError<String>> = breaker
                    .execute(|| async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(())
                    })
                    .await;
                result
            })
        };

        // Give the first call time to occupy the only permit
        tokio::time::sleep(Duration::from_millis(50)).await;
        let result: Result<(), GatewayError<String>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(matches!(result.unwrap_err(), GatewayError::CapacityExceeded));

        assert!(slow.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_late_result_is_abandoned() {
        let breaker = CircuitBreaker::new("laggard", fast_settings());
        let finished = Arc::new(AtomicU32::new(0));

        let result: Result<(), GatewayError<String>> = breaker
            .execute({
                let finished = Arc::clone(&finished);
                move || async move {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result.unwrap_err(), GatewayError::Timeout));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        // The task keeps running to completion in the background, but its
        // result was never applied to the caller
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
