//! Circuit breaker for gateway→backend calls.
//!
//! # Responsibilities
//! - Count consecutive backend failures and open after the threshold
//! - Fail fast while open, without touching the backend
//! - Admit a single trial call after the reset timeout (half-open)
//! - Close on trial success, reopen on trial failure
//!
//! # Design Decisions
//! - Application-level statuses (not-found, invalid-argument, already-exists)
//!   describe the request, not backend health: the breaker treats them as
//!   completed round-trips
//! - All state lives behind one mutex so concurrent failures cannot both
//!   decide to transition; the lock is never held across an await
//! - Results from calls admitted before a transition are attributed via the
//!   admission kind, so a late straggler cannot close or double-open the
//!   breaker
//! - A half-open trial abandoned by a disconnected caller expires after the
//!   reset timeout and a new trial is admitted

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tonic::{Code, Status};

use crate::config::schema::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::CallError;

/// Breaker states as reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view for the health endpoint.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub open_for: Option<Duration>,
}

/// How a call was admitted; decides how its outcome is recorded.
#[derive(Debug, Clone, Copy)]
enum Admission {
    Pass,
    Trial,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
}

/// Statuses that describe the request rather than backend health.
pub fn is_application_status(code: Code) -> bool {
    matches!(
        code,
        Code::NotFound | Code::InvalidArgument | Code::AlreadyExists
    )
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started: None,
            }),
        }
    }

    /// Run `call` under the breaker.
    ///
    /// While open this fails fast with [`CallError::BreakerOpen`] and the
    /// future is never polled. Backend statuses pass through unmodified
    /// inside [`CallError::Rpc`].
    pub async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, Status>>,
    {
        let admission = self.admit(operation)?;
        match call.await {
            Ok(value) => {
                self.record_success(admission, operation);
                Ok(value)
            }
            Err(status) => {
                // An application status is a completed round-trip: the
                // backend answered, so for breaker accounting it is a
                // success. Only transport-class failures count.
                if is_application_status(status.code()) {
                    self.record_success(admission, operation);
                } else {
                    self.record_failure(admission, operation, &status);
                }
                Err(CallError::Rpc(status))
            }
        }
    }

    /// Manual close, exposed through the gateway's reset endpoint.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_started = None;
        tracing::info!("circuit breaker manually reset to closed");
        metrics::set_breaker_state(BreakerState::Closed.as_str());
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            open_for: inner.opened_at.map(|t| t.elapsed()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock still holds coherent counters; keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn admit(&self, operation: &'static str) -> Result<Admission, CallError> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Ok(Admission::Pass),
            BreakerState::Open => {
                let waited = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if waited >= self.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_started = Some(Instant::now());
                    tracing::info!(
                        operation,
                        waited_secs = waited.as_secs(),
                        "circuit breaker half-open, admitting trial call"
                    );
                    metrics::set_breaker_state(BreakerState::HalfOpen.as_str());
                    Ok(Admission::Trial)
                } else {
                    Err(CallError::BreakerOpen)
                }
            }
            BreakerState::HalfOpen => {
                let stale = inner
                    .trial_started
                    .map(|t| t.elapsed() >= self.reset_timeout)
                    .unwrap_or(true);
                if stale {
                    inner.trial_started = Some(Instant::now());
                    tracing::warn!(operation, "previous trial never resolved, admitting a new one");
                    Ok(Admission::Trial)
                } else {
                    Err(CallError::BreakerOpen)
                }
            }
        }
    }

    fn record_success(&self, admission: Admission, operation: &'static str) {
        let mut inner = self.lock();
        match admission {
            Admission::Trial => {
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.trial_started = None;
                tracing::info!(operation, "trial call succeeded, circuit breaker closed");
                metrics::set_breaker_state(BreakerState::Closed.as_str());
                metrics::record_breaker_transition("closed");
            }
            Admission::Pass => {
                if inner.state == BreakerState::Closed {
                    inner.consecutive_failures = 0;
                }
            }
        }
    }

    fn record_failure(&self, admission: Admission, operation: &'static str, status: &Status) {
        let mut inner = self.lock();
        match admission {
            Admission::Trial => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_started = None;
                tracing::warn!(
                    operation,
                    code = %status.code(),
                    "trial call failed, circuit breaker reopened"
                );
                metrics::set_breaker_state(BreakerState::Open.as_str());
                metrics::record_breaker_transition("open");
            }
            Admission::Pass => {
                if inner.state != BreakerState::Closed {
                    // Straggler from before a transition; already accounted.
                    return;
                }
                inner.consecutive_failures += 1;
                tracing::warn!(
                    operation,
                    code = %status.code(),
                    consecutive_failures = inner.consecutive_failures,
                    "backend call failed"
                );
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        operation,
                        failures = inner.consecutive_failures,
                        reset_timeout_secs = self.reset_timeout.as_secs(),
                        "failure threshold reached, circuit breaker opened"
                    );
                    metrics::set_breaker_state(BreakerState::Open.as_str());
                    metrics::record_breaker_transition("open");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(threshold: u32, reset_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(&BreakerConfig {
            failure_threshold: threshold,
            reset_timeout_secs: reset_secs,
        })
    }

    async fn failing_call(breaker: &CircuitBreaker, code: Code) -> Result<(), CallError> {
        breaker
            .call("test_op", async move { Err(Status::new(code, "injected")) })
            .await
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = breaker(3, 30);

        for _ in 0..2 {
            assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);

        // Open breaker rejects without polling the call.
        let polled = AtomicU32::new(0);
        let result = breaker
            .call("test_op", async {
                polled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Status>(())
            })
            .await;
        assert!(matches!(result, Err(CallError::BreakerOpen)));
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_resets_the_failure_count() {
        let breaker = breaker(3, 30);

        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        assert!(breaker
            .call("test_op", async { Ok::<_, Status>(()) })
            .await
            .is_ok());
        assert_eq!(breaker.snapshot().consecutive_failures, 0);

        // Two more failures stay below the threshold again.
        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn application_statuses_never_count() {
        let breaker = breaker(3, 30);

        for code in [Code::NotFound, Code::InvalidArgument, Code::AlreadyExists] {
            for _ in 0..4 {
                let err = failing_call(&breaker, code).await.unwrap_err();
                assert!(matches!(err, CallError::Rpc(_)));
            }
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn half_open_admits_one_trial_then_closes_on_success() {
        let breaker = breaker(1, 1);

        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);

        // Before the reset timeout: still rejecting.
        assert!(matches!(
            failing_call(&breaker, Code::Unavailable).await,
            Err(CallError::BreakerOpen)
        ));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let result = breaker
            .call("test_op", async { Ok::<_, Status>("ok") })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn application_status_during_trial_closes() {
        let breaker = breaker(1, 1);

        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        tokio::time::sleep(Duration::from_millis(1100)).await;

        // The backend answered, even if the answer was "no such item":
        // that resolves the trial in favor of closing.
        assert!(matches!(
            failing_call(&breaker, Code::NotFound).await,
            Err(CallError::Rpc(_))
        ));
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn failed_trial_reopens() {
        let breaker = breaker(1, 1);

        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(matches!(
            failing_call(&breaker, Code::Unavailable).await,
            Err(CallError::Rpc(_))
        ));
        assert_eq!(breaker.state(), BreakerState::Open);

        // Fresh open period: rejected again immediately.
        assert!(matches!(
            failing_call(&breaker, Code::Unavailable).await,
            Err(CallError::BreakerOpen)
        ));
    }

    #[tokio::test]
    async fn concurrent_calls_during_trial_are_rejected() {
        let breaker = std::sync::Arc::new(breaker(1, 1));

        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let trial_breaker = breaker.clone();
        let trial = tokio::spawn(async move {
            trial_breaker
                .call("test_op", async move {
                    rx.await.ok();
                    Ok::<_, Status>(())
                })
                .await
        });
        // Give the trial task time to claim the half-open slot.
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The trial is in flight: everyone else is turned away.
        assert!(matches!(
            failing_call(&breaker, Code::Unavailable).await,
            Err(CallError::BreakerOpen)
        ));

        tx.send(()).ok();
        assert!(trial.await.unwrap().is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn manual_reset_closes_and_zeroes() {
        let breaker = breaker(2, 30);

        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        assert!(failing_call(&breaker, Code::Unavailable).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);

        breaker.reset();
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, BreakerState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(snapshot.open_for.is_none());

        assert!(breaker
            .call("test_op", async { Ok::<_, Status>(()) })
            .await
            .is_ok());
    }
}
