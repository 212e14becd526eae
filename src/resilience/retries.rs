//! Bounded retry for read-style backend calls.
//!
//! # Responsibilities
//! - Re-attempt transient transport failures up to the configured budget
//! - Sleep the doubling backoff schedule between attempts
//! - Surface the final error unmodified
//!
//! # Design Decisions
//! - Retry wraps the breaker, never the reverse: every attempt re-enters
//!   admission control, so an opening breaker ends the sequence early
//! - Only transport-level statuses are transient; application statuses and
//!   breaker rejections return on first occurrence
//! - The closure builds a fresh call per attempt, which re-reads the current
//!   client slot instead of reusing a stale handle

use std::future::Future;

use tonic::Code;

use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::retry_delay;
use crate::resilience::CallError;

/// Transport statuses worth a second attempt.
pub fn is_transient(code: Code) -> bool {
    matches!(
        code,
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled
    )
}

/// Bounded-retry runner, cheap to copy into handlers.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Run `make_call` until it succeeds, a non-transient error appears, or
    /// the attempt budget is spent.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut make_call: F,
    ) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut attempt = 1u32;
        loop {
            match make_call().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "backend call recovered after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let transient =
                        matches!(&err, CallError::Rpc(status) if is_transient(status.code()));
                    if !transient || attempt >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = retry_delay(attempt, self.base_delay_ms, self.max_delay_ms);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient backend failure, retrying"
                    );
                    metrics::record_retry(operation);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;
    use tonic::Status;

    fn policy(max_attempts: u32, base_delay_ms: u64) -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_attempts,
            base_delay_ms,
            max_delay_ms: 2000,
        })
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = policy(3, 100)
            .run("list_items", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(CallError::Rpc(Status::unavailable("connect refused")))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // ~100ms + ~200ms of backoff, with jitter headroom.
        let elapsed = started.elapsed().as_millis();
        assert!((300..900).contains(&elapsed), "elapsed {elapsed}ms");
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_the_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy(3, 10)
            .run("list_items", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::Rpc(Status::unavailable("still down"))) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            CallError::Rpc(status) => {
                assert_eq!(status.code(), Code::Unavailable);
                assert_eq!(status.message(), "still down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn application_status_is_never_retried() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = policy(3, 100)
            .run("get_item", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::Rpc(Status::not_found("no item 7"))) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed().as_millis() < 50);
        assert!(matches!(result.unwrap_err(), CallError::Rpc(_)));
    }

    #[tokio::test]
    async fn breaker_open_short_circuits_the_sequence() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy(3, 100)
            .run("get_item", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::BreakerOpen) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result.unwrap_err(), CallError::BreakerOpen));
    }

    #[tokio::test]
    async fn single_attempt_policy_never_sleeps() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let _ = policy(1, 500)
            .run("get_item", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(CallError::Rpc(Status::unavailable("down"))) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed().as_millis() < 100);
    }
}
