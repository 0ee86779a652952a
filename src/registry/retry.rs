//! Retry policy for registry requests
//!
//! 429, 5xx, timeouts, undecodable bodies and non-success result codes are
//! retried up to `attempts` times, waiting `backoff * attempt` in between.
//! Any other 4xx ends the lookup at once with an empty result.
//!
//! Each attempt, including the one after a backoff sleep, starts with a
//! cancellation checkpoint.

use super::transport::TransportError;
use crate::cancel::{CancellationToken, Cancelled};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with linear backoff (`backoff * attempt`)
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Run `op` until it succeeds.
    ///
    /// Ok(None) once attempts are exhausted or on a non-retryable failure;
    /// callers treat that as an empty result. The token is checked before
    /// every attempt and after every backoff, so a cancelled run sends nothing
    /// further.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<Option<T>, Cancelled>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            cancel.check()?;
            match op().await {
                Ok(value) => return Ok(Some(value)),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(label, attempt, ?delay, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_retryable() => {
                    warn!(label, attempts, error = %err, "giving up after retries");
                    return Ok(None);
                }
                Err(err) => {
                    debug!(label, error = %err, "no result");
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .run("test", &CancellationToken::new(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TransportError::Status(503))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(Some(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_yield_none() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<()>, Cancelled> = policy()
            .run("test", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::Status(429)) }
            })
            .await;

        assert_eq!(result, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<()>, Cancelled> = policy()
            .run("test", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::Status(404)) }
            })
            .await;

        assert_eq!(result, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_retries() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<Option<()>, Cancelled> = policy()
            .run("test", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                async { Err(TransportError::Status(503)) }
            })
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_sends_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<Option<()>, Cancelled> = policy()
            .run("test", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(800));
        assert_eq!(policy.delay_for(1), Duration::from_millis(800));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1600));
    }
}
