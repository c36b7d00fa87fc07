//! Timeout-and-retry wrapper for network-bound calls.

use std::future::Future;
use std::time::Duration;

/// Per-attempt timeout plus a backoff schedule. A timed-out attempt is
/// retried like any other failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Delay before each retry; `delays.len()` retries after the first attempt.
    pub delays: Vec<Duration>,
}

/// Failure of the final attempt.
#[derive(Debug, thiserror::Error)]
pub enum Attempt<E> {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Failed(E),
}

impl RetryPolicy {
    /// Exponential backoff starting at 500ms, doubling, capped at 4s.
    pub fn exponential(timeout: Duration, retries: usize) -> Self {
        let delays = (0..retries)
            .map(|i| Duration::from_millis((500u64 << i.min(3)).min(4_000)))
            .collect();
        Self { timeout, delays }
    }

    /// A single attempt with no retries.
    pub fn once(timeout: Duration) -> Self {
        Self {
            timeout,
            delays: Vec::new(),
        }
    }

    /// Run `op` until it succeeds or the schedule is exhausted.
    ///
    /// `retryable` decides whether a given error is worth another attempt;
    /// timeouts always are.
    pub async fn run<T, E, F, Fut>(
        &self,
        op_name: &str,
        retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, Attempt<E>>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => Attempt::Failed(e),
                Err(_) => Attempt::TimedOut(self.timeout),
            };

            let may_retry = match &outcome {
                Attempt::TimedOut(_) => true,
                Attempt::Failed(e) => retryable(e),
            };
            let Some(delay) = self.delays.get(attempt).filter(|_| may_retry) else {
                return Err(outcome);
            };

            attempt += 1;
            tracing::warn!(op = op_name, attempt, error = %outcome, "Attempt failed, retrying");
            tokio::time::sleep(*delay).await;
        }
    }
}
