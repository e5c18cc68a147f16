//! Bounded retry with exponential backoff for poll requests.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::HostBootError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

/// Result of a request run under a [`RetryPolicy`].
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// The session was discarded while waiting
    Cancelled,
    /// Retries used up, or the error is not worth retrying
    Exhausted(HostBootError),
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// No retries at all: the first failure abandons the chain.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (1-based): initial, 2x, 4x, ... capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    pub async fn run<T, F, Fut>(
        &self,
        what: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Attempt<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HostBootError>>,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                tracing::warn!(
                    "Retrying {} (attempt {}/{}) in {}ms",
                    what,
                    attempt + 1,
                    self.max_retries + 1,
                    delay.as_millis()
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Attempt::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Attempt::Cancelled,
                result = op() => result,
            };

            match result {
                Ok(value) => return Attempt::Done(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    tracing::warn!("{} failed: {}", what, e);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("{} failed after {} attempt(s): {}", what, attempt + 1, e);
                    return Attempt::Exhausted(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }
}
