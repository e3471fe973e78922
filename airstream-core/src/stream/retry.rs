use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::RetrySection;

use super::{StreamError, StreamResult};

/// Exponential backoff: the wait before retry `k` is `base^k` seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub result: T,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_seconds: u64) -> Self {
        Self {
            max_retries,
            backoff_base_seconds,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        Duration::from_secs(self.backoff_base_seconds.saturating_pow(retry))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. Backoff waits end early on cancellation.
    pub async fn run<F, Fut, T>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> StreamResult<RetryOutcome<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StreamResult<T>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(result) => {
                    return Ok(RetryOutcome {
                        result,
                        attempts: attempt,
                    })
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= max_attempts => {
                    error!(stage = label, attempts = attempt, error = %err, "retry budget exhausted");
                    return Err(StreamError::RetriesExhausted {
                        label: label.to_string(),
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.delay_for_retry(attempt);
                    warn!(stage = label, attempt, wait = ?delay, error = %err, "encoder failed, retrying");
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                    }
                }
            }
        }
    }
}

impl From<&RetrySection> for RetryPolicy {
    fn from(section: &RetrySection) -> Self {
        Self::new(section.max_retries, section.backoff_base_seconds)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySection::default())
    }
}
