//! Bounded exponential-backoff retry.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::types::UploadObserver;

/// The step of an upload a retry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    Initiate,
    PartUrl(u32),
    PartPut(u32),
    SinglePut,
    Complete,
}

impl fmt::Display for RetryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiate => f.write_str("initiate"),
            Self::PartUrl(n) => write!(f, "part-url {n}"),
            Self::PartPut(n) => write!(f, "part {n}"),
            Self::SinglePut => f.write_str("upload"),
            Self::Complete => f.write_str("complete"),
        }
    }
}

/// Emitted before every backoff delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent {
    pub step: RetryStep,
    /// 1-based number of the retry about to happen.
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub error: String,
}

/// Retry configuration: `max_retries` extra attempts after the first one,
/// waiting `base_delay * 2^k` before attempt `k + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failure of 0-based attempt `attempt`. No jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(31)))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// `max_retries + 1` attempts have been made.
    ///
    /// `op` receives the 0-based attempt number and must observe `cancel`
    /// itself while it runs. The backoff delay observes `cancel` here. The
    /// last error is returned as-is.
    pub async fn run<T, F, Fut>(
        &self,
        step: RetryStep,
        cancel: &CancellationToken,
        observer: Option<&dyn UploadObserver>,
        mut op: F,
    ) -> Result<T, UploadError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let err = match op(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(step = %step, attempt, "step succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                return Err(err);
            }

            let delay = self.delay_for_attempt(attempt);
            warn!(
                step = %step,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "step failed, retrying"
            );
            if let Some(observer) = observer {
                observer.on_retry(&RetryEvent {
                    step,
                    attempt: attempt + 1,
                    max_retries: self.max_retries,
                    delay,
                    error: err.to_string(),
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            if let Some(observer) = observer {
                observer.on_retry_resumed(step);
            }

            attempt += 1;
        }
    }
}

/// Runs `fut` unless `cancel` fires first, in which case `fut` is dropped.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, UploadError>>,
) -> Result<T, UploadError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        res = fut => res,
    }
}
