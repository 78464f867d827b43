//! Data types for the upload flow.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use coachlib_protocol::constants::{API_TIMEOUT, PART_PUT_TIMEOUT, SINGLE_PUT_TIMEOUT};
use coachlib_protocol::messages::UploadedResource;
use coachlib_protocol::types::Category;
use coachlib_transfer::{ResourceMetadata, UploadStatus};

use crate::error::UploadError;
use crate::retry::{RetryEvent, RetryPolicy, RetryStep};

/// Receives side-channel notifications while an attempt runs.
///
/// Every method defaults to a no-op. Implementations must not block.
pub trait UploadObserver: Send + Sync {
    /// A step failed and will be retried after `event.delay`.
    fn on_retry(&self, _event: &RetryEvent) {}

    /// The backoff announced for `step` elapsed and its next attempt is
    /// starting.
    fn on_retry_resumed(&self, _step: RetryStep) {}

    /// Overall progress changed (0–100). May go down when a part restarts.
    fn on_progress(&self, _percent: f64) {}

    /// Storage acknowledged a part.
    fn on_part_completed(&self, _part_number: u32) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}

/// Part transfer concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Parts in flight at once; also the batch size.
    pub max_parallel: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_parallel: 3 }
    }
}

/// Per-request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub single_put: Duration,
    pub part_put: Duration,
    pub api_call: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            single_put: SINGLE_PUT_TIMEOUT,
            part_put: PART_PUT_TIMEOUT,
            api_call: API_TIMEOUT,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadConfig {
    pub retry: RetryPolicy,
    pub scheduler: SchedulerConfig,
    pub timeouts: TimeoutConfig,
}

/// What the user asked to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    /// `None` when no file was selected; rejected before any request.
    pub file: Option<PathBuf>,
    /// Overrides the type guessed from the file extension.
    pub mime_type: Option<String>,
    pub category: Category,
    pub metadata: ResourceMetadata,
}

/// Progress event emitted during an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    StateChanged(UploadStatus),
    Progress {
        percent: f64,
    },
    /// A step is waiting `delay` before retry number `attempt`.
    Retrying {
        step: RetryStep,
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    PartCompleted {
        part_number: u32,
    },
    Finished(OutcomeSummary),
}

/// Display form of an [`UploadOutcome`], carried by [`UploadEvent::Finished`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeSummary {
    Succeeded { url: String },
    Cancelled,
    Failed { message: String },
}

/// Terminal result of one attempt.
#[derive(Debug)]
pub enum UploadOutcome {
    Succeeded(UploadedResource),
    Cancelled,
    Failed(UploadFailure),
}

impl UploadOutcome {
    pub fn summary(&self) -> OutcomeSummary {
        match self {
            Self::Succeeded(resource) => OutcomeSummary::Succeeded {
                url: resource.url.clone(),
            },
            Self::Cancelled => OutcomeSummary::Cancelled,
            Self::Failed(failure) => OutcomeSummary::Failed {
                message: failure.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// A failed attempt: the underlying error plus how many retries were spent.
#[derive(Debug)]
pub struct UploadFailure {
    pub error: UploadError,
    pub retries: u32,
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        match self.retries {
            0 => Ok(()),
            1 => f.write_str(" (Retried 1 time)"),
            n => write!(f, " (Retried {n} times)"),
        }
    }
}
