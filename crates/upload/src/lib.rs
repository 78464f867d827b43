//! Upload engine for the coaching library.
//!
//! Files go straight to object storage through presigned URLs; the backend
//! only opens the session, hands out part URLs and records the finished
//! resource. Large files are split into parts that are sent in bounded
//! parallel batches, each step retried with exponential backoff, and the
//! whole attempt can be cancelled through one token.
//!
//! [`UploadOrchestrator`] is the entry point; the pieces it drives are
//! public for callers that need finer control.

pub mod backend;
pub mod completion;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod scheduler;
pub mod transporter;
pub mod types;

#[cfg(test)]
mod mock_http;
#[cfg(test)]
mod testutil;

pub use backend::{HttpBackend, UploadBackend};
pub use completion::{CompletionNotifier, PendingFinalize};
pub use error::UploadError;
pub use orchestrator::UploadOrchestrator;
pub use planner::UploadPlanner;
pub use retry::{RetryEvent, RetryPolicy, RetryStep};
pub use scheduler::ChunkScheduler;
pub use transporter::{HttpTransporter, PutRequest, PutResponse, Transporter};
pub use types::{
    NoopObserver, OutcomeSummary, SchedulerConfig, TimeoutConfig, UploadConfig, UploadEvent,
    UploadFailure, UploadObserver, UploadOutcome, UploadRequest,
};
