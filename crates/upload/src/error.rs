//! Upload error types.

use std::time::Duration;

use coachlib_transfer::TransferError;

use crate::completion::PendingFinalize;

/// Errors produced by an upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The backend did not open an upload session.
    #[error("{0}")]
    Initiation(String),

    /// No presigned URL could be obtained for a part.
    #[error("{message}")]
    PartUrl { part_number: u32, message: String },

    /// A request failed at the HTTP level or returned a failure body.
    #[error("{message}")]
    Transport { status: Option<u16>, message: String },

    /// Storage accepted a part but did not return its entity tag.
    #[error("Missing ETag in response for part {part_number}")]
    MissingETag { part_number: u32 },

    /// A request outlived its deadline. `context` names it, e.g.
    /// "Chunk 3 upload".
    #[error("{context} timeout")]
    Timeout { context: String, after: Duration },

    #[error("Upload cancelled")]
    Cancelled,

    /// Every byte is stored but recording the resource failed.
    ///
    /// `pending` holds everything needed to resubmit the finalize call
    /// without transferring any bytes again.
    #[error("{message}")]
    Completion {
        message: String,
        pending: Box<PendingFinalize>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Transfer(#[from] TransferError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl UploadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether running the same step again could succeed.
    ///
    /// Cancellation is never retried. Local validation and state errors are
    /// deterministic and not retried either.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled
                | Self::InvalidConfig(_)
                | Self::Transfer(
                    TransferError::MissingFields(_)
                        | TransferError::InvalidTransition { .. }
                        | TransferError::InvalidRange { .. }
                        | TransferError::InvalidPart { .. }
                )
        )
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The resubmittable finalize call of a [`UploadError::Completion`].
    pub fn into_pending_finalize(self) -> Option<PendingFinalize> {
        match self {
            Self::Completion { pending, .. } => Some(*pending),
            _ => None,
        }
    }
}
