//! Opens the backend upload session.

use coachlib_protocol::messages::InitiateRequest;
use coachlib_protocol::types::Category;
use coachlib_transfer::{FileSource, UploadSession};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::UploadBackend;
use crate::error::UploadError;
use crate::retry::{RetryPolicy, RetryStep, cancellable};
use crate::types::UploadObserver;

/// Asks the backend how to upload a file.
///
/// The split policy (size threshold, chunk size) belongs to the backend;
/// the planner only checks that what comes back fits the file.
pub struct UploadPlanner<'a> {
    backend: &'a dyn UploadBackend,
    retry: RetryPolicy,
    observer: Option<&'a dyn UploadObserver>,
}

impl<'a> UploadPlanner<'a> {
    pub fn new(
        backend: &'a dyn UploadBackend,
        retry: RetryPolicy,
        observer: Option<&'a dyn UploadObserver>,
    ) -> Self {
        Self {
            backend,
            retry,
            observer,
        }
    }

    /// Calls initiate (retried) and builds the session.
    ///
    /// Any failure other than cancellation surfaces as
    /// [`UploadError::Initiation`].
    pub async fn plan(
        &self,
        source: &FileSource,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<UploadSession, UploadError> {
        let req = InitiateRequest {
            file_name: source.file_name().to_string(),
            file_size: source.size(),
            file_type: source.mime_type().to_string(),
            category,
        };

        let resp = self
            .retry
            .run(RetryStep::Initiate, cancel, self.observer, |attempt| {
                if attempt > 0 {
                    // Initiation is not known to be idempotent.
                    warn!(
                        file_name = %req.file_name,
                        attempt,
                        "re-sending initiate; a multipart upload opened by an earlier attempt may be left orphaned"
                    );
                }
                cancellable(cancel, self.backend.initiate(&req))
            })
            .await
            .map_err(into_initiation)?;

        let session =
            UploadSession::from_initiate(resp, source.size(), source.mime_type(), category)
                .map_err(|e| UploadError::Initiation(e.to_string()))?;

        info!(
            file_path = %session.file_path,
            upload_type = ?session.upload_type(),
            upload_id = session.upload_id().unwrap_or(""),
            total_chunks = session.total_chunks(),
            "upload session opened"
        );
        Ok(session)
    }
}

fn into_initiation(err: UploadError) -> UploadError {
    match err {
        UploadError::Cancelled | UploadError::Initiation(_) => err,
        other => UploadError::Initiation(other.to_string()),
    }
}
