//! Finalizes the stored object and records the resource.

use coachlib_protocol::messages::{
    CompleteMultipartRequest, CompleteRequest, CompletedPart, UploadedResource,
};
use coachlib_transfer::{ResourceMetadata, TransferError, TransferPlan, UploadSession};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::UploadBackend;
use crate::error::UploadError;
use crate::retry::{RetryPolicy, RetryStep, cancellable};
use crate::types::UploadObserver;

/// A finalize call ready to be submitted, or resubmitted after a
/// [`UploadError::Completion`].
#[derive(Debug, Clone, PartialEq)]
pub enum PendingFinalize {
    Single(CompleteRequest),
    Multipart(CompleteMultipartRequest),
}

impl PendingFinalize {
    /// Builds the finalize call for a fully transferred session.
    ///
    /// For multipart sessions the parts are sorted by part number and must
    /// be exactly `1..=total_chunks`, each with a non-empty entity tag.
    pub fn prepare(
        session: &UploadSession,
        mut parts: Vec<CompletedPart>,
        metadata: &ResourceMetadata,
    ) -> Result<Self, UploadError> {
        let meta = metadata.normalized(session.category);

        match &session.plan {
            TransferPlan::Single { .. } => Ok(Self::Single(CompleteRequest {
                file_path: session.file_path.clone(),
                file_name: session.file_name.clone(),
                title: meta.title,
                description: meta.description,
                author: meta.author,
                category: session.category,
                file_size: session.file_size,
                file_type: session.file_type.clone(),
                folder_id: meta.folder_id,
            })),
            TransferPlan::Multipart {
                upload_id,
                total_chunks,
                ..
            } => {
                parts.sort_by_key(|p| p.part_number);
                check_manifest(&parts, *total_chunks)?;
                Ok(Self::Multipart(CompleteMultipartRequest {
                    file_path: session.file_path.clone(),
                    file_name: session.file_name.clone(),
                    upload_id: upload_id.clone(),
                    parts,
                    title: meta.title,
                    description: meta.description,
                    author: meta.author,
                    category: session.category,
                    file_size: session.file_size,
                    file_type: session.file_type.clone(),
                    folder_id: meta.folder_id,
                }))
            }
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            Self::Single(r) => &r.file_path,
            Self::Multipart(r) => &r.file_path,
        }
    }

    /// Sorted manifest of a multipart finalize; empty for a single upload.
    pub fn parts(&self) -> &[CompletedPart] {
        match self {
            Self::Single(_) => &[],
            Self::Multipart(r) => &r.parts,
        }
    }
}

fn check_manifest(parts: &[CompletedPart], total_chunks: u32) -> Result<(), UploadError> {
    if parts.len() != total_chunks as usize {
        return Err(TransferError::InvalidSession(format!(
            "{} of {total_chunks} parts transferred",
            parts.len()
        ))
        .into());
    }
    for (expected, part) in (1..=total_chunks).zip(parts) {
        if part.part_number != expected {
            return Err(TransferError::InvalidSession(format!(
                "part {expected} missing from manifest (found {})",
                part.part_number
            ))
            .into());
        }
        if part.etag.is_empty() {
            return Err(UploadError::MissingETag {
                part_number: part.part_number,
            });
        }
    }
    Ok(())
}

/// Submits finalize calls.
pub struct CompletionNotifier<'a> {
    backend: &'a dyn UploadBackend,
    retry: RetryPolicy,
    observer: Option<&'a dyn UploadObserver>,
}

impl<'a> CompletionNotifier<'a> {
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

    /// Submits `pending` (retried).
    ///
    /// Failures other than cancellation come back as
    /// [`UploadError::Completion`] carrying `pending` for a later
    /// [`retry_finalize`](Self::retry_finalize).
    pub async fn finalize(
        &self,
        pending: PendingFinalize,
        cancel: &CancellationToken,
    ) -> Result<UploadedResource, UploadError> {
        let result = self
            .retry
            .run(RetryStep::Complete, cancel, self.observer, |_| {
                cancellable(cancel, self.submit(&pending))
            })
            .await;

        match result {
            Ok(resource) => {
                info!(file_path = %pending.file_path(), url = %resource.url, "upload finalized");
                Ok(resource)
            }
            Err(UploadError::Cancelled) => Err(UploadError::Cancelled),
            Err(e) => {
                warn!(
                    file_path = %pending.file_path(),
                    error = %e,
                    "finalize failed; stored bytes can be finalized again without re-upload"
                );
                Err(UploadError::Completion {
                    message: e.to_string(),
                    pending: Box::new(pending),
                })
            }
        }
    }

    /// Resubmits a finalize call from a previous [`UploadError::Completion`].
    /// No bytes are transferred.
    pub async fn retry_finalize(
        &self,
        pending: PendingFinalize,
        cancel: &CancellationToken,
    ) -> Result<UploadedResource, UploadError> {
        info!(
            file_path = %pending.file_path(),
            parts = pending.parts().len(),
            "retrying finalize"
        );
        self.finalize(pending, cancel).await
    }

    async fn submit(&self, pending: &PendingFinalize) -> Result<UploadedResource, UploadError> {
        match pending {
            PendingFinalize::Single(req) => self.backend.complete(req).await,
            PendingFinalize::Multipart(req) => self.backend.complete_multipart(req).await,
        }
    }
}
