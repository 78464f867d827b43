//! Bounded-parallel part transfer.
//!
//! Parts go out in sequential batches of `max_parallel`. A batch runs its
//! parts concurrently on the current task and must fully succeed before the
//! next one starts. The first part that fails for good fails the batch, and
//! its still-running siblings are dropped, which aborts their requests.

use std::sync::{Arc, Mutex, PoisonError};

use coachlib_protocol::messages::{CompletedPart, PartUrlRequest};
use coachlib_transfer::{FileSource, PartDescriptor, ProgressAggregator, TransferPlan, UploadSession};
use futures_util::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::UploadBackend;
use crate::error::UploadError;
use crate::retry::{RetryPolicy, RetryStep, cancellable};
use crate::transporter::{ProgressFn, PutRequest, Transporter, put_part};
use crate::types::{SchedulerConfig, TimeoutConfig, UploadObserver};

/// Transfers the bytes of one session.
pub struct ChunkScheduler<'a> {
    backend: &'a dyn UploadBackend,
    transporter: &'a dyn Transporter,
    retry: RetryPolicy,
    config: SchedulerConfig,
    timeouts: TimeoutConfig,
    observer: Arc<dyn UploadObserver>,
}

impl<'a> ChunkScheduler<'a> {
    pub fn new(
        backend: &'a dyn UploadBackend,
        transporter: &'a dyn Transporter,
        retry: RetryPolicy,
        config: SchedulerConfig,
        timeouts: TimeoutConfig,
        observer: Arc<dyn UploadObserver>,
    ) -> Self {
        Self {
            backend,
            transporter,
            retry,
            config,
            timeouts,
            observer,
        }
    }

    /// Uploads every byte of `source` as `session` prescribes.
    ///
    /// Returns the completed parts in arrival order for a multipart session
    /// and an empty list for a single PUT.
    pub async fn run(
        &self,
        session: &UploadSession,
        source: &FileSource,
        cancel: &CancellationToken,
    ) -> Result<Vec<CompletedPart>, UploadError> {
        if source.size() != session.file_size {
            return Err(UploadError::Transfer(coachlib_transfer::TransferError::InvalidSession(
                format!(
                    "session is for {} bytes but the file has {}",
                    session.file_size,
                    source.size()
                ),
            )));
        }

        let progress = Arc::new(Mutex::new(ProgressAggregator::new(session.total_chunks())));
        match &session.plan {
            TransferPlan::Single { presigned_url } => {
                self.run_single(session, source, presigned_url, &progress, cancel)
                    .await?;
                Ok(Vec::new())
            }
            TransferPlan::Multipart { upload_id, .. } => {
                self.run_multipart(session, source, upload_id, &progress, cancel)
                    .await
            }
        }
    }

    async fn run_single(
        &self,
        session: &UploadSession,
        source: &FileSource,
        url: &str,
        progress: &Arc<Mutex<ProgressAggregator>>,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let body = source.read_all().await?;
        let on_progress = self.part_progress(progress, 1);

        self.retry
            .run(RetryStep::SinglePut, cancel, Some(&*self.observer), |attempt| {
                if attempt > 0 {
                    self.restart_part(progress, 1);
                }
                let req = PutRequest {
                    url: url.to_string(),
                    body: body.clone(),
                    content_type: Some(session.file_type.clone()),
                    timeout: self.timeouts.single_put,
                    part_number: None,
                };
                self.transporter.put(req, on_progress.clone(), cancel)
            })
            .await?;

        self.finish_part(progress, 1);
        info!(file_path = %session.file_path, bytes = source.size(), "single upload transferred");
        Ok(())
    }

    async fn run_multipart(
        &self,
        session: &UploadSession,
        source: &FileSource,
        upload_id: &str,
        progress: &Arc<Mutex<ProgressAggregator>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CompletedPart>, UploadError> {
        let parts = session.parts()?;
        let batch_size = self.config.max_parallel.max(1);
        let mut completed = Vec::with_capacity(parts.len());

        for (index, batch) in parts.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            debug!(
                upload_id,
                batch = index + 1,
                first_part = batch[0].part_number,
                size = batch.len(),
                "starting batch"
            );

            // A failed part cancels its siblings before the batch returns.
            let batch_cancel = cancel.child_token();
            let tasks = batch.iter().cloned().map(|part| {
                let batch_cancel = &batch_cancel;
                async move {
                    let result = self
                        .run_part(session, source, upload_id, part, progress, batch_cancel)
                        .await;
                    if result.is_err() {
                        batch_cancel.cancel();
                    }
                    result
                }
            });
            completed.extend(try_join_all(tasks).await?);
        }

        info!(
            upload_id,
            file_path = %session.file_path,
            parts = completed.len(),
            "all parts transferred"
        );
        Ok(completed)
    }

    /// Fetches a URL for one part, then sends its bytes.
    async fn run_part(
        &self,
        session: &UploadSession,
        source: &FileSource,
        upload_id: &str,
        mut part: PartDescriptor,
        progress: &Arc<Mutex<ProgressAggregator>>,
        cancel: &CancellationToken,
    ) -> Result<CompletedPart, UploadError> {
        let part_number = part.part_number;
        let observer = Some(&*self.observer);

        let url_req = PartUrlRequest {
            file_path: session.file_path.clone(),
            upload_id: upload_id.to_string(),
            part_number,
        };
        let url = self
            .retry
            .run(RetryStep::PartUrl(part_number), cancel, observer, |_| {
                cancellable(cancel, self.backend.part_url(&url_req))
            })
            .await
            .map_err(|e| match e {
                UploadError::Cancelled => e,
                other => UploadError::PartUrl {
                    part_number,
                    message: other.to_string(),
                },
            })?
            .presigned_url;
        part.presigned_url = Some(url.clone());

        let body = source.read_range(part.range).await?;
        let on_progress = self.part_progress(progress, part_number);

        let etag = self
            .retry
            .run(RetryStep::PartPut(part_number), cancel, observer, |attempt| {
                if attempt > 0 {
                    self.restart_part(progress, part_number);
                }
                put_part(
                    self.transporter,
                    &url,
                    body.clone(),
                    part_number,
                    self.timeouts.part_put,
                    on_progress.clone(),
                    cancel,
                )
            })
            .await?;
        part.etag = Some(etag);

        self.finish_part(progress, part_number);
        self.observer.on_part_completed(part_number);
        debug!(upload_id, part_number, bytes = part.range.len(), "part transferred");

        part.completed()
            .ok_or(UploadError::MissingETag { part_number })
    }

    /// Progress callback bound to one part number.
    fn part_progress(&self, progress: &Arc<Mutex<ProgressAggregator>>, part_number: u32) -> ProgressFn {
        let progress = progress.clone();
        let observer = self.observer.clone();
        Arc::new(move |fraction| {
            let overall = lock(&progress).update(part_number, fraction);
            observer.on_progress(overall);
        })
    }

    fn restart_part(&self, progress: &Arc<Mutex<ProgressAggregator>>, part_number: u32) {
        let overall = lock(progress).reset(part_number);
        self.observer.on_progress(overall);
    }

    fn finish_part(&self, progress: &Arc<Mutex<ProgressAggregator>>, part_number: u32) {
        let overall = lock(progress).update(part_number, 1.0);
        self.observer.on_progress(overall);
    }
}

fn lock(progress: &Mutex<ProgressAggregator>) -> std::sync::MutexGuard<'_, ProgressAggregator> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}
