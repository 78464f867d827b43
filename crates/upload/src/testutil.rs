//! In-memory backend and transporter mocks shared by the engine tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use coachlib_protocol::messages::{
    CompleteMultipartRequest, CompleteRequest, InitiateRequest, InitiateResponse, PartUrlRequest,
    PartUrlResponse, UploadedResource,
};
use coachlib_protocol::types::UploadType;
use coachlib_transfer::FileSource;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendFuture, UploadBackend};
use crate::error::UploadError;
use crate::transporter::{ProgressFn, PutFuture, PutRequest, PutResponse, Transporter};

pub(crate) const KB: u64 = 1024;

/// Writes a file of `size` bytes and opens it.
pub(crate) async fn make_source(name: &str, size: u64) -> (TempDir, FileSource) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(name);
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    let source = FileSource::open(&path, None).await.unwrap();
    (dir, source)
}

pub(crate) fn single_initiate(url: &str) -> InitiateResponse {
    InitiateResponse {
        upload_type: UploadType::Single,
        file_path: "library/videos/clip.mp4".into(),
        file_name: "clip.mp4".into(),
        presigned_url: Some(url.to_string()),
        upload_id: None,
        chunk_size: None,
        total_chunks: None,
        public_url: Some("https://cdn.test/library/videos/clip.mp4".into()),
        expires_in: Some(3600),
    }
}

pub(crate) fn multipart_initiate(upload_id: &str, chunk_size: u64, total: u32) -> InitiateResponse {
    InitiateResponse {
        upload_type: UploadType::Multipart,
        file_path: "library/videos/long.mp4".into(),
        file_name: "long.mp4".into(),
        presigned_url: None,
        upload_id: Some(upload_id.to_string()),
        chunk_size: Some(chunk_size),
        total_chunks: Some(total),
        public_url: None,
        expires_in: None,
    }
}

fn transient(message: &str) -> UploadError {
    UploadError::Transport {
        status: Some(503),
        message: message.to_string(),
    }
}

/// Recording [`UploadBackend`] with scripted answers.
///
/// Part URLs are generated as `https://storage.test/<upload_id>/<part>`
/// unless a failure was scripted for that part.
#[derive(Default)]
pub(crate) struct MockBackend {
    initiate_responses: Mutex<VecDeque<Result<InitiateResponse, UploadError>>>,
    part_url_failures: Mutex<HashMap<u32, u32>>,
    complete_failures: Mutex<u32>,
    initiates: Mutex<Vec<InitiateRequest>>,
    part_urls: Mutex<Vec<PartUrlRequest>>,
    completes: Mutex<Vec<CompleteRequest>>,
    complete_multiparts: Mutex<Vec<CompleteMultipartRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_initiate(&self, resp: Result<InitiateResponse, UploadError>) {
        self.initiate_responses.lock().unwrap().push_back(resp);
    }

    /// The next `times` part-URL requests for `part` fail.
    pub fn fail_part_url(&self, part: u32, times: u32) {
        self.part_url_failures.lock().unwrap().insert(part, times);
    }

    /// The next `times` completion calls fail.
    pub fn fail_complete(&self, times: u32) {
        *self.complete_failures.lock().unwrap() = times;
    }

    pub fn initiate_requests(&self) -> Vec<InitiateRequest> {
        self.initiates.lock().unwrap().clone()
    }

    pub fn part_url_requests(&self) -> Vec<PartUrlRequest> {
        self.part_urls.lock().unwrap().clone()
    }

    pub fn complete_requests(&self) -> Vec<CompleteRequest> {
        self.completes.lock().unwrap().clone()
    }

    pub fn complete_multipart_requests(&self) -> Vec<CompleteMultipartRequest> {
        self.complete_multiparts.lock().unwrap().clone()
    }

    pub fn completion_calls(&self) -> usize {
        self.completes.lock().unwrap().len() + self.complete_multiparts.lock().unwrap().len()
    }

    fn next_complete(&self, file_path: &str, file_name: &str) -> Result<UploadedResource, UploadError> {
        let mut failures = self.complete_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(transient("Failed to complete upload: Service Unavailable"));
        }
        let mut record = serde_json::Map::new();
        record.insert("video".into(), serde_json::json!({ "id": 1 }));
        Ok(UploadedResource {
            url: format!("https://cdn.test/{file_path}"),
            filename: file_name.to_string(),
            record,
        })
    }
}

impl UploadBackend for MockBackend {
    fn initiate<'a>(&'a self, req: &'a InitiateRequest) -> BackendFuture<'a, InitiateResponse> {
        self.initiates.lock().unwrap().push(req.clone());
        Box::pin(async move {
            self.initiate_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(transient("no mock initiate response")))
        })
    }

    fn part_url<'a>(&'a self, req: &'a PartUrlRequest) -> BackendFuture<'a, PartUrlResponse> {
        self.part_urls.lock().unwrap().push(req.clone());
        Box::pin(async move {
            tokio::task::yield_now().await;
            let mut failures = self.part_url_failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&req.part_number)
                && *left > 0
            {
                *left -= 1;
                return Err(transient(&format!(
                    "Failed to get presigned URL for part {}",
                    req.part_number
                )));
            }
            Ok(PartUrlResponse {
                presigned_url: format!("https://storage.test/{}/{}", req.upload_id, req.part_number),
                part_number: Some(req.part_number),
                expires_in: Some(3600),
            })
        })
    }

    fn complete<'a>(&'a self, req: &'a CompleteRequest) -> BackendFuture<'a, UploadedResource> {
        self.completes.lock().unwrap().push(req.clone());
        Box::pin(async move { self.next_complete(&req.file_path, &req.file_name) })
    }

    fn complete_multipart<'a>(
        &'a self,
        req: &'a CompleteMultipartRequest,
    ) -> BackendFuture<'a, UploadedResource> {
        self.complete_multiparts.lock().unwrap().push(req.clone());
        Box::pin(async move { self.next_complete(&req.file_path, &req.file_name) })
    }
}

/// One PUT as seen by [`MockTransporter`].
#[derive(Debug, Clone)]
pub(crate) struct PutCall {
    /// 0 for a whole-file PUT.
    pub part: u32,
    pub url: String,
    pub len: usize,
    pub content_type: Option<String>,
}

/// Recording [`Transporter`].
///
/// Parts succeed with ETag `"etag-<part>"` (quoted, then normalized the
/// way storage answers are) after reporting 50% and 100% progress.
#[derive(Default)]
pub(crate) struct MockTransporter {
    failures: Mutex<HashMap<u32, u32>>,
    missing_etag: Mutex<HashMap<u32, u32>>,
    blocked: Mutex<HashSet<u32>>,
    calls: Mutex<Vec<PutCall>>,
    completed: Mutex<Vec<u32>>,
    observed_cancel: Mutex<Vec<u32>>,
    pub in_flight: Arc<Notify>,
}

impl MockTransporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` PUTs of `part` fail with a 503 (0 = whole file).
    pub fn fail(&self, part: u32, times: u32) {
        self.failures.lock().unwrap().insert(part, times);
    }

    /// The next `times` PUTs of `part` succeed without an ETag.
    pub fn omit_etag(&self, part: u32, times: u32) {
        self.missing_etag.lock().unwrap().insert(part, times);
    }

    /// PUTs of `part` never finish on their own; they wait for cancellation.
    pub fn block(&self, part: u32) {
        self.blocked.lock().unwrap().insert(part);
    }

    pub fn calls(&self) -> Vec<PutCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, part: u32) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.part == part).count()
    }

    pub fn completed(&self) -> Vec<u32> {
        self.completed.lock().unwrap().clone()
    }

    pub fn observed_cancel(&self) -> Vec<u32> {
        self.observed_cancel.lock().unwrap().clone()
    }

    fn take(map: &Mutex<HashMap<u32, u32>>, part: u32) -> bool {
        let mut map = map.lock().unwrap();
        match map.get_mut(&part) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

impl Transporter for MockTransporter {
    fn put<'a>(
        &'a self,
        req: PutRequest,
        on_progress: ProgressFn,
        cancel: &'a CancellationToken,
    ) -> PutFuture<'a> {
        let part = req.part_number.unwrap_or(0);
        self.calls.lock().unwrap().push(PutCall {
            part,
            url: req.url.clone(),
            len: req.body.len(),
            content_type: req.content_type.clone(),
        });

        Box::pin(async move {
            if self.blocked.lock().unwrap().contains(&part) {
                on_progress(0.25);
                self.in_flight.notify_one();
                cancel.cancelled().await;
                self.observed_cancel.lock().unwrap().push(part);
                return Err(UploadError::Cancelled);
            }

            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                self.observed_cancel.lock().unwrap().push(part);
                return Err(UploadError::Cancelled);
            }

            on_progress(0.5);
            if Self::take(&self.failures, part) {
                return Err(transient(&format!(
                    "Chunk {part} upload failed with status 503: Service Unavailable"
                )));
            }
            on_progress(1.0);

            if Self::take(&self.missing_etag, part) {
                return Ok(PutResponse { etag: None });
            }

            self.completed.lock().unwrap().push(part);
            let etag = if part == 0 {
                None
            } else {
                crate::transporter::normalize_etag(&format!("\"etag-{part}\""))
            };
            Ok(PutResponse { etag })
        })
    }
}
