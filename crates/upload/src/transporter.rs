//! Byte transfer to presigned storage URLs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::UploadError;

/// Size of the slices the request body is streamed in; progress is
/// reported once per slice.
const STREAM_SLICE: usize = 64 * 1024;

/// Callback receiving the fraction (0.0–1.0) of the body sent so far.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Boxed future returned by [`Transporter::put`].
pub type PutFuture<'a> = Pin<Box<dyn Future<Output = Result<PutResponse, UploadError>> + Send + 'a>>;

/// One PUT to a presigned URL.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub url: String,
    pub body: Bytes,
    /// Sent as `Content-Type` when set (whole-file uploads only).
    pub content_type: Option<String>,
    pub timeout: Duration,
    /// Part being sent, for error messages. `None` for a whole file.
    pub part_number: Option<u32>,
}

/// Storage's answer to a successful PUT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutResponse {
    /// Entity tag with surrounding quotes removed; `None` when absent or blank.
    pub etag: Option<String>,
}

/// Sends bytes to object storage.
///
/// Implementations report progress through `on_progress`, map a 2xx answer
/// to `Ok`, and return [`UploadError::Cancelled`] as soon as `cancel` fires,
/// dropping the request in flight.
pub trait Transporter: Send + Sync {
    fn put<'a>(
        &'a self,
        req: PutRequest,
        on_progress: ProgressFn,
        cancel: &'a CancellationToken,
    ) -> PutFuture<'a>;
}

/// Sends one part and returns its entity tag.
///
/// A 2xx answer without an entity tag is [`UploadError::MissingETag`].
pub async fn put_part(
    transporter: &dyn Transporter,
    url: &str,
    body: Bytes,
    part_number: u32,
    timeout: Duration,
    on_progress: ProgressFn,
    cancel: &CancellationToken,
) -> Result<String, UploadError> {
    let req = PutRequest {
        url: url.to_string(),
        body,
        content_type: None,
        timeout,
        part_number: Some(part_number),
    };
    let resp = transporter.put(req, on_progress, cancel).await?;
    resp.etag
        .ok_or(UploadError::MissingETag { part_number })
}

/// Strips the quotes storage wraps entity tags in.
pub fn normalize_etag(raw: &str) -> Option<String> {
    let etag = raw.replace('"', "");
    let etag = etag.trim();
    if etag.is_empty() {
        None
    } else {
        Some(etag.to_string())
    }
}

/// [`Transporter`] using `reqwest`.
#[derive(Clone, Default)]
pub struct HttpTransporter {
    http: reqwest::Client,
}

impl HttpTransporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing client (shared connection pool).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn send(&self, req: PutRequest, on_progress: ProgressFn) -> Result<PutResponse, UploadError> {
        let total = req.body.len();
        let body = progress_body(req.body, on_progress.clone());

        let mut builder = self
            .http
            .put(&req.url)
            .header(CONTENT_LENGTH, total)
            .timeout(req.timeout)
            .body(body);
        if let Some(ct) = &req.content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| map_put_error(e, req.part_number, req.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("");
            let message = match req.part_number {
                Some(n) => format!(
                    "Chunk {n} upload failed with status {}: {reason}",
                    status.as_u16()
                ),
                None => format!("Upload failed with status {}: {reason}", status.as_u16()),
            };
            return Err(UploadError::Transport {
                status: Some(status.as_u16()),
                message,
            });
        }

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_etag);

        on_progress(1.0);
        debug!(
            part_number = req.part_number,
            bytes = total,
            status = status.as_u16(),
            "PUT complete"
        );
        Ok(PutResponse { etag })
    }
}

impl Transporter for HttpTransporter {
    fn put<'a>(
        &'a self,
        req: PutRequest,
        on_progress: ProgressFn,
        cancel: &'a CancellationToken,
    ) -> PutFuture<'a> {
        Box::pin(async move {
            let part_number = req.part_number;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(part_number, "PUT aborted");
                    Err(UploadError::Cancelled)
                }
                res = self.send(req, on_progress) => res,
            }
        })
    }
}

/// Streams `data` in slices, reporting the fraction handed to the
/// connection after each one.
fn progress_body(data: Bytes, on_progress: ProgressFn) -> reqwest::Body {
    let total = data.len();
    if total == 0 {
        return reqwest::Body::from(data);
    }

    let slices: Vec<Bytes> = (0..total)
        .step_by(STREAM_SLICE)
        .map(|start| data.slice(start..(start + STREAM_SLICE).min(total)))
        .collect();

    let mut sent = 0usize;
    let stream = stream::iter(slices.into_iter().map(move |slice| {
        sent += slice.len();
        let fraction = sent as f64 / total as f64;
        trace!(sent, total, "body progress");
        on_progress(fraction);
        Ok::<Bytes, std::io::Error>(slice)
    }));
    reqwest::Body::wrap_stream(stream)
}

fn map_put_error(err: reqwest::Error, part_number: Option<u32>, timeout: Duration) -> UploadError {
    if err.is_timeout() {
        let context = match part_number {
            Some(n) => format!("Chunk {n} upload"),
            None => "Upload".to_string(),
        };
        return UploadError::Timeout {
            context,
            after: timeout,
        };
    }
    let message = match part_number {
        Some(n) => format!("Network error during chunk {n} upload: {err}"),
        None => format!("Network error during upload: {err}"),
    };
    UploadError::Transport {
        status: err.status().map(|s| s.as_u16()),
        message,
    }
}
