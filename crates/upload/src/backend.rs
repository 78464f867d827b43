//! Upload backend trait and its HTTP implementation.
//!
//! `UploadBackend` covers the four JSON control endpoints. The engine only
//! talks to this trait, so tests drive it with in-memory mocks.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use coachlib_protocol::constants::{
    COMPLETE_MULTIPART_PATH, COMPLETE_PATH, INITIATE_PATH, PART_URL_PATH,
};
use coachlib_protocol::envelope::Envelope;
use coachlib_protocol::messages::{
    CompleteMultipartRequest, CompleteRequest, CompleteResponse, InitiateRequest,
    InitiateResponse, PartUrlRequest, PartUrlResponse, UploadedResource,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::UploadError;

/// Boxed future returned by [`UploadBackend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Abstract connection to the upload control endpoints.
///
/// Failures come back as [`UploadError::Transport`] or
/// [`UploadError::Timeout`]; the caller decides which step they belong to.
pub trait UploadBackend: Send + Sync {
    /// `POST /upload/initiate`.
    fn initiate<'a>(&'a self, req: &'a InitiateRequest) -> BackendFuture<'a, InitiateResponse>;

    /// `POST /upload/part-url`.
    fn part_url<'a>(&'a self, req: &'a PartUrlRequest) -> BackendFuture<'a, PartUrlResponse>;

    /// `POST /upload/complete`.
    fn complete<'a>(&'a self, req: &'a CompleteRequest) -> BackendFuture<'a, UploadedResource>;

    /// `POST /upload/complete-multipart`.
    fn complete_multipart<'a>(
        &'a self,
        req: &'a CompleteMultipartRequest,
    ) -> BackendFuture<'a, UploadedResource>;
}

/// [`UploadBackend`] over HTTPS with `reqwest`.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Creates a client for `base_url` (the prefix before `/upload/...`).
    ///
    /// `auth_token`, when given, is sent as a Bearer token on every call.
    pub fn new(
        base_url: &str,
        auth_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| UploadError::InvalidConfig("auth token is not a valid header".into()))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Posts `body` and decodes the success half of the envelope.
    async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        fallback: String,
    ) -> Result<Resp, UploadError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, &fallback))?;

        let status = resp.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or(status.as_str());
            debug!(path, status = status.as_u16(), "backend returned error status");
            return Err(UploadError::Transport {
                status: Some(status.as_u16()),
                message: format!("{fallback}: {reason}"),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e, &fallback))?;
        Envelope::<Resp>::decode(&bytes)?
            .into_result(&fallback)
            .map_err(|message| UploadError::Transport {
                status: Some(status.as_u16()),
                message,
            })
    }

    fn map_send_error(&self, err: reqwest::Error, fallback: &str) -> UploadError {
        if err.is_timeout() {
            UploadError::Timeout {
                context: format!("{fallback}: request"),
                after: self.timeout,
            }
        } else {
            UploadError::Transport {
                status: err.status().map(|s| s.as_u16()),
                message: format!("{fallback}: {err}"),
            }
        }
    }
}

impl UploadBackend for HttpBackend {
    fn initiate<'a>(&'a self, req: &'a InitiateRequest) -> BackendFuture<'a, InitiateResponse> {
        Box::pin(self.post_json(INITIATE_PATH, req, "Failed to initiate upload".into()))
    }

    fn part_url<'a>(&'a self, req: &'a PartUrlRequest) -> BackendFuture<'a, PartUrlResponse> {
        let fallback = format!("Failed to get presigned URL for part {}", req.part_number);
        Box::pin(self.post_json(PART_URL_PATH, req, fallback))
    }

    fn complete<'a>(&'a self, req: &'a CompleteRequest) -> BackendFuture<'a, UploadedResource> {
        Box::pin(async move {
            let resp: CompleteResponse = self
                .post_json(COMPLETE_PATH, req, "Failed to complete upload".into())
                .await?;
            Ok(resp.data)
        })
    }

    fn complete_multipart<'a>(
        &'a self,
        req: &'a CompleteMultipartRequest,
    ) -> BackendFuture<'a, UploadedResource> {
        Box::pin(async move {
            let resp: CompleteResponse = self
                .post_json(
                    COMPLETE_MULTIPART_PATH,
                    req,
                    "Failed to complete multipart upload".into(),
                )
                .await?;
            Ok(resp.data)
        })
    }
}
