use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Failure half of the `{success, error?}` response envelope.
///
/// Different endpoints put the human-readable reason in different fields,
/// so all of them are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiFailure {
    /// Returns the most specific reason the backend gave, or `fallback`.
    pub fn reason(&self, fallback: &str) -> String {
        [
            self.error.as_deref(),
            self.message.as_deref(),
            self.details.as_deref(),
        ]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    success: bool,
}

/// A decoded response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    /// `success: true`; the remaining fields decoded into `T`.
    Success(T),
    /// `success: false` (or missing).
    Failure(ApiFailure),
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decodes a response body.
    ///
    /// The `success` flag is read first so that a failure body never has to
    /// satisfy the shape of `T`.
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        let status: Status = serde_json::from_slice(body)?;
        if status.success {
            Ok(Envelope::Success(serde_json::from_slice(body)?))
        } else {
            Ok(Envelope::Failure(serde_json::from_slice(body)?))
        }
    }
}

impl<T> Envelope<T> {
    /// Converts into a `Result`, mapping the failure to its reason.
    pub fn into_result(self, fallback: &str) -> Result<T, String> {
        match self {
            Envelope::Success(v) => Ok(v),
            Envelope::Failure(f) => Err(f.reason(fallback)),
        }
    }
}
