use serde::{Deserialize, Serialize};

use crate::types::{Category, UploadType};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Starts an upload. The backend chooses the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub category: Category,
}

/// Requests a presigned URL for one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlRequest {
    pub file_path: String,
    pub upload_id: String,
    pub part_number: u32,
}

/// One uploaded part as listed in the multipart manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Finalizes a single-PUT upload and records the resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub file_path: String,
    pub file_name: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub category: Category,
    pub file_size: u64,
    pub file_type: String,
    pub folder_id: Option<String>,
}

/// Assembles a multipart object and records the resource.
///
/// `parts` must be sorted ascending by part number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartRequest {
    pub file_path: String,
    pub file_name: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
    pub title: String,
    pub description: String,
    pub author: String,
    pub category: Category,
    pub file_size: u64,
    pub file_type: String,
    pub folder_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Response payloads (the `success: true` half of the envelope)
// ---------------------------------------------------------------------------

/// Answer to [`InitiateRequest`].
///
/// `presigned_url` is present for [`UploadType::Single`]; `upload_id`,
/// `chunk_size` and `total_chunks` are present for [`UploadType::Multipart`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub upload_type: UploadType,
    pub file_path: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Answer to [`PartUrlRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlResponse {
    pub presigned_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Answer to both completion endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub data: UploadedResource,
}

/// The persisted resource descriptor returned on success.
///
/// Besides `url` and `filename` the backend adds one key named after the
/// category (`video`, `image`, ...) holding the catalog record; it is kept
/// verbatim in `record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedResource {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(flatten)]
    pub record: serde_json::Map<String, serde_json::Value>,
}
