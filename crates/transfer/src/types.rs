use coachlib_protocol::constants::MAX_PART_NUMBER;
use coachlib_protocol::messages::{CompletedPart, InitiateResponse};
use coachlib_protocol::types::{Category, UploadType};

use crate::TransferError;

/// Number of parts a file of `file_size` bytes splits into.
pub fn total_chunks(file_size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    file_size.div_ceil(chunk_size)
}

/// Half-open byte range `[start, end)` within the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the bytes reach object storage, as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPlan {
    /// One PUT of the whole file.
    Single { presigned_url: String },
    /// Parts `1..=total_chunks`, each `chunk_size` bytes except the last.
    Multipart {
        upload_id: String,
        chunk_size: u64,
        total_chunks: u32,
    },
}

/// One upload attempt's view of the backend session.
///
/// Created from the initiate answer and discarded when the attempt ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub file_path: String,
    pub file_name: String,
    pub plan: TransferPlan,
    pub file_size: u64,
    pub file_type: String,
    pub category: Category,
    pub public_url: Option<String>,
    pub expires_in: Option<u64>,
}

impl UploadSession {
    /// Builds a session from the backend's initiate answer.
    ///
    /// The split policy belongs to the backend; this only checks that the
    /// parameters it issued describe the file we are about to send.
    pub fn from_initiate(
        resp: InitiateResponse,
        file_size: u64,
        file_type: &str,
        category: Category,
    ) -> Result<Self, TransferError> {
        let plan = match resp.upload_type {
            UploadType::Single => {
                let presigned_url = resp
                    .presigned_url
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| {
                        TransferError::InvalidSession("single upload without presigned URL".into())
                    })?;
                TransferPlan::Single { presigned_url }
            }
            UploadType::Multipart => {
                let upload_id = resp.upload_id.filter(|u| !u.is_empty()).ok_or_else(|| {
                    TransferError::InvalidSession("multipart upload without upload ID".into())
                })?;
                let chunk_size = resp.chunk_size.filter(|&c| c > 0).ok_or_else(|| {
                    TransferError::InvalidSession("multipart upload without chunk size".into())
                })?;
                let issued = resp.total_chunks.ok_or_else(|| {
                    TransferError::InvalidSession("multipart upload without chunk count".into())
                })?;

                let expected = total_chunks(file_size, chunk_size);
                if expected == 0 || u64::from(issued) != expected {
                    return Err(TransferError::InvalidSession(format!(
                        "backend issued {issued} chunks of {chunk_size} bytes for a file of \
                         {file_size} bytes (expected {expected})"
                    )));
                }
                if issued > MAX_PART_NUMBER {
                    return Err(TransferError::InvalidSession(format!(
                        "{issued} chunks exceeds the storage limit of {MAX_PART_NUMBER}"
                    )));
                }

                TransferPlan::Multipart {
                    upload_id,
                    chunk_size,
                    total_chunks: issued,
                }
            }
        };

        if resp.file_path.is_empty() {
            return Err(TransferError::InvalidSession("empty file path".into()));
        }

        Ok(Self {
            file_path: resp.file_path,
            file_name: resp.file_name,
            plan,
            file_size,
            file_type: file_type.to_string(),
            category,
            public_url: resp.public_url,
            expires_in: resp.expires_in,
        })
    }

    pub fn upload_type(&self) -> UploadType {
        match self.plan {
            TransferPlan::Single { .. } => UploadType::Single,
            TransferPlan::Multipart { .. } => UploadType::Multipart,
        }
    }

    /// Upload ID of a multipart session.
    pub fn upload_id(&self) -> Option<&str> {
        match &self.plan {
            TransferPlan::Multipart { upload_id, .. } => Some(upload_id),
            TransferPlan::Single { .. } => None,
        }
    }

    /// Number of independently transferred pieces (1 for a single PUT).
    pub fn total_chunks(&self) -> u32 {
        match self.plan {
            TransferPlan::Single { .. } => 1,
            TransferPlan::Multipart { total_chunks, .. } => total_chunks,
        }
    }

    /// Byte range of a 1-based part.
    pub fn part_range(&self, part_number: u32) -> Result<ByteRange, TransferError> {
        let TransferPlan::Multipart {
            chunk_size,
            total_chunks,
            ..
        } = self.plan
        else {
            return Ok(ByteRange::new(0, self.file_size));
        };

        if part_number == 0 || part_number > total_chunks {
            return Err(TransferError::InvalidPart {
                part_number,
                total_chunks,
            });
        }

        let start = u64::from(part_number - 1) * chunk_size;
        let end = (start + chunk_size).min(self.file_size);
        Ok(ByteRange::new(start, end))
    }

    /// Descriptors for every part, in part-number order, with no URL or
    /// entity tag yet.
    pub fn parts(&self) -> Result<Vec<PartDescriptor>, TransferError> {
        (1..=self.total_chunks())
            .map(|n| Ok(PartDescriptor::new(n, self.part_range(n)?)))
            .collect()
    }
}

/// One part of a multipart transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    pub part_number: u32,
    pub range: ByteRange,
    /// Fetched just before the transfer; scoped to this part only.
    pub presigned_url: Option<String>,
    /// Set once storage acknowledged the bytes.
    pub etag: Option<String>,
}

impl PartDescriptor {
    pub fn new(part_number: u32, range: ByteRange) -> Self {
        Self {
            part_number,
            range,
            presigned_url: None,
            etag: None,
        }
    }

    /// Manifest entry, available only after a successful transfer.
    pub fn completed(&self) -> Option<CompletedPart> {
        self.etag
            .as_ref()
            .filter(|e| !e.is_empty())
            .map(|etag| CompletedPart {
                part_number: self.part_number,
                etag: etag.clone(),
            })
    }
}

/// Catalog metadata recorded alongside the uploaded object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub title: String,
    pub description: String,
    pub author: String,
    pub folder_id: Option<String>,
}

impl ResourceMetadata {
    /// Trims the text fields and drops the author where the category has none.
    pub fn normalized(&self, category: Category) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            author: if category.has_author() {
                self.author.trim().to_string()
            } else {
                String::new()
            },
            folder_id: self.folder_id.clone().filter(|f| !f.is_empty()),
        }
    }
}
