use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::TransferError;
use crate::types::ByteRange;

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
    file_name: String,
    size: u64,
    mime_type: String,
}

impl FileSource {
    /// Opens `path` and records its size.
    ///
    /// When `mime_type` is `None` the type is guessed from the extension.
    pub async fn open(path: &Path, mime_type: Option<&str>) -> Result<Self, TransferError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )
            .into());
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_type
            .map(str::to_string)
            .unwrap_or_else(|| guess_mime_type(&file_name).to_string());

        debug!(path = %path.display(), size = metadata.len(), mime_type = %mime_type, "opened upload source");

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
            mime_type,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Reads exactly the bytes of `range`.
    ///
    /// Fails if the range is outside the size recorded at open time or the
    /// file shrank since.
    pub async fn read_range(&self, range: ByteRange) -> Result<Bytes, TransferError> {
        if range.start > range.end || range.end > self.size {
            return Err(TransferError::InvalidRange {
                start: range.start,
                end: range.end,
                file_size: self.size,
            });
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(range.start)).await?;

        let mut buf = vec![0u8; range.len() as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Reads the whole file.
    pub async fn read_all(&self) -> Result<Bytes, TransferError> {
        self.read_range(ByteRange::new(0, self.size)).await
    }
}

/// Guesses a MIME type from a file extension.
///
/// Covers the formats the library accepts; anything else is
/// `application/octet-stream`.
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "aac" => "audio/aac",
        _ => "application/octet-stream",
    }
}
