//! Upload session model, part planning and progress aggregation.
//!
//! Everything here is network-free: the engine in `coachlib-upload` feeds
//! backend answers in and gets byte ranges, file slices and percentages out.

mod progress;
mod source;
mod state;
mod types;
mod validation;

pub use progress::ProgressAggregator;
pub use source::{FileSource, guess_mime_type};
pub use state::{AttemptState, StateSnapshot, UploadStatus};
pub use types::{ByteRange, PartDescriptor, ResourceMetadata, TransferPlan, UploadSession, total_chunks};
pub use validation::{default_title, validate_metadata};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid byte range {start}..{end} for a file of {file_size} bytes")]
    InvalidRange { start: u64, end: u64, file_size: u64 },

    #[error("part {part_number} is outside 1..={total_chunks}")]
    InvalidPart { part_number: u32, total_chunks: u32 },

    #[error("invalid upload session: {0}")]
    InvalidSession(String),

    #[error("{}", missing_fields_message(.0))]
    MissingFields(Vec<&'static str>),

    #[error("invalid state transition {from:?} -> {to:?}")]
    InvalidTransition { from: UploadStatus, to: UploadStatus },
}

fn missing_fields_message(fields: &[&'static str]) -> String {
    match fields {
        [one] => format!("Please fill in: {one}"),
        many => format!("Please fill in the following fields: {}", many.join(", ")),
    }
}
