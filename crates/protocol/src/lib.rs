//! Wire types for the library upload backend.
//!
//! Every JSON endpoint answers with the same `{success, error?, ...}`
//! envelope; see [`envelope`]. Request and response payloads live in
//! [`messages`], shared enums in [`types`].

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{ApiFailure, Envelope};
pub use messages::{
    CompleteMultipartRequest, CompleteRequest, CompleteResponse, CompletedPart,
    InitiateRequest, InitiateResponse, PartUrlRequest, PartUrlResponse, UploadedResource,
};
pub use types::{Category, UploadType};
