use std::time::Duration;

/// Starts an upload and decides between single PUT and multipart.
pub const INITIATE_PATH: &str = "/upload/initiate";

/// Issues a presigned URL for one part of a multipart upload.
pub const PART_URL_PATH: &str = "/upload/part-url";

/// Assembles the multipart object and records the resource.
pub const COMPLETE_MULTIPART_PATH: &str = "/upload/complete-multipart";

/// Records the resource of a single-PUT upload.
pub const COMPLETE_PATH: &str = "/upload/complete";

/// Highest part number object storage accepts.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Timeout for a whole-file PUT (sized for the largest accepted file).
pub const SINGLE_PUT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Timeout for one multipart chunk PUT.
///
/// Much shorter than [`SINGLE_PUT_TIMEOUT`]: a stuck chunk should fail
/// and be retried instead of stalling the whole transfer.
pub const PART_PUT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Timeout for the JSON control endpoints.
pub const API_TIMEOUT: Duration = Duration::from_secs(60);
