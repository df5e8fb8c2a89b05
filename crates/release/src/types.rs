use std::path::PathBuf;

use assetlift_transfer::DEFAULT_CHUNK_SIZE;

/// Files up to this size use the single-request stream upload.
pub const MIN_MULTIPART_UPLOAD_SIZE: u64 = 5 * 1024 * 1024;

/// Default number of parts uploaded concurrently.
pub const DEFAULT_PARALLEL_CHUNKS: usize = 4;

/// What to upload and where.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub release_id: u64,
    pub asset_key: String,
    pub file_path: PathBuf,
    /// Replace an existing asset with the same key.
    pub overwrite: bool,
    pub chunk_size: u64,
    pub parallel_chunks: usize,
}

impl UploadRequest {
    pub fn new(release_id: u64, asset_key: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            release_id,
            asset_key: asset_key.into(),
            file_path: file_path.into(),
            overwrite: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel_chunks: DEFAULT_PARALLEL_CHUNKS,
        }
    }
}

/// Result of creating an asset record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(u64),
    /// The server answered 409.
    AlreadyExists,
}

/// Destination of a stream upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// Replace the file of an existing asset.
    Existing(u64),
    /// Create a new asset.
    New { release_id: u64, asset_key: String },
}

/// Coordinator phases, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    AccessChecked,
    AssetResolved,
    Begun,
    Uploading,
    Committed,
    Cancelling,
    Cancelled,
    Failed,
}
