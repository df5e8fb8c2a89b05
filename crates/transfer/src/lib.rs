//! Multipart chunk transfer with bounded concurrency and progress tracking.
//!
//! Parts are read at fixed offsets from a shared file handle and PUT
//! directly to their pre-signed storage URLs through a [`PartTransport`].

mod chunked;
mod progress;
mod types;
mod uploader;
mod validation;

pub use chunked::{PartReader, part_offset};
pub use progress::{ProgressReporter, ProgressUpdate, format_status};
pub use types::{SessionState, UploadSession};
pub use uploader::{
    ChunkUploader, HttpPartTransport, PART_MAX_ATTEMPTS, PartTransport, UploadOptions,
    normalize_etag, part_timeout,
};
pub use validation::{validate_options, validate_parts};

/// Default chunk size: 5 MiB, the smallest part size storage accepts.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("part {part_number} failed after {attempts} attempts: {message}")]
    Part {
        part_number: u32,
        attempts: u32,
        message: String,
    },

    #[error("missing or invalid ETag for part {part_number}")]
    MissingEtag { part_number: u32 },

    #[error("storage returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("task join error: {0}")]
    Join(String),

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    #[error("invalid parallelism: {0}")]
    InvalidParallelism(usize),

    #[error("invalid part list: {0}")]
    InvalidParts(String),

    #[error("part {0} starts beyond the end of the file")]
    PartOutOfRange(u32),

    #[error("commit payload incomplete, offending parts: {0:?}")]
    IncompletePayload(Vec<u32>),

    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}
