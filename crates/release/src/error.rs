//! Upload error types.

use std::path::PathBuf;

use assetlift_http::HttpError;
use assetlift_transfer::TransferError;

/// Errors produced while uploading a release asset.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("not logged in (status {status})")]
    NotLoggedIn { status: u16 },

    #[error("you do not have the necessary access to release {release_id}")]
    Unauthorized { release_id: u64 },

    #[error("a release asset for {release_id} - {asset_key} already exists")]
    Conflict { release_id: u64, asset_key: String },

    #[error("upload rejected with status {status}: {body}")]
    UploadRejected { status: u16, body: String },

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected API response: {0}")]
    Protocol(String),

    #[error("file does not exist or is not readable: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
