//! Release asset publishing.
//!
//! Checks access, resolves or creates the asset record, then uploads the
//! file either in one form request or through a multipart session.
//!
//! # Multipart flow
//!
//! 1. **Access**: `whoami` and `canAccess`
//! 2. **Resolve**: look up `(release, asset_key)`, create it when absent
//! 3. **Begin**: open a session and receive pre-signed part URLs
//! 4. **Upload**: PUT every part under a concurrency cap
//! 5. **Commit**: finalize with the sorted part tags, or cancel on failure

pub mod api;
pub mod error;
pub mod file;
pub mod types;
pub mod uploader;

pub use api::{ApiFuture, HttpReleaseApi, ReleaseApi, asset_lookup_path};
pub use error::UploadError;
pub use file::{DEFAULT_CONTENT_TYPE, FileNotFoundPolicy, check_file, detect_content_type, file_metadata};
pub use types::{
    CreateOutcome, DEFAULT_PARALLEL_CHUNKS, MIN_MULTIPART_UPLOAD_SIZE, Phase, StreamTarget,
    UploadRequest,
};
pub use uploader::ReleaseAssetUploader;
