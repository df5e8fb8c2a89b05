//! Wire types for the release asset control plane.
//!
//! The control plane speaks an OData-flavoured JSON dialect: collection
//! lookups come back wrapped in `{"d": [...]}`, while the multipart
//! endpoints use their own ad-hoc request/response bodies.

pub mod messages;
pub mod types;

pub use messages::{
    AccessCheckRequest, AssetFile, AssetRecord, BeginUploadAsset, BeginUploadRequest,
    BeginUploadResponse, BeginUploadSession, CancelUploadRequest, CommitUploadRequest,
    CommitUploadResponse, CreateAssetRequest, CreatedAsset, IdRecord, ODataList,
};
pub use types::{CommitPayload, FileMetadata, PartResult, ReleaseAsset, UploadPart};
