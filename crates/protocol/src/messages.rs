use serde::{Deserialize, Serialize};

use crate::types::{CommitPayload, UploadPart};

// ---------------------------------------------------------------------------
// OData envelopes
// ---------------------------------------------------------------------------

/// Collection response wrapper: `{"d": [...]}`.
///
/// A missing `d` deserializes as an empty collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ODataList<T> {
    #[serde(default = "Vec::new")]
    pub d: Vec<T>,
}

impl<T> ODataList<T> {
    /// Returns the first record, if any.
    pub fn first(&self) -> Option<&T> {
        self.d.first()
    }
}

/// A record projected down to its id (`$select=id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdRecord {
    #[serde(default)]
    pub id: Option<u64>,
}

/// A release asset projected to `$select=id,asset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: u64,
    #[serde(default)]
    pub asset: Option<AssetFile>,
}

/// File reference attached to a release asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFile {
    pub href: String,
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Asks whether the caller may perform `action` on a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessCheckRequest {
    pub action: String,
}

impl AccessCheckRequest {
    pub fn update() -> Self {
        Self {
            action: "update".into(),
        }
    }
}

/// Creates an empty release asset record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAssetRequest {
    pub asset_key: String,
    pub release: u64,
}

/// Opens a multipart session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginUploadRequest {
    pub asset: BeginUploadAsset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginUploadAsset {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub chunk_size: u64,
}

/// Finalizes a multipart session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitUploadRequest {
    pub uuid: String,
    #[serde(rename = "providerCommitData")]
    pub provider_commit_data: CommitPayload,
}

/// Aborts a multipart session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelUploadRequest {
    pub uuid: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Response to asset creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedAsset {
    pub id: u64,
}

/// Response to `beginUpload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginUploadResponse {
    pub asset: BeginUploadSession,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginUploadSession {
    pub uuid: String,
    #[serde(rename = "uploadParts")]
    pub upload_parts: Vec<UploadPart>,
}

/// Response to `commitUpload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitUploadResponse {
    pub href: String,
}
