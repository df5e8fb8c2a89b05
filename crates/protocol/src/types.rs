use serde::{Deserialize, Serialize};

/// Metadata describing the file being uploaded.
///
/// Derived once from the source file and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// One pre-signed destination for a slice of the source file.
///
/// `part_number` is 1-based and dense across a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPart {
    pub part_number: u32,
    #[serde(alias = "uploadUrl")]
    pub url: String,
    /// Chunk size echoed by the control plane. Informational only.
    #[serde(default)]
    pub chunk_size: u64,
}

/// Storage-assigned integrity tag for one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartResult {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// The sorted set of part results submitted to finalize a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPayload {
    #[serde(rename = "Parts")]
    pub parts: Vec<PartResult>,
}

impl CommitPayload {
    /// Builds a payload from results in completion order.
    pub fn from_results(mut parts: Vec<PartResult>) -> Self {
        parts.sort_by_key(|p| p.part_number);
        Self { parts }
    }

    /// Returns the part numbers from `expected` that have no result, plus any
    /// number that appears more than once.
    pub fn discrepancies(&self, expected: &[UploadPart]) -> Vec<u32> {
        let mut bad: Vec<u32> = expected
            .iter()
            .filter(|e| !self.parts.iter().any(|p| p.part_number == e.part_number))
            .map(|e| e.part_number)
            .collect();
        for pair in self.parts.windows(2) {
            if pair[0].part_number == pair[1].part_number {
                bad.push(pair[0].part_number);
            }
        }
        bad
    }
}

/// A release asset as seen by callers once an upload finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseAsset {
    pub id: u64,
    pub download_url: String,
}
