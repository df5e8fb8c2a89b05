use std::fmt;
use std::path::Path;
use std::str::FromStr;

use assetlift_protocol::types::FileMetadata;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::UploadError;

/// Fallback when the extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What to do when the source file is missing or unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNotFoundPolicy {
    /// Log a warning and skip the upload.
    #[default]
    Warn,
    /// Fail with [`UploadError::FileNotFound`].
    Error,
    /// Skip silently.
    Ignore,
}

impl FromStr for FileNotFoundPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!(
                "invalid value '{other}', expected one of: warn, error, ignore"
            )),
        }
    }
}

impl fmt::Display for FileNotFoundPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Ignore => "ignore",
        })
    }
}

/// Checks that `path` is a readable regular file.
///
/// Returns `Ok(false)` when the file is unusable and `policy` says to skip.
pub fn check_file(path: &Path, policy: FileNotFoundPolicy) -> Result<bool, UploadError> {
    let probe = std::fs::File::open(path).and_then(|f| {
        if f.metadata()?.is_dir() {
            Err(std::io::Error::other("path is a directory"))
        } else {
            Ok(())
        }
    });

    let Err(source) = probe else {
        return Ok(true);
    };

    match policy {
        FileNotFoundPolicy::Error => Err(UploadError::FileNotFound {
            path: path.to_path_buf(),
            source,
        }),
        FileNotFoundPolicy::Warn => {
            warn!(
                path = %path.display(),
                error = %source,
                "file does not exist or is not readable, skipping upload"
            );
            Ok(false)
        }
        FileNotFoundPolicy::Ignore => {
            debug!(path = %path.display(), "file not found, ignored");
            Ok(false)
        }
    }
}

/// Reads name, size and content type of `path`.
pub fn file_metadata(path: &Path) -> Result<FileMetadata, UploadError> {
    let size = std::fs::metadata(path)?.len();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FileMetadata {
        filename,
        content_type: detect_content_type(path)
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
        size,
    })
}

/// Detects a MIME type from the file extension.
pub fn detect_content_type(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}
