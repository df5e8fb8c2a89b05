//! Uploader configuration.
//!
//! Values come from command-line flags, `ASSETLIFT_*` environment
//! variables, and an optional TOML file, in that order of precedence.

use std::fmt;
use std::path::{Path, PathBuf};

use assetlift_release::{DEFAULT_PARALLEL_CHUNKS, FileNotFoundPolicy, UploadRequest};
use assetlift_transfer::DEFAULT_CHUNK_SIZE;
use clap::Parser;
use serde::Deserialize;

/// Smallest chunk size storage accepts for multipart parts.
pub const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Errors raised while assembling the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("setting `{0}` must not be empty")]
    Empty(&'static str),

    #[error("chunk size {value} is below the minimum of {MIN_CHUNK_SIZE} bytes")]
    ChunkTooSmall { value: u64 },

    #[error("parallel chunks must be at least 1")]
    InvalidParallelism,
}

/// Command-line arguments, each with an environment fallback.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Upload a file as a release asset")]
pub struct Args {
    /// API token used as a bearer credential
    #[arg(long, env = "ASSETLIFT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Control-plane host, e.g. balena-cloud.com
    #[arg(long, env = "ASSETLIFT_HOST")]
    pub host: Option<String>,

    /// Full API base URL (overrides the one derived from --host)
    #[arg(long, env = "ASSETLIFT_API_URL")]
    pub api_url: Option<String>,

    /// Release the asset belongs to
    #[arg(long, env = "ASSETLIFT_RELEASE_ID")]
    pub release_id: Option<u64>,

    /// Asset key, unique within the release
    #[arg(long, env = "ASSETLIFT_ASSET_KEY")]
    pub asset_key: Option<String>,

    /// File to upload
    #[arg(long, env = "ASSETLIFT_FILE_PATH")]
    pub file_path: Option<PathBuf>,

    /// Replace an existing asset with the same key
    #[arg(
        long,
        env = "ASSETLIFT_OVERWRITE",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub overwrite: Option<bool>,

    /// Behaviour when the file is missing: warn, error or ignore
    #[arg(long, env = "ASSETLIFT_IF_FILE_PATH_NOT_FOUND")]
    pub if_file_path_not_found: Option<FileNotFoundPolicy>,

    /// Multipart chunk size in bytes
    #[arg(long, env = "ASSETLIFT_CHUNK_SIZE")]
    pub chunk_size: Option<u64>,

    /// Number of parts uploaded concurrently
    #[arg(long, env = "ASSETLIFT_PARALLEL_CHUNKS")]
    pub parallel_chunks: Option<usize>,

    /// TOML file providing defaults for any of the above
    #[arg(long, env = "ASSETLIFT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Settings read from a TOML file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub token: Option<String>,
    pub host: Option<String>,
    pub api_url: Option<String>,
    pub release_id: Option<u64>,
    pub asset_key: Option<String>,
    pub file_path: Option<PathBuf>,
    pub overwrite: Option<bool>,
    pub if_file_path_not_found: Option<FileNotFoundPolicy>,
    pub chunk_size: Option<u64>,
    pub parallel_chunks: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Validated configuration.
#[derive(Clone)]
pub struct Config {
    pub token: String,
    /// API base URL, e.g. `https://api.balena-cloud.com`.
    pub api_url: String,
    pub release_id: u64,
    pub asset_key: String,
    pub file_path: PathBuf,
    pub overwrite: bool,
    pub if_file_path_not_found: FileNotFoundPolicy,
    pub chunk_size: u64,
    pub parallel_chunks: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("release_id", &self.release_id)
            .field("asset_key", &self.asset_key)
            .field("file_path", &self.file_path)
            .field("overwrite", &self.overwrite)
            .field("if_file_path_not_found", &self.if_file_path_not_found)
            .field("chunk_size", &self.chunk_size)
            .field("parallel_chunks", &self.parallel_chunks)
            .finish()
    }
}

impl Config {
    /// Parses the process arguments and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    /// Combines `args` over `file` and validates the result.
    pub fn merge(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let token = required_text("token", args.token.or(file.token))?;
        let api_url = match args.api_url.or(file.api_url) {
            Some(url) => required_text("api-url", Some(url))?,
            None => {
                let host = required_text("host", args.host.or(file.host))?;
                assetlift_http::api_base_url(&host)
            }
        };
        let release_id = args
            .release_id
            .or(file.release_id)
            .ok_or(ConfigError::Missing("release-id"))?;
        let asset_key = required_text("asset-key", args.asset_key.or(file.asset_key))?;

        let file_path = args
            .file_path
            .or(file.file_path)
            .ok_or(ConfigError::Missing("file-path"))?;
        if file_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty("file-path"));
        }

        let chunk_size = args
            .chunk_size
            .or(file.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size < MIN_CHUNK_SIZE {
            return Err(ConfigError::ChunkTooSmall { value: chunk_size });
        }

        let parallel_chunks = args
            .parallel_chunks
            .or(file.parallel_chunks)
            .unwrap_or(DEFAULT_PARALLEL_CHUNKS);
        if parallel_chunks == 0 {
            return Err(ConfigError::InvalidParallelism);
        }

        Ok(Self {
            token,
            api_url,
            release_id,
            asset_key,
            file_path,
            overwrite: args.overwrite.or(file.overwrite).unwrap_or(false),
            if_file_path_not_found: args
                .if_file_path_not_found
                .or(file.if_file_path_not_found)
                .unwrap_or_default(),
            chunk_size,
            parallel_chunks,
        })
    }

    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest {
            release_id: self.release_id,
            asset_key: self.asset_key.clone(),
            file_path: self.file_path.clone(),
            overwrite: self.overwrite,
            chunk_size: self.chunk_size,
            parallel_chunks: self.parallel_chunks,
        }
    }
}

fn required_text(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(name))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(name));
    }
    Ok(trimmed.to_string())
}
