//! Step outputs for CI runners.

use std::io::Write;
use std::path::Path;

use assetlift_protocol::types::ReleaseAsset;

/// Environment variable naming the runner's output file.
pub const OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Appends `asset-id` and `asset-url` lines to the output file at `path`.
pub fn append_outputs(path: &Path, asset: &ReleaseAsset) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "asset-id={}", asset.id)?;
    writeln!(file, "asset-url={}", asset.download_url)?;
    Ok(())
}

/// Writes outputs when the runner provides an output file.
///
/// Returns whether anything was written.
pub fn publish(asset: &ReleaseAsset) -> std::io::Result<bool> {
    match std::env::var_os(OUTPUT_ENV) {
        Some(path) if !path.is_empty() => {
            append_outputs(Path::new(&path), asset)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}
