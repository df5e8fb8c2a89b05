//! Wires configuration, HTTP clients and the upload flow together.

use std::sync::Arc;

use assetlift_http::RetryClient;
use assetlift_protocol::types::ReleaseAsset;
use assetlift_release::{HttpReleaseApi, ReleaseAssetUploader, check_file};
use assetlift_transfer::{HttpPartTransport, ProgressUpdate};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;

/// Uploads the configured file. Returns `None` when the file was skipped.
pub async fn run(config: Config) -> anyhow::Result<Option<ReleaseAsset>> {
    if !check_file(&config.file_path, config.if_file_path_not_found)? {
        return Ok(None);
    }

    let client = RetryClient::with_base_url(&config.token, &config.api_url)?;
    let api = Arc::new(HttpReleaseApi::new(client));
    let transport = Arc::new(HttpPartTransport::new()?);

    let (tx, rx) = mpsc::channel(16);
    let logger = spawn_progress_logger(rx);

    let uploader = ReleaseAssetUploader::new(api, transport).with_progress(tx);
    let result = uploader.upload(&config.upload_request()).await;

    // Closes the progress channel so the logger drains and exits.
    drop(uploader);
    let _ = logger.await;

    Ok(Some(result?))
}

fn spawn_progress_logger(mut rx: mpsc::Receiver<ProgressUpdate>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            tracing::debug!(
                uploaded = update.uploaded,
                total = update.total,
                elapsed_ms = update.elapsed.as_millis() as u64,
                "upload progress"
            );
        }
    })
}
