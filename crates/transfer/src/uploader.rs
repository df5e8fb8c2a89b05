//! Concurrent part uploads.
//!
//! Every part runs in its own task behind a semaphore. Confirmed byte
//! counts flow through a channel to a single reporter task, so nothing
//! is shared between part tasks except the read-only file handle.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use assetlift_http::Backoff;
use assetlift_protocol::types::{CommitPayload, FileMetadata, PartResult, UploadPart};
use reqwest::header::ETAG;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::TransferError;
use crate::chunked::PartReader;
use crate::progress::{ProgressReporter, ProgressUpdate};
use crate::validation::{validate_options, validate_parts};

/// Attempts per part before the part is declared failed.
pub const PART_MAX_ATTEMPTS: u32 = 7;

/// Connection setup limit for part PUTs.
const PART_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Base allowance for one part PUT, before body transfer time.
const PART_BASE_TIMEOUT: Duration = Duration::from_secs(60);

/// Slowest uplink a part is expected to survive, in bytes per second.
const PART_MIN_THROUGHPUT: u64 = 32 * 1024;

/// Whole-request timeout for a part of `len` bytes. Grows with the body so
/// large chunks on slow links are not cut off mid-transfer.
pub fn part_timeout(len: usize) -> Duration {
    PART_BASE_TIMEOUT + Duration::from_secs(len as u64 / PART_MIN_THROUGHPUT)
}

/// Direct-to-storage PUT of one part.
///
/// Implementations return the raw `ETag` header value on a 2xx response,
/// `None` when the header is absent, and an error for anything else.
pub trait PartTransport: Send + Sync {
    fn put_part<'a>(
        &'a self,
        url: &'a str,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, TransferError>> + Send + 'a>>;
}

/// Strips surrounding quotes from a storage ETag. Empty tags are rejected.
pub fn normalize_etag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_matches('"');
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_string())
    }
}

// ---------------------------------------------------------------------------
// HttpPartTransport
// ---------------------------------------------------------------------------

/// [`PartTransport`] backed by a plain reqwest client.
///
/// Part URLs are pre-signed, so no authorization header is sent.
#[derive(Debug, Clone)]
pub struct HttpPartTransport {
    http: reqwest::Client,
}

impl HttpPartTransport {
    pub fn new() -> Result<Self, TransferError> {
        let http = reqwest::Client::builder()
            .connect_timeout(PART_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransferError::Transport(e.to_string()))?;
        Ok(Self { http })
    }
}

impl PartTransport for HttpPartTransport {
    fn put_part<'a>(
        &'a self,
        url: &'a str,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, TransferError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .http
                .put(url)
                .timeout(part_timeout(data.len()))
                .body(data)
                .send()
                .await
                .map_err(|e| TransferError::Transport(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(TransferError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            Ok(resp
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string))
        })
    }
}

// ---------------------------------------------------------------------------
// ChunkUploader
// ---------------------------------------------------------------------------

/// Tuning for one multipart transfer.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Requested chunk size; the single source of truth for part offsets.
    pub chunk_size: u64,
    /// Maximum parts in flight.
    pub parallelism: usize,
    /// Total attempts per part, including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl UploadOptions {
    pub fn new(chunk_size: u64, parallelism: usize) -> Self {
        Self {
            chunk_size,
            parallelism,
            max_attempts: PART_MAX_ATTEMPTS,
            backoff: Backoff::part_upload(),
        }
    }
}

/// Uploads every part of a session and collects the commit payload.
pub struct ChunkUploader {
    transport: Arc<dyn PartTransport>,
    options: UploadOptions,
    progress: Option<mpsc::Sender<ProgressUpdate>>,
}

impl ChunkUploader {
    pub fn new(transport: Arc<dyn PartTransport>, options: UploadOptions) -> Self {
        Self {
            transport,
            options,
            progress: None,
        }
    }

    /// Forwards progress snapshots to `tx`. Updates are dropped when the
    /// channel is full, never blocking the transfer.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Uploads `parts` from `reader` and returns the sorted commit payload.
    ///
    /// The first part to exhaust its attempts fails the whole transfer.
    /// Parts that have not started yet are skipped; parts already in flight
    /// finish their current attempt and their results are discarded.
    pub async fn upload(
        &self,
        parts: &[UploadPart],
        reader: PartReader,
        metadata: &FileMetadata,
    ) -> Result<CommitPayload, TransferError> {
        validate_options(self.options.chunk_size, self.options.parallelism)?;
        validate_parts(parts)?;
        if reader.chunk_size() != self.options.chunk_size {
            return Err(TransferError::InvalidChunkSize(reader.chunk_size()));
        }
        let expected = reader.file_size().div_ceil(reader.chunk_size());
        if parts.len() as u64 != expected {
            return Err(TransferError::InvalidParts(format!(
                "{} parts do not cover {} bytes in chunks of {} (expected {expected})",
                parts.len(),
                reader.file_size(),
                reader.chunk_size()
            )));
        }

        info!(
            file = %metadata.filename,
            size = metadata.size,
            parts = parts.len(),
            parallelism = self.options.parallelism,
            "uploading parts"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.parallelism));
        let cancel = CancellationToken::new();
        let (bytes_tx, bytes_rx) = mpsc::channel::<u64>(parts.len());
        let reporter = tokio::spawn(report_progress(
            ProgressReporter::new(metadata.size),
            bytes_rx,
            self.progress.clone(),
        ));

        let mut tasks = JoinSet::new();
        for part in parts.iter().cloned() {
            let task = PartTask {
                transport: Arc::clone(&self.transport),
                reader: reader.clone(),
                semaphore: Arc::clone(&semaphore),
                cancel: cancel.clone(),
                confirmed: bytes_tx.clone(),
                max_attempts: self.options.max_attempts.max(1),
                backoff: self.options.backoff.clone(),
            };
            tasks.spawn(task.run(part));
        }
        drop(bytes_tx);
        drop(reader);

        let mut results = Vec::with_capacity(parts.len());
        let mut first_error: Option<TransferError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| Err(TransferError::Join(e.to_string())));
            match outcome {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(e) => {
                    if first_error.is_none() {
                        warn!(error = %e, "part failed, stopping remaining parts");
                        cancel.cancel();
                        first_error = Some(e);
                    }
                }
            }
        }

        let uploaded = reporter
            .await
            .map_err(|e| TransferError::Join(e.to_string()))?;

        if let Some(e) = first_error {
            return Err(e);
        }

        let payload = CommitPayload::from_results(results);
        let bad = payload.discrepancies(parts);
        if !bad.is_empty() {
            return Err(TransferError::IncompletePayload(bad));
        }

        info!(bytes = uploaded, parts = payload.parts.len(), "all parts uploaded");
        Ok(payload)
    }
}

/// Single consumer of confirmed byte counts.
async fn report_progress(
    mut reporter: ProgressReporter,
    mut confirmed: mpsc::Receiver<u64>,
    sink: Option<mpsc::Sender<ProgressUpdate>>,
) -> u64 {
    while let Some(bytes) = confirmed.recv().await {
        let update = reporter.record(bytes);
        info!("{}", update.line);
        if let Some(ref tx) = sink {
            let _ = tx.try_send(update);
        }
    }
    reporter.uploaded()
}

struct PartTask {
    transport: Arc<dyn PartTransport>,
    reader: PartReader,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    confirmed: mpsc::Sender<u64>,
    max_attempts: u32,
    backoff: Backoff,
}

impl PartTask {
    /// Returns `Ok(None)` when the part was skipped after a sibling failed.
    async fn run(self, part: UploadPart) -> Result<Option<PartResult>, TransferError> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(None),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|e| TransferError::Transport(e.to_string()))?
            }
        };
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        // Cancel while the permit is still held so no queued part starts.
        let result = self.send(&part).await;
        if result.is_err() {
            self.cancel.cancel();
        }
        result
    }

    async fn send(&self, part: &UploadPart) -> Result<Option<PartResult>, TransferError> {
        let n = part.part_number;
        let data = self.reader.read_part_async(n).await?;
        let len = data.len() as u64;

        let mut attempt = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            attempt += 1;
            debug!(part = n, attempt, bytes = len, "uploading part");

            let err = match self.transport.put_part(&part.url, data.clone()).await {
                Ok(raw) => match raw.as_deref().and_then(normalize_etag) {
                    Some(etag) => {
                        let _ = self.confirmed.send(len).await;
                        debug!(part = n, attempt, "part uploaded");
                        return Ok(Some(PartResult {
                            part_number: n,
                            etag,
                        }));
                    }
                    None => TransferError::MissingEtag { part_number: n },
                },
                Err(e) => e,
            };

            if attempt >= self.max_attempts {
                return Err(TransferError::Part {
                    part_number: n,
                    attempts: attempt,
                    message: err.to_string(),
                });
            }

            let delay = self.backoff.delay_with_jitter(attempt);
            warn!(
                part = n,
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "part upload failed, retrying"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
