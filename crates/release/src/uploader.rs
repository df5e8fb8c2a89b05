//! Release asset upload flow.
//!
//! Files up to [`MIN_MULTIPART_UPLOAD_SIZE`] go through one form upload.
//! Larger files open a multipart session which ends in exactly one commit
//! or one cancel.

use std::sync::Arc;

use assetlift_http::{Backoff, FormFile};
use assetlift_protocol::types::{FileMetadata, ReleaseAsset};
use assetlift_transfer::{
    ChunkUploader, PartReader, PartTransport, ProgressUpdate, UploadOptions, UploadSession,
    validate_options,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::api::ReleaseApi;
use crate::error::UploadError;
use crate::file::file_metadata;
use crate::types::{CreateOutcome, MIN_MULTIPART_UPLOAD_SIZE, Phase, StreamTarget, UploadRequest};

/// Uploads one file as a release asset.
pub struct ReleaseAssetUploader {
    api: Arc<dyn ReleaseApi>,
    transport: Arc<dyn PartTransport>,
    part_retry: Option<(u32, Backoff)>,
    progress: Option<mpsc::Sender<ProgressUpdate>>,
}

impl ReleaseAssetUploader {
    pub fn new(api: Arc<dyn ReleaseApi>, transport: Arc<dyn PartTransport>) -> Self {
        Self {
            api,
            transport,
            part_retry: None,
            progress: None,
        }
    }

    /// Overrides the per-part attempt budget and backoff.
    pub fn with_part_retry(mut self, max_attempts: u32, backoff: Backoff) -> Self {
        self.part_retry = Some((max_attempts, backoff));
        self
    }

    /// Forwards multipart progress snapshots to `tx`.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Runs the whole flow and returns the published asset.
    pub async fn upload(&self, req: &UploadRequest) -> Result<ReleaseAsset, UploadError> {
        validate_options(req.chunk_size, req.parallel_chunks)?;
        enter(Phase::Created);

        self.check_access(req.release_id).await?;
        enter(Phase::AccessChecked);

        let metadata = file_metadata(&req.file_path)?;
        info!(
            file = %metadata.filename,
            size = metadata.size,
            content_type = %metadata.content_type,
            "uploading release asset"
        );

        let asset = if metadata.size <= MIN_MULTIPART_UPLOAD_SIZE {
            self.stream_upload(req, &metadata).await?
        } else {
            self.multipart_upload(req, &metadata).await?
        };

        info!(asset_id = asset.id, url = %asset.download_url, "release asset uploaded");
        Ok(asset)
    }

    async fn check_access(&self, release_id: u64) -> Result<(), UploadError> {
        let actor = self.api.whoami().await?;
        info!(actor = %actor, "logged in");
        self.api.can_access_release(release_id).await?;
        info!(release_id, "access to release confirmed");
        Ok(())
    }

    async fn stream_upload(
        &self,
        req: &UploadRequest,
        metadata: &FileMetadata,
    ) -> Result<ReleaseAsset, UploadError> {
        debug!(
            size = metadata.size,
            threshold = MIN_MULTIPART_UPLOAD_SIZE,
            "file is small, using stream upload"
        );

        let existing = self.api.find_asset_id(req.release_id, &req.asset_key).await?;
        if existing.is_some() && !req.overwrite {
            return Err(self.conflict(req));
        }
        enter(Phase::AssetResolved);

        let data = tokio::fs::read(&req.file_path).await?;
        let file = FormFile {
            field: "asset".into(),
            filename: metadata.filename.clone(),
            content_type: metadata.content_type.clone(),
            data,
        };
        let target = match existing {
            Some(id) => StreamTarget::Existing(id),
            None => StreamTarget::New {
                release_id: req.release_id,
                asset_key: req.asset_key.clone(),
            },
        };
        enter(Phase::Uploading);
        self.api.stream_upload(&target, file).await?;

        let asset = self
            .api
            .get_asset(req.release_id, &req.asset_key)
            .await?
            .ok_or_else(|| UploadError::Protocol("release asset missing after upload".into()))?;
        enter(Phase::Committed);
        Ok(asset)
    }

    async fn multipart_upload(
        &self,
        req: &UploadRequest,
        metadata: &FileMetadata,
    ) -> Result<ReleaseAsset, UploadError> {
        let asset_id = self.resolve_asset(req).await?;
        enter(Phase::AssetResolved);

        let begun = self
            .api
            .begin_upload(asset_id, metadata, req.chunk_size)
            .await?;
        info!(
            asset_id,
            session = %begun.uuid,
            parts = begun.upload_parts.len(),
            "multipart upload begun"
        );
        enter(Phase::Begun);

        let mut session = UploadSession::new(begun.uuid, begun.upload_parts);
        match self.transfer(asset_id, &mut session, req, metadata).await {
            Ok(download_url) => {
                enter(Phase::Committed);
                Ok(ReleaseAsset {
                    id: asset_id,
                    download_url,
                })
            }
            Err(e) => {
                self.abort(asset_id, &mut session, &e).await;
                Err(e)
            }
        }
    }

    /// Uploads every part and commits. Any error leaves the session open
    /// for the caller to cancel.
    async fn transfer(
        &self,
        asset_id: u64,
        session: &mut UploadSession,
        req: &UploadRequest,
        metadata: &FileMetadata,
    ) -> Result<String, UploadError> {
        session.start()?;
        enter(Phase::Uploading);

        let reader = PartReader::open(&req.file_path, req.chunk_size)?;
        let payload = self
            .chunk_uploader(req)
            .upload(session.parts(), reader, metadata)
            .await?;
        session.ensure_complete(&payload)?;

        let href = self
            .api
            .commit_upload(asset_id, session.id(), &payload)
            .await?;
        session.mark_committed(&payload)?;
        Ok(href)
    }

    /// Cancels the remote session once. A failed cancel is only logged.
    async fn abort(&self, asset_id: u64, session: &mut UploadSession, cause: &UploadError) {
        error!(asset_id, session = %session.id(), error = %cause, "upload failed, cancelling session");
        enter(Phase::Cancelling);

        match self.api.cancel_upload(asset_id, session.id()).await {
            Ok(()) => {
                let _ = session.mark_cancelled();
                enter(Phase::Cancelled);
                info!(asset_id, session = %session.id(), "multipart session cancelled");
            }
            Err(e) => {
                let _ = session.mark_failed();
                enter(Phase::Failed);
                error!(asset_id, session = %session.id(), error = %e, "failed to cancel multipart session");
            }
        }
    }

    /// Finds or creates the asset record for the multipart path.
    async fn resolve_asset(&self, req: &UploadRequest) -> Result<u64, UploadError> {
        if let Some(id) = self.api.find_asset_id(req.release_id, &req.asset_key).await? {
            if !req.overwrite {
                return Err(self.conflict(req));
            }
            info!(asset_id = id, asset_key = %req.asset_key, "release asset exists, overwriting");
            return Ok(id);
        }

        match self.api.create_asset(req.release_id, &req.asset_key).await? {
            CreateOutcome::Created(id) => {
                debug!(asset_id = id, "release asset created");
                Ok(id)
            }
            CreateOutcome::AlreadyExists if req.overwrite => {
                info!(asset_key = %req.asset_key, "release asset created concurrently, overwriting");
                self.api
                    .find_asset_id(req.release_id, &req.asset_key)
                    .await?
                    .ok_or_else(|| self.conflict(req))
            }
            CreateOutcome::AlreadyExists => Err(self.conflict(req)),
        }
    }

    fn chunk_uploader(&self, req: &UploadRequest) -> ChunkUploader {
        let mut options = UploadOptions::new(req.chunk_size, req.parallel_chunks);
        if let Some((attempts, backoff)) = &self.part_retry {
            options.max_attempts = *attempts;
            options.backoff = backoff.clone();
        }

        let uploader = ChunkUploader::new(Arc::clone(&self.transport), options);
        match &self.progress {
            Some(tx) => uploader.with_progress(tx.clone()),
            None => uploader,
        }
    }

    fn conflict(&self, req: &UploadRequest) -> UploadError {
        UploadError::Conflict {
            release_id: req.release_id,
            asset_key: req.asset_key.clone(),
        }
    }
}

fn enter(phase: Phase) {
    debug!(?phase, "upload phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::time::Duration;

    use assetlift_protocol::messages::BeginUploadSession;
    use assetlift_protocol::types::{CommitPayload, UploadPart};
    use assetlift_transfer::TransferError;

    use crate::api::ApiFuture;

    const MIB: u64 = 1024 * 1024;

    /// Scripted control plane recording every call by name.
    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<String>>,
        not_logged_in: bool,
        no_access: bool,
        lookups: Mutex<VecDeque<Option<u64>>>,
        create_conflict: bool,
        empty_parts: bool,
        commit_fails: bool,
        cancel_fails: bool,
        /// Part size the server claims to use instead of the requested one.
        echo_chunk: Option<u64>,
        streamed: Mutex<Vec<(StreamTarget, usize)>>,
        begun_for: Mutex<Vec<u64>>,
    }

    impl MockApi {
        fn with_lookups(mut self, lookups: &[Option<u64>]) -> Self {
            self.lookups = Mutex::new(lookups.iter().copied().collect());
            self
        }

        fn record(&self, name: &str) {
            self.calls.lock().unwrap().push(name.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, name: &str) -> usize {
            self.calls().iter().filter(|c| *c == name).count()
        }
    }

    impl ReleaseApi for MockApi {
        fn whoami(&self) -> ApiFuture<'_, serde_json::Value> {
            self.record("whoami");
            Box::pin(async move {
                if self.not_logged_in {
                    Err(UploadError::NotLoggedIn { status: 401 })
                } else {
                    Ok(serde_json::json!({"username": "ci"}))
                }
            })
        }

        fn can_access_release(&self, release_id: u64) -> ApiFuture<'_, ()> {
            self.record("can_access");
            Box::pin(async move {
                if self.no_access {
                    Err(UploadError::Unauthorized { release_id })
                } else {
                    Ok(())
                }
            })
        }

        fn find_asset_id<'a>(&'a self, _: u64, _: &'a str) -> ApiFuture<'a, Option<u64>> {
            self.record("find");
            let next = self.lookups.lock().unwrap().pop_front().flatten();
            Box::pin(async move { Ok(next) })
        }

        fn create_asset<'a>(&'a self, _: u64, _: &'a str) -> ApiFuture<'a, CreateOutcome> {
            self.record("create");
            Box::pin(async move {
                if self.create_conflict {
                    Ok(CreateOutcome::AlreadyExists)
                } else {
                    Ok(CreateOutcome::Created(100))
                }
            })
        }

        fn begin_upload<'a>(
            &'a self,
            asset_id: u64,
            metadata: &'a FileMetadata,
            chunk_size: u64,
        ) -> ApiFuture<'a, BeginUploadSession> {
            self.record("begin");
            self.begun_for.lock().unwrap().push(asset_id);
            let chunk_size = self.echo_chunk.unwrap_or(chunk_size);
            Box::pin(async move {
                let count = if self.empty_parts {
                    0
                } else {
                    metadata.size.div_ceil(chunk_size) as u32
                };
                Ok(BeginUploadSession {
                    uuid: "session-1".into(),
                    upload_parts: (1..=count)
                        .map(|n| UploadPart {
                            part_number: n,
                            url: format!("mock://storage/{n}"),
                            chunk_size,
                        })
                        .collect(),
                })
            })
        }

        fn commit_upload<'a>(
            &'a self,
            asset_id: u64,
            uuid: &'a str,
            payload: &'a CommitPayload,
        ) -> ApiFuture<'a, String> {
            self.record("commit");
            Box::pin(async move {
                assert_eq!(uuid, "session-1");
                if self.commit_fails {
                    return Err(UploadError::Api {
                        status: 500,
                        body: "commit exploded".into(),
                    });
                }
                Ok(format!("https://files/{asset_id}/{}", payload.parts.len()))
            })
        }

        fn cancel_upload<'a>(&'a self, _: u64, uuid: &'a str) -> ApiFuture<'a, ()> {
            self.record("cancel");
            Box::pin(async move {
                assert_eq!(uuid, "session-1");
                if self.cancel_fails {
                    Err(UploadError::Api {
                        status: 503,
                        body: "cancel unavailable".into(),
                    })
                } else {
                    Ok(())
                }
            })
        }

        fn stream_upload<'a>(
            &'a self,
            target: &'a StreamTarget,
            file: FormFile,
        ) -> ApiFuture<'a, ()> {
            self.record("stream");
            self.streamed
                .lock()
                .unwrap()
                .push((target.clone(), file.data.len()));
            Box::pin(async move { Ok(()) })
        }

        fn get_asset<'a>(
            &'a self,
            _: u64,
            asset_key: &'a str,
        ) -> ApiFuture<'a, Option<ReleaseAsset>> {
            self.record("get_asset");
            Box::pin(async move {
                Ok(Some(ReleaseAsset {
                    id: 7,
                    download_url: format!("https://files/{asset_key}"),
                }))
            })
        }
    }

    /// Storage stub that can fail one part permanently.
    #[derive(Default)]
    struct StubStorage {
        fail_part: Option<u32>,
        puts: Mutex<Vec<(u32, usize)>>,
    }

    impl PartTransport for StubStorage {
        fn put_part<'a>(
            &'a self,
            url: &'a str,
            data: Vec<u8>,
        ) -> Pin<Box<dyn Future<Output = Result<Option<String>, TransferError>> + Send + 'a>>
        {
            Box::pin(async move {
                let n: u32 = url.rsplit('/').next().unwrap().parse().unwrap();
                self.puts.lock().unwrap().push((n, data.len()));
                if self.fail_part == Some(n) {
                    return Err(TransferError::Status {
                        status: 500,
                        body: "storage down".into(),
                    });
                }
                Ok(Some(format!("\"tag-{n}\"")))
            })
        }
    }

    fn file_of(size: u64) -> tempfile::NamedTempFile {
        let f = tempfile::Builder::new().suffix(".img").tempfile().unwrap();
        f.as_file().set_len(size).unwrap();
        f
    }

    fn request(file: &tempfile::NamedTempFile, overwrite: bool) -> UploadRequest {
        let mut req = UploadRequest::new(42, "os-image", file.path());
        req.overwrite = overwrite;
        req.chunk_size = 5 * MIB;
        req.parallel_chunks = 2;
        req
    }

    fn uploader(api: &Arc<MockApi>, storage: &Arc<StubStorage>) -> ReleaseAssetUploader {
        let fast = Backoff {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            factor: 1.0,
            jitter_ratio: 0.0,
        };
        ReleaseAssetUploader::new(api.clone(), storage.clone()).with_part_retry(1, fast)
    }

    #[tokio::test]
    async fn multipart_upload_commits_sorted_parts() {
        let file = file_of(10 * MIB);
        let api = Arc::new(MockApi::default());
        let storage = Arc::new(StubStorage::default());

        let asset = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap();

        assert_eq!(asset.id, 100);
        assert_eq!(asset.download_url, "https://files/100/2");
        assert_eq!(
            api.calls(),
            vec!["whoami", "can_access", "find", "create", "begin", "commit"]
        );

        let mut puts = storage.puts.lock().unwrap().clone();
        puts.sort();
        assert_eq!(puts, vec![(1, 5 * MIB as usize), (2, 5 * MIB as usize)]);
    }

    #[tokio::test]
    async fn part_failure_cancels_once_and_keeps_original_error() {
        let file = file_of(11 * MIB);
        let api = Arc::new(MockApi::default());
        let storage = Arc::new(StubStorage {
            fail_part: Some(2),
            ..Default::default()
        });

        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                UploadError::Transfer(TransferError::Part { part_number: 2, .. })
            ),
            "{err:?}"
        );
        assert_eq!(api.count("cancel"), 1);
        assert_eq!(api.count("commit"), 0);
    }

    #[tokio::test]
    async fn one_of_ten_parts_failing_cancels_once_even_if_cancel_fails() {
        let file = file_of(50 * MIB);
        let api = Arc::new(MockApi {
            cancel_fails: true,
            ..Default::default()
        });
        let storage = Arc::new(StubStorage {
            fail_part: Some(7),
            ..Default::default()
        });
        let mut req = request(&file, false);
        req.parallel_chunks = 4;

        let err = uploader(&api, &storage).upload(&req).await.unwrap_err();

        assert!(
            matches!(
                err,
                UploadError::Transfer(TransferError::Part { part_number: 7, .. })
            ),
            "{err:?}"
        );
        assert_eq!(api.count("begin"), 1);
        assert_eq!(api.count("cancel"), 1);
        assert_eq!(api.count("commit"), 0);
    }

    #[tokio::test]
    async fn part_list_not_covering_file_cancels_session() {
        // 11 MiB needs three 5 MiB parts; the server hands out two 6 MiB ones.
        let file = file_of(11 * MIB);
        let api = Arc::new(MockApi {
            echo_chunk: Some(6 * MIB),
            ..Default::default()
        });
        let storage = Arc::new(StubStorage::default());

        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();

        assert!(
            matches!(err, UploadError::Transfer(TransferError::InvalidParts(_))),
            "{err:?}"
        );
        assert_eq!(api.count("cancel"), 1);
        assert_eq!(api.count("commit"), 0);
        assert!(storage.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_cancel_does_not_mask_upload_error() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi {
            cancel_fails: true,
            ..Default::default()
        });
        let storage = Arc::new(StubStorage {
            fail_part: Some(1),
            ..Default::default()
        });

        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Transfer(TransferError::Part { part_number: 1, .. })
        ));
        assert_eq!(api.count("cancel"), 1);
    }

    #[tokio::test]
    async fn commit_failure_cancels_session() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi {
            commit_fails: true,
            ..Default::default()
        });
        let storage = Arc::new(StubStorage::default());

        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Api { status: 500, .. }));
        assert_eq!(api.count("commit"), 1);
        assert_eq!(api.count("cancel"), 1);
    }

    #[tokio::test]
    async fn empty_part_list_cancels_session() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi {
            empty_parts: true,
            ..Default::default()
        });
        let storage = Arc::new(StubStorage::default());

        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Transfer(TransferError::InvalidParts(_))
        ));
        assert_eq!(api.count("cancel"), 1);
        assert!(storage.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_asset_without_overwrite_conflicts_before_upload() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi::default().with_lookups(&[Some(5)]));
        let storage = Arc::new(StubStorage::default());

        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Conflict {
                release_id: 42,
                ..
            }
        ));
        assert_eq!(api.calls(), vec!["whoami", "can_access", "find"]);
        assert!(storage.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_asset_with_overwrite_is_reused() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi::default().with_lookups(&[Some(5)]));
        let storage = Arc::new(StubStorage::default());

        let asset = uploader(&api, &storage)
            .upload(&request(&file, true))
            .await
            .unwrap();

        assert_eq!(asset.id, 5);
        assert_eq!(api.count("create"), 0);
        assert_eq!(*api.begun_for.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn create_race_with_overwrite_reresolves() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi {
            create_conflict: true,
            ..Default::default()
        }
        .with_lookups(&[None, Some(77)]));
        let storage = Arc::new(StubStorage::default());

        let asset = uploader(&api, &storage)
            .upload(&request(&file, true))
            .await
            .unwrap();

        assert_eq!(asset.id, 77);
        assert_eq!(
            api.calls(),
            vec!["whoami", "can_access", "find", "create", "find", "begin", "commit"]
        );
    }

    #[tokio::test]
    async fn create_race_without_overwrite_conflicts() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi {
            create_conflict: true,
            ..Default::default()
        });
        let storage = Arc::new(StubStorage::default());

        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Conflict { .. }));
        assert_eq!(api.count("begin"), 0);
        assert_eq!(api.count("cancel"), 0);
    }

    #[tokio::test]
    async fn create_race_with_vanished_asset_conflicts() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi {
            create_conflict: true,
            ..Default::default()
        });
        let storage = Arc::new(StubStorage::default());

        let err = uploader(&api, &storage)
            .upload(&request(&file, true))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Conflict { .. }));
        assert_eq!(api.count("find"), 2);
    }

    #[tokio::test]
    async fn small_file_uses_stream_upload() {
        let file = file_of(MIB);
        let api = Arc::new(MockApi::default());
        let storage = Arc::new(StubStorage::default());

        let asset = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap();

        assert_eq!(asset.id, 7);
        assert_eq!(asset.download_url, "https://files/os-image");
        assert_eq!(
            api.calls(),
            vec!["whoami", "can_access", "find", "stream", "get_asset"]
        );
        assert_eq!(
            *api.streamed.lock().unwrap(),
            vec![(
                StreamTarget::New {
                    release_id: 42,
                    asset_key: "os-image".into()
                },
                MIB as usize
            )]
        );
        assert!(storage.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn threshold_sized_file_streams() {
        let file = file_of(MIN_MULTIPART_UPLOAD_SIZE);
        let api = Arc::new(MockApi::default().with_lookups(&[Some(3)]));
        let storage = Arc::new(StubStorage::default());

        uploader(&api, &storage)
            .upload(&request(&file, true))
            .await
            .unwrap();

        assert_eq!(api.count("begin"), 0);
        assert_eq!(api.streamed.lock().unwrap()[0].0, StreamTarget::Existing(3));
    }

    #[tokio::test]
    async fn stream_upload_respects_overwrite() {
        let file = file_of(1024);
        let api = Arc::new(MockApi::default().with_lookups(&[Some(3)]));
        let storage = Arc::new(StubStorage::default());

        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Conflict { .. }));
        assert_eq!(api.count("stream"), 0);
    }

    #[tokio::test]
    async fn access_failures_stop_before_any_resource() {
        let file = file_of(6 * MIB);
        let storage = Arc::new(StubStorage::default());

        let api = Arc::new(MockApi {
            no_access: true,
            ..Default::default()
        });
        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Unauthorized { release_id: 42 }));
        assert_eq!(api.calls(), vec!["whoami", "can_access"]);

        let api = Arc::new(MockApi {
            not_logged_in: true,
            ..Default::default()
        });
        let err = uploader(&api, &storage)
            .upload(&request(&file, false))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotLoggedIn { .. }));
        assert_eq!(api.calls(), vec!["whoami"]);
    }

    #[tokio::test]
    async fn invalid_options_fail_before_network() {
        let file = file_of(6 * MIB);
        let api = Arc::new(MockApi::default());
        let storage = Arc::new(StubStorage::default());
        let mut req = request(&file, false);
        req.parallel_chunks = 0;

        let err = uploader(&api, &storage).upload(&req).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Transfer(TransferError::InvalidParallelism(0))
        ));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn progress_reaches_file_size() {
        let file = file_of(12 * MIB);
        let api = Arc::new(MockApi::default());
        let storage = Arc::new(StubStorage::default());
        let (tx, mut rx) = mpsc::channel(16);

        let uploader = uploader(&api, &storage).with_progress(tx);
        uploader.upload(&request(&file, false)).await.unwrap();
        drop(uploader);

        let mut last = 0;
        let mut updates = 0;
        while let Some(update) = rx.recv().await {
            assert!(update.uploaded > last);
            last = update.uploaded;
            updates += 1;
        }
        assert_eq!(updates, 3);
        assert_eq!(last, 12 * MIB);
    }
}
