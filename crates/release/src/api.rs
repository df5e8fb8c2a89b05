//! Control-plane API seam.
//!
//! `ReleaseApi` is what the uploader talks to. `HttpReleaseApi` implements
//! it over the retrying HTTP client; tests substitute a recording mock.

use std::future::Future;
use std::pin::Pin;

use assetlift_http::{FormBody, FormFile, HttpResponse, RequestSpec, RetryClient};
use assetlift_protocol::messages::{
    AccessCheckRequest, AssetRecord, BeginUploadAsset, BeginUploadRequest, BeginUploadResponse,
    BeginUploadSession, CancelUploadRequest, CommitUploadRequest, CommitUploadResponse,
    CreateAssetRequest, CreatedAsset, IdRecord, ODataList,
};
use assetlift_protocol::types::{CommitPayload, FileMetadata, ReleaseAsset};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, info};

use crate::error::UploadError;
use crate::types::{CreateOutcome, StreamTarget};

/// Boxed future returned by every [`ReleaseApi`] call.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Characters left as-is inside a quoted OData key.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Remote operations needed to publish a release asset.
pub trait ReleaseApi: Send + Sync {
    /// Returns the authenticated actor.
    fn whoami(&self) -> ApiFuture<'_, serde_json::Value>;

    /// Fails with `Unauthorized` unless the caller may update the release.
    fn can_access_release(&self, release_id: u64) -> ApiFuture<'_, ()>;

    /// Looks up the id of `(release_id, asset_key)`.
    fn find_asset_id<'a>(&'a self, release_id: u64, asset_key: &'a str)
    -> ApiFuture<'a, Option<u64>>;

    /// Creates an empty asset record.
    fn create_asset<'a>(&'a self, release_id: u64, asset_key: &'a str)
    -> ApiFuture<'a, CreateOutcome>;

    /// Opens a multipart session for `asset_id`.
    fn begin_upload<'a>(
        &'a self,
        asset_id: u64,
        metadata: &'a FileMetadata,
        chunk_size: u64,
    ) -> ApiFuture<'a, BeginUploadSession>;

    /// Finalizes a session; returns the download URL.
    fn commit_upload<'a>(
        &'a self,
        asset_id: u64,
        uuid: &'a str,
        payload: &'a CommitPayload,
    ) -> ApiFuture<'a, String>;

    /// Aborts a session.
    fn cancel_upload<'a>(&'a self, asset_id: u64, uuid: &'a str) -> ApiFuture<'a, ()>;

    /// Uploads the whole file in one multipart-form request.
    fn stream_upload<'a>(&'a self, target: &'a StreamTarget, file: FormFile) -> ApiFuture<'a, ()>;

    /// Reads back an asset with its download URL.
    fn get_asset<'a>(&'a self, release_id: u64, asset_key: &'a str)
    -> ApiFuture<'a, Option<ReleaseAsset>>;
}

/// Path selecting one asset by its natural key.
pub fn asset_lookup_path(release_id: u64, asset_key: &str, select: &str) -> String {
    let quoted = asset_key.replace('\'', "''");
    let encoded = utf8_percent_encode(&quoted, KEY_ENCODE_SET);
    format!("resin/release_asset(release={release_id},asset_key='{encoded}')?$select={select}")
}

/// [`ReleaseApi`] over HTTP.
pub struct HttpReleaseApi {
    client: RetryClient,
}

impl HttpReleaseApi {
    pub fn new(client: RetryClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RetryClient {
        &self.client
    }

    async fn send_ok(&self, spec: RequestSpec) -> Result<HttpResponse, UploadError> {
        let resp = self.client.send(spec).await?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(UploadError::Api {
                status: resp.status.as_u16(),
                body: resp.text(),
            })
        }
    }
}

impl ReleaseApi for HttpReleaseApi {
    fn whoami(&self) -> ApiFuture<'_, serde_json::Value> {
        Box::pin(async move {
            let resp = self.client.send(RequestSpec::get("actor/v1/whoami")).await?;
            if !resp.is_success() {
                return Err(UploadError::NotLoggedIn {
                    status: resp.status.as_u16(),
                });
            }
            Ok(resp.json()?)
        })
    }

    fn can_access_release(&self, release_id: u64) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let spec = RequestSpec::post(format!("resin/release({release_id})/canAccess"))
                .json(&AccessCheckRequest::update())?;
            let resp = self.client.send(spec).await?;
            if !resp.is_success() {
                debug!(release_id, status = %resp.status, "access check rejected");
                return Err(UploadError::Unauthorized { release_id });
            }

            let body: ODataList<IdRecord> = resp.json()?;
            match body.first().and_then(|r| r.id) {
                Some(_) => Ok(()),
                None => Err(UploadError::Unauthorized { release_id }),
            }
        })
    }

    fn find_asset_id<'a>(
        &'a self,
        release_id: u64,
        asset_key: &'a str,
    ) -> ApiFuture<'a, Option<u64>> {
        Box::pin(async move {
            let spec = RequestSpec::get(asset_lookup_path(release_id, asset_key, "id"));
            let body: ODataList<IdRecord> = self.send_ok(spec).await?.json()?;
            Ok(body.first().and_then(|r| r.id))
        })
    }

    fn create_asset<'a>(
        &'a self,
        release_id: u64,
        asset_key: &'a str,
    ) -> ApiFuture<'a, CreateOutcome> {
        Box::pin(async move {
            let spec = RequestSpec::post("resin/release_asset").json(&CreateAssetRequest {
                asset_key: asset_key.to_string(),
                release: release_id,
            })?;
            let resp = self.client.send(spec).await?;
            if resp.status.as_u16() == 409 {
                return Ok(CreateOutcome::AlreadyExists);
            }
            if !resp.is_success() {
                return Err(UploadError::Api {
                    status: resp.status.as_u16(),
                    body: resp.text(),
                });
            }
            let created: CreatedAsset = resp.json()?;
            Ok(CreateOutcome::Created(created.id))
        })
    }

    fn begin_upload<'a>(
        &'a self,
        asset_id: u64,
        metadata: &'a FileMetadata,
        chunk_size: u64,
    ) -> ApiFuture<'a, BeginUploadSession> {
        Box::pin(async move {
            let spec = RequestSpec::post(format!("resin/release_asset({asset_id})/beginUpload"))
                .json(&BeginUploadRequest {
                    asset: BeginUploadAsset {
                        filename: metadata.filename.clone(),
                        content_type: metadata.content_type.clone(),
                        size: metadata.size,
                        chunk_size,
                    },
                })?;
            let body: BeginUploadResponse = self.send_ok(spec).await?.json()?;
            Ok(body.asset)
        })
    }

    fn commit_upload<'a>(
        &'a self,
        asset_id: u64,
        uuid: &'a str,
        payload: &'a CommitPayload,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let spec = RequestSpec::post(format!("resin/release_asset({asset_id})/commitUpload"))
                .json(&CommitUploadRequest {
                    uuid: uuid.to_string(),
                    provider_commit_data: payload.clone(),
                })?;
            let body: CommitUploadResponse = self.send_ok(spec).await?.json()?;
            Ok(body.href)
        })
    }

    fn cancel_upload<'a>(&'a self, asset_id: u64, uuid: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let spec = RequestSpec::post(format!("resin/release_asset({asset_id})/cancelUpload"))
                .json(&CancelUploadRequest {
                    uuid: uuid.to_string(),
                })?;
            self.send_ok(spec).await?;
            Ok(())
        })
    }

    fn stream_upload<'a>(&'a self, target: &'a StreamTarget, file: FormFile) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let spec = match target {
                StreamTarget::Existing(id) => {
                    info!(asset_id = *id, "release asset already exists, replacing its file");
                    RequestSpec::patch(format!("resin/release_asset({id})")).form(FormBody {
                        fields: Vec::new(),
                        file: Some(file),
                    })
                }
                StreamTarget::New {
                    release_id,
                    asset_key,
                } => {
                    debug!(release_id = *release_id, asset_key = %asset_key, "creating release asset");
                    RequestSpec::post("resin/release_asset").form(FormBody {
                        fields: vec![
                            ("asset_key".into(), asset_key.clone()),
                            ("release".into(), release_id.to_string()),
                        ],
                        file: Some(file),
                    })
                }
            };

            let resp = self.client.send(spec).await?;
            if !resp.is_success() {
                return Err(UploadError::UploadRejected {
                    status: resp.status.as_u16(),
                    body: resp.text(),
                });
            }
            Ok(())
        })
    }

    fn get_asset<'a>(
        &'a self,
        release_id: u64,
        asset_key: &'a str,
    ) -> ApiFuture<'a, Option<ReleaseAsset>> {
        Box::pin(async move {
            let spec = RequestSpec::get(asset_lookup_path(release_id, asset_key, "id,asset"));
            let body: ODataList<AssetRecord> = self.send_ok(spec).await?.json()?;
            let Some(record) = body.first() else {
                return Ok(None);
            };
            let href = record
                .asset
                .as_ref()
                .map(|a| a.href.clone())
                .ok_or_else(|| {
                    UploadError::Protocol(format!("release asset {} has no file", record.id))
                })?;
            Ok(Some(ReleaseAsset {
                id: record.id,
                download_url: href,
            }))
        })
    }
}
