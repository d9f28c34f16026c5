//! Artifact object storage.
//!
//! Model and bento archives live in S3-compatible buckets. [`ArtifactStore`]
//! wraps one bucket and exposes the operations the services need: whole
//! object put/get, multipart uploads, and presigned URLs. Stores are opened
//! through a [`StoreProvider`] so the server can use real S3 while tests use
//! an in-memory backend.

mod s3;

pub use s3::S3StoreProvider;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use http::Method;
use object_store::memory::InMemory;
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::S3Config;
use crate::error::{Error, Result};
use crate::signing;

/// Content type recorded on uploaded archives.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/octet-stream";

/// A finished part of a multipart upload, as reported by the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: usize,
    /// ETag returned when the part was stored.
    pub etag: String,
}

/// One bucket of artifact storage.
#[derive(Clone)]
pub struct ArtifactStore {
    bucket: String,
    config: S3Config,
    store: Arc<dyn ObjectStore>,
    multipart: Arc<dyn MultipartStore>,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.config.endpoint_in_cluster)
            .field("presign", &self.signer.is_some())
            .finish()
    }
}

impl ArtifactStore {
    /// Assemble a store from a backend that supports every operation.
    pub fn new<S>(config: S3Config, bucket: impl Into<String>, backend: Arc<S>) -> Self
    where
        S: ObjectStore + MultipartStore + Signer,
    {
        Self {
            bucket: bucket.into(),
            config,
            store: backend.clone(),
            multipart: backend.clone(),
            signer: Some(backend),
        }
    }

    /// A process-local store. Presigned URLs are unavailable.
    pub fn in_memory(config: S3Config, bucket: impl Into<String>) -> Self {
        let backend = Arc::new(InMemory::new());
        Self {
            bucket: bucket.into(),
            config,
            store: backend.clone(),
            multipart: backend,
            signer: None,
        }
    }

    /// The bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Store a whole object.
    pub async fn put(&self, object: &str, data: Bytes) -> Result<()> {
        let path = Path::from(object);
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, ARCHIVE_CONTENT_TYPE.into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.store
            .put_opts(&path, PutPayload::from(data), options)
            .await?;
        Ok(())
    }

    /// Stream an object's bytes.
    pub async fn get_stream(&self, object: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let result = self.store.get(&Path::from(object)).await.map_err(map_missing)?;
        Ok(result.into_stream().map(|chunk| chunk.map_err(Error::from)).boxed())
    }

    /// Read an object fully into memory.
    pub async fn get_bytes(&self, object: &str) -> Result<Bytes> {
        let result = self.store.get(&Path::from(object)).await.map_err(map_missing)?;
        Ok(result.bytes().await?)
    }

    /// Begin a multipart upload and return its upload id.
    pub async fn start_multipart(&self, object: &str) -> Result<String> {
        Ok(self.multipart.create_multipart(&Path::from(object)).await?)
    }

    /// Store one part of a multipart upload and return its ETag.
    pub async fn put_part(
        &self,
        object: &str,
        upload_id: &str,
        part_number: usize,
        data: Bytes,
    ) -> Result<String> {
        let part_idx = part_index(part_number)?;
        let part = self
            .multipart
            .put_part(
                &Path::from(object),
                &upload_id.to_string(),
                part_idx,
                PutPayload::from(data),
            )
            .await?;
        Ok(part.content_id)
    }

    /// Assemble the uploaded parts into the final object.
    pub async fn complete_multipart(
        &self,
        object: &str,
        upload_id: &str,
        mut parts: Vec<CompletedPart>,
    ) -> Result<()> {
        if parts.is_empty() {
            return Err(Error::InvalidArgument(
                "multipart upload has no parts".into(),
            ));
        }
        parts.sort_by_key(|p| p.part_number);
        for (expected, part) in parts.iter().enumerate() {
            if part.part_number != expected + 1 {
                return Err(Error::InvalidArgument(format!(
                    "multipart upload is missing part {}",
                    expected + 1
                )));
            }
        }

        let part_ids = parts
            .into_iter()
            .map(|p| PartId {
                content_id: p.etag,
            })
            .collect();
        self.multipart
            .complete_multipart(&Path::from(object), &upload_id.to_string(), part_ids)
            .await?;
        Ok(())
    }

    /// Presign a URL for `method` on `object`.
    pub async fn presign(&self, method: Method, object: &str, expires_in: Duration) -> Result<Url> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "bucket {} does not support presigned urls",
                self.bucket
            ))
        })?;
        let url = signer
            .signed_url(method, &Path::from(object), expires_in)
            .await?;
        rewrite_presigned_host(url, &self.config)
    }
}

/// Convert a 1-based part number into the 0-based index object_store uses.
fn part_index(part_number: usize) -> Result<usize> {
    part_number
        .checked_sub(1)
        .ok_or_else(|| Error::InvalidArgument("part numbers start at 1".into()))
}

fn map_missing(err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { path, .. } => Error::NotFound(format!("object {}", path)),
        other => Error::Storage(other),
    }
}

/// Point a presigned URL at the public endpoint when it differs from the
/// in-cluster one.
pub fn rewrite_presigned_host(mut url: Url, config: &S3Config) -> Result<Url> {
    if !config.rewrites_presigned_host() {
        return Ok(url);
    }
    let invalid = || Error::Config(format!("invalid s3 endpoint {}", config.endpoint));
    let public = Url::parse(&config.public_url()).map_err(|_| invalid())?;
    url.set_host(public.host_str()).map_err(|_| invalid())?;
    url.set_port(public.port()).map_err(|_| invalid())?;
    Ok(url)
}

/// Claims of a part upload authorized by a presigned URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartUploadClaims {
    /// Object the multipart upload writes.
    pub object: String,
    pub upload_id: String,
    /// 1-based part number.
    pub part_number: usize,
    /// Unix timestamp after which the grant is void.
    pub exp: u64,
}

impl PartUploadClaims {
    /// Grant one part upload for `ttl`.
    pub fn new(object: &str, upload_id: &str, part_number: usize, ttl: Duration) -> Self {
        Self {
            object: object.to_string(),
            upload_id: upload_id.to_string(),
            part_number,
            exp: signing::expires_in(ttl),
        }
    }

    /// Signed token carried in the URL's `token` parameter.
    pub fn sign(&self, key: &str) -> Result<String> {
        signing::sign(key, self)
    }

    /// Verify `token` and check it was issued for `object`.
    pub fn verify(key: &str, token: &str, object: &str) -> Result<Self> {
        let claims: Self = signing::verify(key, token, "part upload url")?;
        if claims.object != object {
            return Err(Error::Unauthorized(
                "part upload url was issued for another object".into(),
            ));
        }
        Ok(claims)
    }
}

/// Opens an [`ArtifactStore`] for a bucket.
pub trait StoreProvider: Send + Sync {
    fn open(&self, config: &S3Config, bucket: &str) -> Result<ArtifactStore>;
}

/// Keeps one in-memory store per bucket for the life of the process.
#[derive(Default)]
pub struct InMemoryStoreProvider {
    stores: Mutex<HashMap<String, ArtifactStore>>,
}

impl InMemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreProvider for InMemoryStoreProvider {
    fn open(&self, config: &S3Config, bucket: &str) -> Result<ArtifactStore> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| Error::Config("in-memory store registry poisoned".into()))?;
        let store = stores
            .entry(bucket.to_string())
            .or_insert_with(|| ArtifactStore::in_memory(config.clone(), bucket));
        Ok(store.clone())
    }
}
