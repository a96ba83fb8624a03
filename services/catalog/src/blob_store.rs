//! Durable image storage.
//!
//! New catalog records arrive pointing at externally hosted images; the
//! copy helper materializes those into the blob store and hands back the
//! canonical address. A copy that lands as a zero-length object is
//! removed before the failure surfaces, so no partial object is left
//! behind.

use crate::config::BlobConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors from blob operations.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("upload of {name} produced an empty object")]
    UploadFailed { name: String },

    #[error("source fetch failed: {0}")]
    SourceFetch(String),

    #[error("blob storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Backing blob service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Fetch `source_url` server-side and store its bytes under `name`.
    async fn store_from_url(
        &self,
        name: &str,
        source_url: &str,
        content_type: &str,
    ) -> Result<(), BlobError>;

    /// Stored length of `name` in bytes.
    async fn object_len(&self, name: &str) -> Result<i64, BlobError>;

    async fn delete(&self, name: &str) -> Result<(), BlobError>;

    /// Canonical address of `name`.
    fn object_url(&self, name: &str) -> String;
}

/// Copies externally hosted images into the blob store.
pub struct ImageStore {
    backend: Arc<dyn BlobBackend>,
}

impl ImageStore {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self { backend }
    }

    /// Materialize `source_url` under `name` and return the canonical
    /// address of the stored object.
    ///
    /// Fails with [`BlobError::UploadFailed`] when the copy produced an
    /// empty object; the empty object is deleted first.
    #[instrument(skip(self))]
    pub async fn save_from_url(&self, name: &str, source_url: &str) -> Result<String, BlobError> {
        let content_type = content_type_for(source_url);

        self.backend
            .store_from_url(name, source_url, content_type)
            .await?;

        if self.backend.object_len(name).await? == 0 {
            self.backend.delete(name).await?;
            warn!(name, source_url, "copied object was empty, removed");
            return Err(BlobError::UploadFailed {
                name: name.to_string(),
            });
        }

        metrics::counter!("catalog.images.copied").increment(1);

        Ok(self.backend.object_url(name))
    }
}

/// Content type inferred from the source URL's file extension.
fn content_type_for(url: &str) -> &'static str {
    let file = url.rsplit('/').next().unwrap_or(url);
    let file = file.split(['?', '#']).next().unwrap_or(file);

    let extension = match file.rsplit_once('.') {
        Some((_, extension)) => extension.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };

    match extension.as_str() {
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// S3-compatible [`BlobBackend`].
///
/// S3 has no server-side copy-from-URL, so the fetch happens here and the
/// bytes are written with a single `put_object`.
pub struct S3BlobBackend {
    client: S3Client,
    http: reqwest::Client,
    bucket: String,
    region: String,
    public_base_url: Option<String>,
}

impl S3BlobBackend {
    /// Build a backend from configuration, honouring a custom endpoint
    /// and path-style access for MinIO-compatible stores.
    pub async fn connect(config: &BlobConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = S3ConfigBuilder::from(&aws_config);

        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = S3Client::from_conf(builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "blob store initialized"
        );

        Self {
            client,
            http: reqwest::Client::new(),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }
}

#[async_trait]
impl BlobBackend for S3BlobBackend {
    async fn store_from_url(
        &self,
        name: &str,
        source_url: &str,
        content_type: &str,
    ) -> Result<(), BlobError> {
        let response = self
            .http
            .get(source_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BlobError::SourceFetch(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BlobError::SourceFetch(e.to_string()))?;

        debug!(name, size_bytes = bytes.len(), "storing fetched object");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| BlobError::StorageUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn object_len(&self, name: &str) -> Result<i64, BlobError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| BlobError::StorageUnavailable(e.to_string()))?;

        Ok(head.content_length().unwrap_or(0))
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| BlobError::StorageUnavailable(e.to_string()))?;

        debug!(name, "object deleted");
        Ok(())
    }

    fn object_url(&self, name: &str) -> String {
        match self.public_base_url {
            Some(ref base) => format!("{}/{}", base.trim_end_matches('/'), name),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_returns_the_canonical_address() {
        let mut backend = MockBlobBackend::new();
        backend
            .expect_store_from_url()
            .times(1)
            .withf(|name, url, content_type| {
                name == "abc.png"
                    && url == "https://elsewhere.example/map.png"
                    && content_type == "image/png"
            })
            .returning(|_, _, _| Ok(()));
        backend
            .expect_object_len()
            .times(1)
            .returning(|_| Ok(42_000));
        backend.expect_delete().never();
        backend
            .expect_object_url()
            .times(1)
            .returning(|name| format!("https://images.example/{name}"));

        let store = ImageStore::new(Arc::new(backend));
        let address = store
            .save_from_url("abc.png", "https://elsewhere.example/map.png")
            .await
            .unwrap();

        assert_eq!(address, "https://images.example/abc.png");
    }

    #[tokio::test]
    async fn empty_copy_is_deleted_and_fails() {
        let mut backend = MockBlobBackend::new();
        backend
            .expect_store_from_url()
            .times(1)
            .returning(|_, _, _| Ok(()));
        backend.expect_object_len().times(1).returning(|_| Ok(0));
        backend
            .expect_delete()
            .times(1)
            .withf(|name| name == "abc.png")
            .returning(|_| Ok(()));
        backend.expect_object_url().never();

        let store = ImageStore::new(Arc::new(backend));
        let result = store
            .save_from_url("abc.png", "https://elsewhere.example/map.png")
            .await;

        assert!(matches!(result, Err(BlobError::UploadFailed { .. })));
    }

    #[tokio::test]
    async fn fetch_failure_stores_nothing() {
        let mut backend = MockBlobBackend::new();
        backend
            .expect_store_from_url()
            .times(1)
            .returning(|_, _, _| Err(BlobError::SourceFetch("404 not found".into())));
        backend.expect_object_len().never();
        backend.expect_delete().never();

        let store = ImageStore::new(Arc::new(backend));
        let result = store
            .save_from_url("abc.png", "https://elsewhere.example/missing.png")
            .await;

        assert!(matches!(result, Err(BlobError::SourceFetch(_))));
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(
            content_type_for("https://x.example/maps/world.jpg"),
            "image/jpeg"
        );
        assert_eq!(
            content_type_for("https://x.example/maps/world.JPEG"),
            "image/jpeg"
        );
        assert_eq!(
            content_type_for("https://x.example/world.png?size=large"),
            "image/png"
        );
        assert_eq!(content_type_for("https://x.example/world.webp"), "image/webp");
        assert_eq!(
            content_type_for("https://x.example/no-extension"),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for("https://x.example/archive.tar"),
            "application/octet-stream"
        );
    }
}
