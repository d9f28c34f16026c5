use std::sync::Arc;

use object_store::aws::AmazonS3Builder;

use super::{ArtifactStore, StoreProvider};
use crate::config::S3Config;
use crate::error::{Error, Result};

/// Opens buckets on an S3-compatible endpoint.
#[derive(Debug, Default, Clone)]
pub struct S3StoreProvider;

impl S3StoreProvider {
    pub fn new() -> Self {
        Self
    }
}

impl StoreProvider for S3StoreProvider {
    fn open(&self, config: &S3Config, bucket: &str) -> Result<ArtifactStore> {
        let s3 = AmazonS3Builder::new()
            .with_endpoint(config.endpoint_url())
            .with_bucket_name(bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_allow_http(!config.secure)
            .with_virtual_hosted_style_request(false)
            .build()
            .map_err(|e| Error::Config(format!("failed to open bucket {}: {}", bucket, e)))?;

        tracing::debug!(bucket, endpoint = %config.endpoint_in_cluster, "opened s3 bucket");
        Ok(ArtifactStore::new(config.clone(), bucket, Arc::new(s3)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_builds_store_without_network() {
        let config = S3Config::new("localhost:9000").with_credentials("ak", "sk");
        let store = S3StoreProvider::new().open(&config, "models").unwrap();
        assert_eq!(store.bucket(), "models");
    }
}
