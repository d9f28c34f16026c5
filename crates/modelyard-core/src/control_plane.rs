//! Shared handles used by the services.

use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::SqlitePool;

use crate::config::S3Config;
use crate::kubernetes::{ClusterConnector, KubeConnector};
use crate::services::kube_bento_deployment::SYNC_STATUS_TIMEOUT;
use crate::storage::{S3StoreProvider, StoreProvider};

/// Default namespace for image builder pods.
pub const DEFAULT_IMAGE_BUILDER_NAMESPACE: &str = "modelyard-builders";

/// Default externally reachable address of the API server.
pub const DEFAULT_EXTERNAL_URL: &str = "http://localhost:7777";

/// Database pool, storage, and cluster access for one running server.
#[derive(Clone)]
pub struct ControlPlane {
    pub pool: SqlitePool,
    /// Storage used by organizations without their own S3 settings.
    pub s3: S3Config,
    pub stores: Arc<dyn StoreProvider>,
    pub kube: Arc<dyn ClusterConnector>,
    /// Base URL clients use to reach this server.
    pub external_url: String,
    /// Key for signing part-upload URLs and login sessions.
    pub signing_key: Arc<str>,
    pub image_builder_namespace: String,
    /// Bound on the background status refresh after a deploy.
    pub status_sync_timeout: Duration,
}

impl ControlPlane {
    /// Create a control plane backed by real S3 and Kubernetes clients.
    pub fn new(pool: SqlitePool, s3: S3Config) -> Self {
        let signing_key: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect();
        Self {
            pool,
            s3,
            stores: Arc::new(S3StoreProvider::new()),
            kube: Arc::new(KubeConnector::new()),
            external_url: DEFAULT_EXTERNAL_URL.to_string(),
            signing_key: signing_key.into(),
            image_builder_namespace: DEFAULT_IMAGE_BUILDER_NAMESPACE.to_string(),
            status_sync_timeout: SYNC_STATUS_TIMEOUT,
        }
    }

    pub fn with_stores(mut self, stores: Arc<dyn StoreProvider>) -> Self {
        self.stores = stores;
        self
    }

    pub fn with_kube(mut self, kube: Arc<dyn ClusterConnector>) -> Self {
        self.kube = kube;
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_signing_key(mut self, key: impl Into<String>) -> Self {
        self.signing_key = key.into().into();
        self
    }

    pub fn with_image_builder_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.image_builder_namespace = namespace.into();
        self
    }

    pub fn with_status_sync_timeout(mut self, timeout: Duration) -> Self {
        self.status_sync_timeout = timeout;
        self
    }
}
