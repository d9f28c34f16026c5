//! Storage and database configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default SQLite database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://modelyard.db?mode=rwc";

/// Default maximum number of pooled database connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default bucket for model artifacts.
pub const DEFAULT_MODELS_BUCKET: &str = "modelyard-models";

/// Default bucket for bento artifacts.
pub const DEFAULT_BENTOS_BUCKET: &str = "modelyard-bentos";

/// Expiry of presigned URLs.
pub const PRESIGN_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// S3-compatible object storage settings.
///
/// `endpoint` is the address handed to clients in presigned URLs;
/// `endpoint_in_cluster` is the address this server talks to. When they
/// differ, presigned URLs are rewritten to the public endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub endpoint: String,
    pub endpoint_in_cluster: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub secure: bool,
    pub models_bucket_name: String,
    pub bentos_bucket_name: String,
}

impl S3Config {
    /// Create a config for a single endpoint used both in and out of cluster.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint_in_cluster: endpoint.clone(),
            endpoint,
            access_key: String::new(),
            secret_key: String::new(),
            region: "us-east-1".to_string(),
            secure: false,
            models_bucket_name: DEFAULT_MODELS_BUCKET.to_string(),
            bentos_bucket_name: DEFAULT_BENTOS_BUCKET.to_string(),
        }
    }

    /// Set the in-cluster endpoint.
    pub fn with_endpoint_in_cluster(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_in_cluster = endpoint.into();
        self
    }

    /// Set the access credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Use https when talking to the endpoint.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the models bucket.
    pub fn with_models_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.models_bucket_name = bucket.into();
        self
    }

    /// Set the bentos bucket.
    pub fn with_bentos_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bentos_bucket_name = bucket.into();
        self
    }

    /// Whether presigned URLs must be rewritten to the public endpoint.
    pub fn rewrites_presigned_host(&self) -> bool {
        self.endpoint != self.endpoint_in_cluster
    }

    /// URL of the in-cluster endpoint with scheme.
    pub fn endpoint_url(&self) -> String {
        with_scheme(&self.endpoint_in_cluster, self.secure)
    }

    /// URL of the public endpoint with scheme.
    pub fn public_url(&self) -> String {
        with_scheme(&self.endpoint, self.secure)
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self::new("localhost:9000")
    }
}

fn with_scheme(endpoint: &str, secure: bool) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if secure {
        format!("https://{}", endpoint)
    } else {
        format!("http://{}", endpoint)
    }
}

/// Database pool settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// An in-memory database. Limited to one connection so that every
    /// query sees the same database.
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:").with_max_connections(1)
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_s3_config() {
        let config = S3Config::default();
        assert_eq!(config.endpoint, "localhost:9000");
        assert_eq!(config.models_bucket_name, DEFAULT_MODELS_BUCKET);
        assert!(!config.rewrites_presigned_host());
        assert_eq!(config.endpoint_url(), "http://localhost:9000");
    }

    #[test]
    fn test_s3_config_builder() {
        let config = S3Config::new("s3.example.com")
            .with_endpoint_in_cluster("minio.modelyard-system:9000")
            .with_credentials("ak", "sk")
            .with_secure(true)
            .with_models_bucket("models");

        assert!(config.rewrites_presigned_host());
        assert_eq!(config.endpoint_url(), "https://minio.modelyard-system:9000");
        assert_eq!(config.access_key, "ak");
        assert_eq!(config.models_bucket_name, "models");
    }

    #[test]
    fn test_in_memory_database_uses_single_connection() {
        let config = DatabaseConfig::in_memory();
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.url, "sqlite::memory:");
    }
}
