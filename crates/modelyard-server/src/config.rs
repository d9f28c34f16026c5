//! Server configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use modelyard_core::config::{DEFAULT_BENTOS_BUCKET, DEFAULT_DATABASE_URL, DEFAULT_MODELS_BUCKET};
use modelyard_core::control_plane::{DEFAULT_EXTERNAL_URL, DEFAULT_IMAGE_BUILDER_NAMESPACE};
use modelyard_core::{DatabaseConfig, S3Config};

/// Default request body limit, large enough for model archives.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024 * 1024;

/// Where model archives are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// S3-compatible object storage.
    S3,
    /// Process memory; contents are lost on restart.
    Memory,
}

/// Modelyard API server command line arguments.
#[derive(Debug, Parser)]
#[command(name = "modelyard-server")]
#[command(about = "Control plane API server for Modelyard")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, env = "MODELYARD_LISTEN", default_value = "0.0.0.0:7777")]
    pub listen: String,

    /// SQLite database URL.
    #[arg(long, env = "MODELYARD_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Maximum number of pooled database connections.
    #[arg(long, env = "MODELYARD_DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// Object storage backend.
    #[arg(long, env = "MODELYARD_STORAGE", value_enum, default_value_t = StorageBackend::S3)]
    pub storage: StorageBackend,

    /// Public S3 endpoint, as reachable by clients.
    #[arg(long, env = "MODELYARD_S3_ENDPOINT", default_value = "localhost:9000")]
    pub s3_endpoint: String,

    /// S3 endpoint as reachable from inside the cluster. Defaults to the public endpoint.
    #[arg(long, env = "MODELYARD_S3_ENDPOINT_IN_CLUSTER")]
    pub s3_endpoint_in_cluster: Option<String>,

    /// S3 access key.
    #[arg(long, env = "MODELYARD_S3_ACCESS_KEY", default_value = "")]
    pub s3_access_key: String,

    /// S3 secret key.
    #[arg(long, env = "MODELYARD_S3_SECRET_KEY", default_value = "", hide_env_values = true)]
    pub s3_secret_key: String,

    /// S3 region.
    #[arg(long, env = "MODELYARD_S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    /// Use HTTPS for S3.
    #[arg(long, env = "MODELYARD_S3_SECURE")]
    pub s3_secure: bool,

    /// Bucket holding model archives.
    #[arg(long, env = "MODELYARD_S3_MODELS_BUCKET", default_value = DEFAULT_MODELS_BUCKET)]
    pub s3_models_bucket: String,

    /// Bucket holding bento archives.
    #[arg(long, env = "MODELYARD_S3_BENTOS_BUCKET", default_value = DEFAULT_BENTOS_BUCKET)]
    pub s3_bentos_bucket: String,

    /// Directory with the built web UI.
    #[arg(long, env = "MODELYARD_UI_DIST_DIR", default_value = "ui/dist")]
    pub ui_dist_dir: PathBuf,

    /// Base URL under which clients reach this server.
    #[arg(long, env = "MODELYARD_EXTERNAL_URL", default_value = DEFAULT_EXTERNAL_URL)]
    pub external_url: String,

    /// Key for signing part-upload URLs and login sessions. Random per
    /// process when unset, which logs everyone out on restart.
    #[arg(long, env = "MODELYARD_SIGNING_KEY", hide_env_values = true)]
    pub signing_key: Option<String>,

    /// Namespace image builder pods run in.
    #[arg(long, env = "MODELYARD_IMAGE_BUILDER_NAMESPACE", default_value = DEFAULT_IMAGE_BUILDER_NAMESPACE)]
    pub image_builder_namespace: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "MODELYARD_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Log level for the server's own targets.
    #[arg(long, env = "MODELYARD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Database pool settings.
    pub database: DatabaseConfig,
    /// Object storage backend.
    pub storage: StorageBackend,
    /// Default object storage settings.
    pub s3: S3Config,
    /// Directory with the built web UI.
    pub ui_dist_dir: PathBuf,
    /// Base URL under which clients reach this server.
    pub external_url: String,
    /// Key for signing part-upload URLs and login sessions.
    pub signing_key: Option<String>,
    /// Namespace image builder pods run in.
    pub image_builder_namespace: String,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Log level for the server's own targets.
    pub log_level: String,
}

impl ServerConfig {
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.database = database;
        self
    }

    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_s3(mut self, s3: S3Config) -> Self {
        self.s3 = s3;
        self
    }

    pub fn with_ui_dist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ui_dist_dir = dir.into();
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = url.into();
        self
    }

    pub fn with_signing_key(mut self, key: impl Into<String>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// The `EnvFilter` directive used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> String {
        format!("modelyard_server={0},modelyard_core={0},tower_http=info", self.log_level)
    }

    /// Path of the UI entry page.
    pub fn index_path(&self) -> PathBuf {
        self.ui_dist_dir.join("index.html")
    }
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        let endpoint_in_cluster = args
            .s3_endpoint_in_cluster
            .clone()
            .unwrap_or_else(|| args.s3_endpoint.clone());
        let s3 = S3Config::new(&args.s3_endpoint)
            .with_endpoint_in_cluster(endpoint_in_cluster)
            .with_credentials(&args.s3_access_key, &args.s3_secret_key)
            .with_region(&args.s3_region)
            .with_secure(args.s3_secure)
            .with_models_bucket(&args.s3_models_bucket)
            .with_bentos_bucket(&args.s3_bentos_bucket);

        Self {
            listen_addr: args.listen.clone(),
            database: DatabaseConfig::new(&args.database_url)
                .with_max_connections(args.database_max_connections),
            storage: args.storage,
            s3,
            ui_dist_dir: args.ui_dist_dir.clone(),
            external_url: args.external_url.clone(),
            signing_key: args.signing_key.clone().filter(|k| !k.is_empty()),
            image_builder_namespace: args.image_builder_namespace.clone(),
            max_body_bytes: args.max_body_bytes,
            log_level: args.log_level.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7777".to_string(),
            database: DatabaseConfig::default(),
            storage: StorageBackend::S3,
            s3: S3Config::default(),
            ui_dist_dir: PathBuf::from("ui/dist"),
            external_url: DEFAULT_EXTERNAL_URL.to_string(),
            signing_key: None,
            image_builder_namespace: DEFAULT_IMAGE_BUILDER_NAMESPACE.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["modelyard-server"]);
        let config = ServerConfig::from(&args);
        assert_eq!(config.listen_addr, "0.0.0.0:7777");
        assert_eq!(config.storage, StorageBackend::S3);
        assert_eq!(config.s3.endpoint, "localhost:9000");
        assert_eq!(config.s3.endpoint_in_cluster, "localhost:9000");
        assert_eq!(config.s3.models_bucket_name, DEFAULT_MODELS_BUCKET);
        assert!(config.signing_key.is_none());
        assert_eq!(config.index_path(), PathBuf::from("ui/dist/index.html"));
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from([
            "modelyard-server",
            "--storage",
            "memory",
            "--s3-endpoint",
            "s3.example.com",
            "--s3-endpoint-in-cluster",
            "minio.modelyard:9000",
            "--s3-secure",
            "--signing-key",
            "secret",
            "--log-level",
            "debug",
        ]);
        let config = ServerConfig::from(&args);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.s3.secure);
        assert_eq!(config.s3.endpoint_in_cluster, "minio.modelyard:9000");
        assert_eq!(config.signing_key.as_deref(), Some("secret"));
        assert_eq!(
            config.log_filter(),
            "modelyard_server=debug,modelyard_core=debug,tower_http=info"
        );
    }

    #[test]
    fn test_builder_setters() {
        let config = ServerConfig::default()
            .with_listen_addr("127.0.0.1:0")
            .with_storage(StorageBackend::Memory)
            .with_ui_dist_dir("/srv/ui")
            .with_signing_key("k");
        assert_eq!(config.listen_addr, "127.0.0.1:0");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.index_path(), PathBuf::from("/srv/ui/index.html"));
        assert_eq!(config.signing_key.as_deref(), Some("k"));
    }
}
