//! Modelyard Core - records, services, artifact storage, and Kubernetes
//! reconciliation for the Modelyard control plane.
//!
//! Services are plain async functions over a `sqlx` SQLite connection. The
//! [`ControlPlane`] carries the handles they need beyond the database: object
//! storage for model archives and Kubernetes access for deployments.

pub mod config;
pub mod control_plane;
pub mod db;
pub mod error;
pub mod kubernetes;
pub mod records;
pub mod schemas;
pub mod services;
pub mod signing;
pub mod storage;

pub use config::{DatabaseConfig, S3Config};
pub use control_plane::ControlPlane;
pub use db::{LabelFilter, LabelOperator, ListOptions};
pub use error::{Context, Error, Result};
pub use kubernetes::{
    BentoDeployment, BentoDeploymentClient, BentoDeploymentSpec, ClusterConnector, KubeConnector,
    KubePodWithStatus,
};
pub use records::{
    ApiToken, Bento, BentoModelRel, BentoRepository, Cluster, Deployment, DeploymentTarget, Id,
    Label, Model, ModelRepository, Organization, OrganizationConfig, User,
};
pub use schemas::{
    DeploymentStatus, DeploymentTargetConfig, ImageBuildStatus, LabelItem, ModelManifest,
    ModelUploadStatus, ResourceType, Tag,
};
pub use storage::{
    ArtifactStore, CompletedPart, InMemoryStoreProvider, PartUploadClaims, S3StoreProvider,
    StoreProvider,
};
