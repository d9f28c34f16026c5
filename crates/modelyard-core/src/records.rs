//! Database records.
//!
//! Each struct maps one table row. Records serialize directly into API
//! responses, so secrets (token hashes, kubeconfigs, storage credentials)
//! are skipped on serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::config::S3Config;
use crate::schemas::{
    BentoManifest, DeploymentStatus, DeploymentTargetConfig, ImageBuildStatus, ModelManifest,
    ModelUploadStatus, ResourceType,
};

/// Row identifier.
pub type Id = i64;

/// Generate a new public identifier for a record.
pub fn new_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Id,
    pub uid: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-organization overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationConfig {
    /// Object storage used instead of the server default.
    #[serde(default)]
    pub s3: Option<S3Config>,
    /// Cluster that hosts image builder pods. Defaults to the first cluster.
    #[serde(default)]
    pub major_cluster_name: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organization {
    pub id: Id,
    pub uid: String,
    pub name: String,
    pub description: String,
    pub creator_id: Id,
    #[serde(skip_serializing)]
    pub config: Option<Json<OrganizationConfig>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Cluster {
    pub id: Id,
    pub uid: String,
    pub organization_id: Id,
    pub creator_id: Id,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing)]
    pub kube_config: Option<String>,
    pub default_namespace: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ModelRepository {
    pub id: Id,
    pub uid: String,
    pub organization_id: Id,
    pub creator_id: Id,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Model {
    pub id: Id,
    pub uid: String,
    pub model_repository_id: Id,
    pub creator_id: Id,
    pub version: String,
    pub description: String,
    pub image_build_status: ImageBuildStatus,
    pub image_build_status_syncing_at: Option<DateTime<Utc>>,
    pub image_build_status_updated_at: Option<DateTime<Utc>>,
    pub upload_status: ModelUploadStatus,
    pub upload_started_at: Option<DateTime<Utc>>,
    pub upload_finished_at: Option<DateTime<Utc>>,
    pub upload_finished_reason: String,
    pub build_at: DateTime<Utc>,
    pub manifest: Option<Json<ModelManifest>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BentoRepository {
    pub id: Id,
    pub uid: String,
    pub organization_id: Id,
    pub creator_id: Id,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Bento {
    pub id: Id,
    pub uid: String,
    pub bento_repository_id: Id,
    pub creator_id: Id,
    pub version: String,
    pub description: String,
    pub build_at: DateTime<Utc>,
    pub manifest: Option<Json<BentoManifest>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link between a bento and a model it packages.
#[derive(Debug, Clone, Copy, FromRow, Serialize)]
pub struct BentoModelRel {
    pub bento_id: Id,
    pub model_id: Id,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Deployment {
    pub id: Id,
    pub uid: String,
    pub cluster_id: Id,
    pub creator_id: Id,
    pub name: String,
    pub description: String,
    pub kube_namespace: String,
    pub status: DeploymentStatus,
    pub status_syncing_at: Option<DateTime<Utc>>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeploymentTarget {
    pub id: Id,
    pub uid: String,
    pub deployment_id: Id,
    pub bento_id: Id,
    pub creator_id: Id,
    pub config: Option<Json<DeploymentTargetConfig>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentTarget {
    /// The target config, if one was recorded.
    pub fn config(&self) -> Option<&DeploymentTargetConfig> {
        self.config.as_ref().map(|c| &c.0)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Label {
    pub id: Id,
    pub organization_id: Id,
    pub resource_type: ResourceType,
    pub resource_id: Id,
    pub key: String,
    pub value: String,
    pub creator_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiToken {
    pub id: Id,
    pub uid: String,
    pub user_id: Id,
    pub organization_id: Option<Id>,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub scopes: Json<Vec<String>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiToken {
    /// Whether the token is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expired_at.map(|at| at <= Utc::now()).unwrap_or(false)
    }
}

/// Records that point at a model repository.
pub trait ModelRepositoryAssociated {
    fn model_repository_id(&self) -> Id;
}

impl ModelRepositoryAssociated for Model {
    fn model_repository_id(&self) -> Id {
        self.model_repository_id
    }
}

/// Records that belong to an organization.
pub trait OrganizationAssociated {
    fn organization_id(&self) -> Id;
}

impl OrganizationAssociated for ModelRepository {
    fn organization_id(&self) -> Id {
        self.organization_id
    }
}

impl OrganizationAssociated for BentoRepository {
    fn organization_id(&self) -> Id {
        self.organization_id
    }
}

impl OrganizationAssociated for Cluster {
    fn organization_id(&self) -> Id {
        self.organization_id
    }
}

/// Records that point at a model.
pub trait ModelAssociated {
    fn model_id(&self) -> Id;
}

impl ModelAssociated for BentoModelRel {
    fn model_id(&self) -> Id {
        self.model_id
    }
}

/// Records that point at a bento.
pub trait BentoAssociated {
    fn bento_id(&self) -> Id;
}

impl BentoAssociated for BentoModelRel {
    fn bento_id(&self) -> Id {
        self.bento_id
    }
}

impl BentoAssociated for DeploymentTarget {
    fn bento_id(&self) -> Id {
        self.bento_id
    }
}

/// Records that point at a cluster.
pub trait ClusterAssociated {
    fn cluster_id(&self) -> Id;
}

impl ClusterAssociated for Deployment {
    fn cluster_id(&self) -> Id {
        self.cluster_id
    }
}

/// Records that point at a bento repository.
pub trait BentoRepositoryAssociated {
    fn bento_repository_id(&self) -> Id;
}

impl BentoRepositoryAssociated for Bento {
    fn bento_repository_id(&self) -> Id {
        self.bento_repository_id
    }
}

/// Records that point at a deployment.
pub trait DeploymentAssociated {
    fn deployment_id(&self) -> Id;
}

impl DeploymentAssociated for DeploymentTarget {
    fn deployment_id(&self) -> Id {
        self.deployment_id
    }
}

/// Records that can carry labels.
pub trait Labelable {
    fn resource_type(&self) -> ResourceType;
    fn resource_id(&self) -> Id;
}

impl Labelable for Model {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Model
    }
    fn resource_id(&self) -> Id {
        self.id
    }
}

impl Labelable for ModelRepository {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ModelRepository
    }
    fn resource_id(&self) -> Id {
        self.id
    }
}

impl Labelable for Bento {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Bento
    }
    fn resource_id(&self) -> Id {
        self.id
    }
}

impl Labelable for BentoRepository {
    fn resource_type(&self) -> ResourceType {
        ResourceType::BentoRepository
    }
    fn resource_id(&self) -> Id {
        self.id
    }
}

impl Labelable for Deployment {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Deployment
    }
    fn resource_id(&self) -> Id {
        self.id
    }
}
