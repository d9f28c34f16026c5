//! JSON request and response types for the HTTP API.

use modelyard_core::db::ListOptions;
use modelyard_core::{
    ApiToken, Bento, BentoRepository, CompletedPart, Deployment, DeploymentTarget,
    DeploymentTargetConfig, LabelFilter, LabelItem, Model, ModelRepository, ModelUploadStatus,
    Result, Tag, User,
};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Whether the database answered.
    pub database_connected: bool,
}

/// One page of a list.
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub start: u32,
    pub count: u32,
    /// Matching rows before pagination.
    pub total: i64,
    pub items: Vec<T>,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(options: &ListOptions, total: i64, items: Vec<T>) -> Self {
        Self {
            start: options.start(),
            count: options.count(),
            total,
            items,
        }
    }
}

/// Query string shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub search: Option<String>,
    /// `"<column> [asc|desc]"`.
    #[serde(default)]
    pub order: Option<String>,
    /// Label selectors separated by `;`, e.g. `team=nlp;!deprecated`.
    #[serde(default)]
    pub labels: Option<String>,
}

impl ListQuery {
    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            start: self.start,
            count: self.count,
            search: self.search.clone().filter(|s| !s.is_empty()),
        }
    }

    pub fn label_filters(&self) -> Result<Vec<LabelFilter>> {
        match &self.labels {
            Some(labels) => LabelFilter::parse_all(labels),
            None => Ok(Vec::new()),
        }
    }
}

/// Query string of the organization-wide model list.
#[derive(Debug, Default, Deserialize)]
pub struct OrganizationModelsQuery {
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
    /// Comma separated repository names.
    #[serde(default)]
    pub repositories: Option<String>,
    /// Comma separated manifest modules.
    #[serde(default)]
    pub modules: Option<String>,
    /// Comma separated creator usernames.
    #[serde(default)]
    pub creators: Option<String>,
}

impl OrganizationModelsQuery {
    /// The pagination, search, order, and label part of the query.
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            start: self.start,
            count: self.count,
            search: self.search.clone(),
            order: self.order.clone(),
            labels: self.labels.clone(),
        }
    }
}

/// Split a comma separated query value, dropping empty entries.
pub fn split_csv(value: Option<&str>) -> Option<Vec<String>> {
    value.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

#[derive(Debug, Serialize)]
pub struct ModelRepositoryView {
    #[serde(flatten)]
    pub repository: ModelRepository,
    pub labels: Vec<LabelItem>,
    pub latest_model: Option<Model>,
}

#[derive(Debug, Serialize)]
pub struct ModelView {
    #[serde(flatten)]
    pub model: Model,
    pub repository: String,
    pub tag: Tag,
    pub labels: Vec<LabelItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presigned_upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presigned_download_url: Option<String>,
}

/// Body of `finish_upload`.
#[derive(Debug, Default, Deserialize)]
pub struct FinishUploadRequest {
    /// Final status; `success` when omitted.
    #[serde(default)]
    pub status: Option<ModelUploadStatus>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadIdResponse {
    pub upload_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PresignMultipartUploadRequest {
    pub upload_id: String,
    pub part_number: usize,
}

#[derive(Debug, Serialize)]
pub struct PresignedUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PartUploadResponse {
    pub etag: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteMultipartUploadRequest {
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Serialize)]
pub struct BentoRepositoryView {
    #[serde(flatten)]
    pub repository: BentoRepository,
    pub labels: Vec<LabelItem>,
}

#[derive(Debug, Serialize)]
pub struct BentoView {
    #[serde(flatten)]
    pub bento: Bento,
    pub tag: Tag,
    pub labels: Vec<LabelItem>,
    /// Uids of the packaged models.
    pub models: Vec<String>,
}

/// The bento a deployment should run and how.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentTargetRequest {
    pub bento_repository: String,
    /// Bento version.
    pub bento: String,
    #[serde(default)]
    pub config: Option<DeploymentTargetConfig>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kube_namespace: Option<String>,
    #[serde(default)]
    pub labels: Vec<LabelItem>,
    pub target: DeploymentTargetRequest,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeploymentRequest {
    pub target: DeploymentTargetRequest,
}

#[derive(Debug, Serialize)]
pub struct DeploymentView {
    #[serde(flatten)]
    pub deployment: Deployment,
    pub cluster: String,
    pub labels: Vec<LabelItem>,
    pub latest_target: Option<DeploymentTarget>,
}

#[derive(Debug, Serialize)]
pub struct ApiTokenView {
    #[serde(flatten)]
    pub api_token: ApiToken,
    pub is_expired: bool,
    /// Plaintext token, present only in the creation response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<ApiToken> for ApiTokenView {
    fn from(api_token: ApiToken) -> Self {
        Self {
            is_expired: api_token.is_expired(),
            api_token,
            token: None,
        }
    }
}

/// A newly registered user with their first API token.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUserView {
    #[serde(flatten)]
    pub user: User,
    /// Plaintext token; only ever returned here.
    pub api_token: String,
}
