//! Shared value types: statuses, labels, tags, manifests, and deployment
//! target configuration.
//!
//! These are stored in the database (as TEXT or JSON columns), sent over the
//! HTTP API, and embedded in the `BentoDeployment` custom resource, so they
//! derive serde, sqlx, and schemars traits as needed.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "deserialize_nullable")]` on
/// an `Option<Option<T>>`: a missing field stays `None`, an explicit `null`
/// becomes `Some(None)`.
pub fn deserialize_nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Image build state of a model or bento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ImageBuildStatus {
    Pending,
    Building,
    Success,
    Failed,
}

/// Artifact upload state of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ModelUploadStatus {
    Pending,
    Uploading,
    Success,
    Failed,
}

/// Observed state of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum DeploymentStatus {
    Unknown,
    NonDeployed,
    Deploying,
    Running,
    Unhealthy,
    Failed,
    Terminating,
    Terminated,
}

/// Resource kinds that can carry labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ResourceType {
    Model,
    ModelRepository,
    Bento,
    BentoRepository,
    Deployment,
}

impl ResourceType {
    /// The stored representation, matching the sqlx/serde encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Model => "model",
            ResourceType::ModelRepository => "model_repository",
            ResourceType::Bento => "bento",
            ResourceType::BentoRepository => "bento_repository",
            ResourceType::Deployment => "deployment",
        }
    }
}

/// A `<repository>:<version>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Build a tag from a repository name and version.
    pub fn new(repository: &str, version: &str) -> Self {
        Tag(format!("{}:{}", repository, version))
    }

    /// The tag string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

/// A single key/value label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabelItem {
    pub key: String,
    pub value: String,
}

impl LabelItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Manifest recorded when a model is pushed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub bentoml_version: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

/// Manifest recorded when a bento is pushed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BentoManifest {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub bentoml_version: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub models: Vec<String>,
}

/// CPU/memory/GPU quantities in Kubernetes notation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<String>,
}

/// Resource requests and limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Resources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceItem>,
}

/// Horizontal autoscaling settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HpaConf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qps: Option<i64>,
}

/// Per-runner overrides inside a deployment target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub resources: Option<Resources>,
    #[serde(default)]
    pub hpa_conf: Option<HpaConf>,
    #[serde(default)]
    pub envs: Option<Vec<LabelItem>>,
}

/// Desired state for running a bento.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTargetConfig {
    /// Resource version of the custom resource last written for this target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_resource_version: Option<String>,
    #[serde(default)]
    pub resources: Option<Resources>,
    #[serde(default)]
    pub hpa_conf: Option<HpaConf>,
    #[serde(default)]
    pub envs: Option<Vec<LabelItem>>,
    #[serde(default)]
    pub runners: Option<BTreeMap<String, RunnerConfig>>,
    #[serde(default)]
    pub enable_ingress: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_format() {
        let tag = Tag::new("iris_classifier", "v1.2");
        assert_eq!(tag.as_str(), "iris_classifier:v1.2");
        assert_eq!(tag.to_string(), "iris_classifier:v1.2");
    }

    #[test]
    fn test_deployment_status_wire_format() {
        let json = serde_json::to_string(&DeploymentStatus::NonDeployed).unwrap();
        assert_eq!(json, "\"non-deployed\"");
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_nullable")]
        at: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.at, None);
        let null: Patch = serde_json::from_str(r#"{"at": null}"#).unwrap();
        assert_eq!(null.at, Some(None));
        let set: Patch = serde_json::from_str(r#"{"at": "x"}"#).unwrap();
        assert_eq!(set.at, Some(Some("x".to_string())));
    }

    #[test]
    fn test_target_config_tolerates_missing_fields() {
        let config: DeploymentTargetConfig =
            serde_json::from_str(r#"{"enable_ingress": true}"#).unwrap();
        assert_eq!(config.enable_ingress, Some(true));
        assert!(config.runners.is_none());
        assert!(config.kube_resource_version.is_none());
    }
}
