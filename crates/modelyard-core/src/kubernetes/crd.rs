//! BentoDeployment Custom Resource Definition
//!
//! A BentoDeployment asks the in-cluster serving operator to run one bento
//! with the given resources, autoscaling, environment, and runners.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schemas::{DeploymentStatus, HpaConf, LabelItem, Resources};

/// Desired state of a served bento.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "serving.modelyard.io",
    version = "v1alpha2",
    kind = "BentoDeployment",
    plural = "bentodeployments",
    shortname = "bd",
    namespaced,
    status = "BentoDeploymentStatus",
    printcolumn = r#"{"name":"Bento","type":"string","jsonPath":".spec.bentoTag"}"#,
    printcolumn = r#"{"name":"Available","type":"integer","jsonPath":".status.availableReplicas"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BentoDeploymentSpec {
    /// `<repository>:<version>` of the bento to serve.
    pub bento_tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<HpaConf>,

    #[serde(default)]
    pub envs: Vec<LabelItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runners: Vec<BentoDeploymentRunnerSpec>,

    #[serde(default)]
    pub ingress: BentoDeploymentIngressSpec,
}

/// Overrides for one named runner.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BentoDeploymentRunnerSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<HpaConf>,

    #[serde(default)]
    pub envs: Vec<LabelItem>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct BentoDeploymentIngressSpec {
    #[serde(default)]
    pub enabled: bool,
}

/// Status reported by the serving operator.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BentoDeploymentStatus {
    #[serde(default)]
    pub replicas: i32,

    #[serde(default)]
    pub available_replicas: i32,

    #[serde(default)]
    pub conditions: Vec<BentoDeploymentCondition>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BentoDeploymentCondition {
    /// Condition type, e.g. `Available` or `Failed`.
    #[serde(rename = "type")]
    pub type_: String,
    /// `True`, `False`, or `Unknown`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BentoDeploymentStatus {
    fn condition_is_true(&self, type_: &str) -> bool {
        self.conditions
            .iter()
            .any(|c| c.type_ == type_ && c.status.eq_ignore_ascii_case("true"))
    }
}

/// Map a live resource (or its absence) to a deployment status.
pub fn deployment_status_of(resource: Option<&BentoDeployment>) -> DeploymentStatus {
    let Some(resource) = resource else {
        return DeploymentStatus::NonDeployed;
    };
    if resource.metadata.deletion_timestamp.is_some() {
        return DeploymentStatus::Terminating;
    }
    let Some(status) = resource.status.as_ref() else {
        return DeploymentStatus::Deploying;
    };

    if status.condition_is_true("Failed") {
        DeploymentStatus::Failed
    } else if status.condition_is_true("Available") {
        if status.available_replicas < status.replicas {
            DeploymentStatus::Unhealthy
        } else {
            DeploymentStatus::Running
        }
    } else {
        DeploymentStatus::Deploying
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_status(status: Option<BentoDeploymentStatus>) -> BentoDeployment {
        let mut resource = BentoDeployment::new("iris", BentoDeploymentSpec::default());
        resource.status = status;
        resource
    }

    fn condition(type_: &str, status: &str) -> BentoDeploymentCondition {
        BentoDeploymentCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            message: None,
        }
    }

    #[test]
    fn test_spec_serializes_camel_case() {
        let spec = BentoDeploymentSpec {
            bento_tag: "iris:v1".to_string(),
            ingress: BentoDeploymentIngressSpec { enabled: true },
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["bentoTag"], "iris:v1");
        assert_eq!(json["envs"], serde_json::json!([]));
        assert_eq!(json["ingress"]["enabled"], true);
        assert!(json.get("runners").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(deployment_status_of(None), DeploymentStatus::NonDeployed);
        assert_eq!(
            deployment_status_of(Some(&with_status(None))),
            DeploymentStatus::Deploying
        );

        let running = BentoDeploymentStatus {
            replicas: 2,
            available_replicas: 2,
            conditions: vec![condition("Available", "True")],
        };
        assert_eq!(
            deployment_status_of(Some(&with_status(Some(running.clone())))),
            DeploymentStatus::Running
        );

        let degraded = BentoDeploymentStatus {
            available_replicas: 1,
            ..running
        };
        assert_eq!(
            deployment_status_of(Some(&with_status(Some(degraded)))),
            DeploymentStatus::Unhealthy
        );

        let failed = BentoDeploymentStatus {
            conditions: vec![condition("Failed", "True")],
            ..Default::default()
        };
        assert_eq!(
            deployment_status_of(Some(&with_status(Some(failed)))),
            DeploymentStatus::Failed
        );
    }
}
