//! Reconcile deployment targets into BentoDeployment resources.

use std::time::Duration;

use kube::api::ObjectMeta;
use sqlx::SqliteConnection;
use tokio::task::JoinHandle;

use super::{bento, deployment};
use crate::control_plane::ControlPlane;
use crate::error::{Context, Result};
use crate::kubernetes::{
    BentoDeployment, BentoDeploymentIngressSpec, BentoDeploymentRunnerSpec, BentoDeploymentSpec,
};
use crate::records::{Deployment, DeploymentTarget};
use crate::schemas::{DeploymentStatus, DeploymentTargetConfig, Tag};
use crate::services::deployment::UpdateDeploymentStatusOption;

/// Default upper bound on the status refresh that follows a deploy.
pub const SYNC_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of [`deploy`].
///
/// A write leaves a status refresh pending. Start it with
/// [`Deployed::spawn_status_sync`] after the caller's transaction commits;
/// the refresh runs on its own pooled connection and must see the committed
/// target.
#[derive(Debug)]
#[must_use = "the status refresh only runs once spawned"]
pub struct Deployed {
    /// The live resource after the deploy.
    pub resource: BentoDeployment,
    pending_sync: Option<Deployment>,
}

impl Deployed {
    /// Whether the deploy wrote to the cluster.
    pub fn changed(&self) -> bool {
        self.pending_sync.is_some()
    }

    /// Refresh the deployment's status in the background, bounded by
    /// [`ControlPlane::status_sync_timeout`]. `None` when nothing was written.
    pub fn spawn_status_sync(self, cp: &ControlPlane) -> Option<JoinHandle<()>> {
        self.pending_sync
            .map(|deployment| spawn_sync_status(cp.clone(), deployment))
    }
}

/// Desired BentoDeployment for a deployment running `tag` with `config`.
///
/// Runners follow the config map's key order. Ingress is enabled only when
/// the config explicitly asks for it.
pub fn build_bento_deployment(
    deployment: &Deployment,
    tag: &Tag,
    config: Option<&DeploymentTargetConfig>,
) -> BentoDeployment {
    let runners = config
        .and_then(|c| c.runners.as_ref())
        .map(|runners| {
            runners
                .iter()
                .map(|(name, runner)| BentoDeploymentRunnerSpec {
                    name: name.clone(),
                    resources: runner.resources.clone(),
                    autoscaling: runner.hpa_conf.clone(),
                    envs: runner.envs.clone().unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    let spec = BentoDeploymentSpec {
        bento_tag: tag.to_string(),
        autoscaling: config.and_then(|c| c.hpa_conf.clone()),
        envs: config.and_then(|c| c.envs.clone()).unwrap_or_default(),
        resources: config.and_then(|c| c.resources.clone()),
        runners,
        ingress: BentoDeploymentIngressSpec {
            enabled: config.and_then(|c| c.enable_ingress) == Some(true),
        },
    };

    BentoDeployment {
        metadata: ObjectMeta {
            name: Some(deployment.name.clone()),
            namespace: Some(deployment::kube_namespace(deployment).to_string()),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

/// Create or update the BentoDeployment for `target`.
///
/// When the target recorded a resource version and the live resource still
/// carries it, nothing is written and the live resource is returned. After a
/// write the deployment is marked `deploying` and a status refresh is left
/// pending on the returned [`Deployed`].
pub async fn deploy(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    target: &DeploymentTarget,
) -> Result<Deployed> {
    let mut deployment = deployment::get_associated_deployment(conn, target)
        .await
        .context("failed to get associated deployment")?;
    let client = deployment::bento_deployment_client(cp, conn, &deployment)
        .await
        .context("failed to get kube bento deployment cli")?;

    let recorded_version = target
        .config()
        .and_then(|c| c.kube_resource_version.as_deref())
        .filter(|v| !v.is_empty());
    if let Some(recorded_version) = recorded_version {
        let current = client
            .get(&deployment.name)
            .await
            .context("failed to get kube bento deployment")?;
        if let Some(current) = current {
            if current.metadata.resource_version.as_deref() == Some(recorded_version) {
                tracing::debug!(deployment = %deployment.name, "bento deployment unchanged");
                return Ok(Deployed {
                    resource: current,
                    pending_sync: None,
                });
            }
        }
    }

    let bento = bento::get_associated_bento(conn, target)
        .await
        .context("failed to get associated bento")?;
    let tag = bento::tag(conn, &bento)
        .await
        .context("failed to get bento tag")?;

    let mut desired = build_bento_deployment(&deployment, &tag, target.config());
    let name = deployment.name.clone();

    let existing = client
        .get(&name)
        .await
        .context("failed to get kube bento deployment")?;
    let applied = match existing {
        None => client
            .create(&desired)
            .await
            .with_context(|| format!("failed to create kube bento deployment {}", name))?,
        Some(existing) => {
            desired.metadata.resource_version = existing.metadata.resource_version;
            client
                .update(&desired)
                .await
                .with_context(|| format!("failed to update kube bento deployment {}", name))?
        }
    };
    tracing::info!(
        deployment = %name,
        namespace = %deployment.kube_namespace,
        bento = %tag,
        "bento deployment applied"
    );

    if let Err(err) = deployment::update_status(
        conn,
        &mut deployment,
        UpdateDeploymentStatusOption {
            status: Some(DeploymentStatus::Deploying),
            ..Default::default()
        },
    )
    .await
    {
        tracing::warn!(deployment = %name, error = %err, "failed to mark deployment deploying");
    }

    Ok(Deployed {
        resource: applied,
        pending_sync: Some(deployment),
    })
}

fn spawn_sync_status(cp: ControlPlane, mut deployment: Deployment) -> JoinHandle<()> {
    tokio::spawn(async move {
        let sync = async {
            let mut conn = cp.pool.acquire().await?;
            deployment::sync_status(&cp, &mut *conn, &mut deployment).await
        };
        match tokio::time::timeout(cp.status_sync_timeout, sync).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::warn!(deployment = %deployment.name, error = %err, "status sync failed")
            }
            Err(_) => tracing::debug!(deployment = %deployment.name, "status sync timed out"),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::schemas::{HpaConf, LabelItem, ResourceItem, Resources, RunnerConfig};

    fn deployment() -> Deployment {
        Deployment {
            id: 1,
            uid: "d1".to_string(),
            cluster_id: 1,
            creator_id: 1,
            name: "iris-prod".to_string(),
            description: String::new(),
            kube_namespace: "serving".to_string(),
            status: DeploymentStatus::NonDeployed,
            status_syncing_at: None,
            status_updated_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_without_config() {
        let resource = build_bento_deployment(&deployment(), &Tag::new("iris", "v1"), None);
        assert_eq!(resource.metadata.name.as_deref(), Some("iris-prod"));
        assert_eq!(resource.metadata.namespace.as_deref(), Some("serving"));
        assert_eq!(resource.spec.bento_tag, "iris:v1");
        assert!(resource.spec.envs.is_empty());
        assert!(resource.spec.runners.is_empty());
        assert!(resource.spec.autoscaling.is_none());
        assert!(!resource.spec.ingress.enabled);
    }

    #[test]
    fn test_build_maps_target_config() {
        let mut runners = BTreeMap::new();
        runners.insert(
            "tokenizer".to_string(),
            RunnerConfig {
                hpa_conf: Some(HpaConf {
                    max_replicas: Some(3),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        runners.insert(
            "classifier".to_string(),
            RunnerConfig {
                envs: Some(vec![LabelItem::new("THREADS", "4")]),
                ..Default::default()
            },
        );
        let config = DeploymentTargetConfig {
            resources: Some(Resources {
                requests: Some(ResourceItem {
                    cpu: Some("500m".to_string()),
                    ..Default::default()
                }),
                limits: None,
            }),
            hpa_conf: Some(HpaConf {
                min_replicas: Some(1),
                max_replicas: Some(5),
                ..Default::default()
            }),
            envs: Some(vec![LabelItem::new("LOG_LEVEL", "debug")]),
            runners: Some(runners),
            enable_ingress: Some(true),
            ..Default::default()
        };

        let spec = build_bento_deployment(&deployment(), &Tag::new("iris", "v2"), Some(&config)).spec;
        assert_eq!(spec.autoscaling.unwrap().max_replicas, Some(5));
        assert_eq!(spec.envs, vec![LabelItem::new("LOG_LEVEL", "debug")]);
        assert_eq!(
            spec.resources.unwrap().requests.unwrap().cpu.as_deref(),
            Some("500m")
        );
        assert!(spec.ingress.enabled);

        let names: Vec<_> = spec.runners.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["classifier", "tokenizer"]);
        assert_eq!(spec.runners[0].envs, vec![LabelItem::new("THREADS", "4")]);
        assert!(spec.runners[1].envs.is_empty());
        assert_eq!(spec.runners[1].autoscaling.as_ref().unwrap().max_replicas, Some(3));
    }

    #[test]
    fn test_ingress_requires_explicit_true() {
        let config = DeploymentTargetConfig {
            enable_ingress: Some(false),
            ..Default::default()
        };
        let spec = build_bento_deployment(&deployment(), &Tag::new("iris", "v1"), Some(&config)).spec;
        assert!(!spec.ingress.enabled);
    }
}
