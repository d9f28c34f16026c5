//! Kubernetes access.
//!
//! Reconciliation talks to clusters through the [`ClusterConnector`] and
//! [`BentoDeploymentClient`] traits. [`KubeConnector`] is the real
//! implementation built on `kube::Client`; tests substitute an in-process
//! fake.

mod crd;
mod pods;

pub use crd::{
    deployment_status_of, BentoDeployment, BentoDeploymentCondition, BentoDeploymentIngressSpec,
    BentoDeploymentRunnerSpec, BentoDeploymentSpec, BentoDeploymentStatus,
};
pub use pods::{label_selector, KubePodWithStatus};

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};

use crate::error::{Error, Result};
use crate::records::Cluster;

/// Namespaced access to BentoDeployment resources.
#[async_trait]
pub trait BentoDeploymentClient: Send + Sync {
    /// Fetch a resource, or `None` when it does not exist.
    async fn get(&self, name: &str) -> Result<Option<BentoDeployment>>;

    async fn create(&self, resource: &BentoDeployment) -> Result<BentoDeployment>;

    /// Replace a resource. `resource` must carry the current resourceVersion.
    async fn update(&self, resource: &BentoDeployment) -> Result<BentoDeployment>;
}

/// Builds clients for a registered cluster.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn bento_deployments(
        &self,
        cluster: &Cluster,
        namespace: &str,
    ) -> Result<Arc<dyn BentoDeploymentClient>>;

    /// List pods in `namespace` matching a label selector.
    async fn list_pods(
        &self,
        cluster: &Cluster,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<KubePodWithStatus>>;
}

/// Connects using the cluster's stored kubeconfig, falling back to the
/// ambient configuration (in-cluster service account or local kubeconfig).
#[derive(Debug, Default, Clone)]
pub struct KubeConnector;

impl KubeConnector {
    pub fn new() -> Self {
        Self
    }

    async fn client(&self, cluster: &Cluster) -> Result<Client> {
        match cluster.kube_config.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(yaml) => {
                let kubeconfig = Kubeconfig::from_yaml(yaml).map_err(|e| {
                    Error::Config(format!("invalid kubeconfig for cluster {}: {}", cluster.name, e))
                })?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| {
                            Error::Config(format!(
                                "invalid kubeconfig for cluster {}: {}",
                                cluster.name, e
                            ))
                        })?;
                Ok(Client::try_from(config)?)
            }
            None => Ok(Client::try_default().await?),
        }
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn bento_deployments(
        &self,
        cluster: &Cluster,
        namespace: &str,
    ) -> Result<Arc<dyn BentoDeploymentClient>> {
        let client = self.client(cluster).await?;
        Ok(Arc::new(KubeBentoDeploymentClient {
            api: Api::namespaced(client, namespace),
        }))
    }

    async fn list_pods(
        &self,
        cluster: &Cluster,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<KubePodWithStatus>> {
        let client = self.client(cluster).await?;
        let api: Api<Pod> = Api::namespaced(client, namespace);
        let pods = api.list(&ListParams::default().labels(selector)).await?;
        Ok(pods.items.iter().map(KubePodWithStatus::from_pod).collect())
    }
}

struct KubeBentoDeploymentClient {
    api: Api<BentoDeployment>,
}

#[async_trait]
impl BentoDeploymentClient for KubeBentoDeploymentClient {
    async fn get(&self, name: &str) -> Result<Option<BentoDeployment>> {
        match self.api.get(name).await {
            Ok(resource) => Ok(Some(resource)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, resource: &BentoDeployment) -> Result<BentoDeployment> {
        Ok(self.api.create(&PostParams::default(), resource).await?)
    }

    async fn update(&self, resource: &BentoDeployment) -> Result<BentoDeployment> {
        let name = resource
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::InvalidArgument("bento deployment has no name".into()))?;
        Ok(self.api.replace(name, &PostParams::default(), resource).await?)
    }
}
