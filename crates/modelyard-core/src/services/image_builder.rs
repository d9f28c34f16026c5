use std::collections::BTreeMap;

use crate::control_plane::ControlPlane;
use crate::error::{Context, Result};
use crate::kubernetes::{label_selector, KubePodWithStatus};
use crate::records::Cluster;

/// Pod label naming the model repository an image is built for.
pub const KUBE_LABEL_MODEL_REPOSITORY: &str = "modelyard.io/model-repository";

/// Pod label naming the model version an image is built for.
pub const KUBE_LABEL_MODEL: &str = "modelyard.io/model";

/// Image builder pods in `cluster` carrying all of `labels`.
pub async fn list_image_builder_pods(
    cp: &ControlPlane,
    cluster: &Cluster,
    labels: &BTreeMap<String, String>,
) -> Result<Vec<KubePodWithStatus>> {
    let selector = label_selector(labels);
    let pods = cp
        .kube
        .list_pods(cluster, &cp.image_builder_namespace, &selector)
        .await
        .with_context(|| format!("failed to list image builder pods in cluster {}", cluster.name))?;
    tracing::debug!(cluster = %cluster.name, %selector, count = pods.len(), "listed image builder pods");
    Ok(pods)
}
