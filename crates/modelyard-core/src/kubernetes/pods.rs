use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

/// A pod summary as shown to API clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubePodWithStatus {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub node_name: Option<String>,
    pub ready: bool,
    pub status_message: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl KubePodWithStatus {
    pub fn from_pod(pod: &Pod) -> Self {
        let spec = pod.spec.as_ref();
        let status = pod.status.as_ref();

        let ready = status
            .and_then(|s| s.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false);

        // Prefer the pod-level message, then the first waiting container reason.
        let status_message = status.and_then(|s| s.message.clone()).or_else(|| {
            status
                .and_then(|s| s.container_statuses.as_ref())
                .and_then(|containers| {
                    containers.iter().find_map(|c| {
                        c.state
                            .as_ref()
                            .and_then(|state| state.waiting.as_ref())
                            .and_then(|waiting| waiting.reason.clone())
                    })
                })
        });

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            phase: status
                .and_then(|s| s.phase.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            node_name: spec.and_then(|s| s.node_name.clone()),
            ready,
            status_message,
            labels: pod.metadata.labels.clone().unwrap_or_default(),
        }
    }
}

/// Render labels as an equality-based selector, `k1=v1,k2=v2`.
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
