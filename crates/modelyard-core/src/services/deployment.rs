use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{cluster, validate_name};
use crate::control_plane::ControlPlane;
use crate::db::{push_label_filters, LabelFilter, ListOptions};
use crate::error::{Context, Error, Result};
use crate::kubernetes::{deployment_status_of, BentoDeploymentClient};
use crate::records::{new_uid, Cluster, Deployment, DeploymentAssociated, Id};
use crate::schemas::{DeploymentStatus, ResourceType};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeploymentOption {
    #[serde(skip)]
    pub creator_id: Id,
    #[serde(skip)]
    pub cluster_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to the cluster's namespace.
    #[serde(default)]
    pub kube_namespace: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateDeploymentStatusOption {
    pub status: Option<DeploymentStatus>,
    pub status_syncing_at: Option<Option<DateTime<Utc>>>,
    pub status_updated_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default)]
pub struct ListDeploymentOption {
    pub base: ListOptions,
    pub cluster_id: Option<Id>,
    pub status: Option<DeploymentStatus>,
    pub label_filters: Vec<LabelFilter>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    cluster: &Cluster,
    opt: CreateDeploymentOption,
) -> Result<Deployment> {
    validate_name("deployment", &opt.name)?;
    let namespace = opt
        .kube_namespace
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| cluster.default_namespace.clone());
    let now = Utc::now();
    let deployment = sqlx::query_as::<_, Deployment>(
        "INSERT INTO deployment (uid, cluster_id, creator_id, name, description, kube_namespace,
                                 status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new_uid())
    .bind(cluster.id)
    .bind(opt.creator_id)
    .bind(&opt.name)
    .bind(&opt.description)
    .bind(&namespace)
    .bind(DeploymentStatus::NonDeployed)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to create deployment {}", opt.name))?;

    tracing::info!(cluster = %cluster.name, deployment = %deployment.name, "deployment created");
    Ok(deployment)
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Deployment> {
    sqlx::query_as::<_, Deployment>("SELECT * FROM deployment WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("deployment {}", id)))
}

pub async fn get_by_name(
    conn: &mut SqliteConnection,
    cluster_id: Id,
    name: &str,
) -> Result<Deployment> {
    sqlx::query_as::<_, Deployment>("SELECT * FROM deployment WHERE cluster_id = ? AND name = ?")
        .bind(cluster_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("deployment {}", name)))
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, opt: &ListDeploymentOption) {
    if let Some(cluster_id) = opt.cluster_id {
        qb.push(" AND deployment.cluster_id = ");
        qb.push_bind(cluster_id);
    }
    if let Some(status) = opt.status {
        qb.push(" AND deployment.status = ");
        qb.push_bind(status);
    }
    opt.base.push_keyword(qb, "deployment.name");
    push_label_filters(qb, "deployment", ResourceType::Deployment, &opt.label_filters);
}

pub async fn list(
    conn: &mut SqliteConnection,
    opt: &ListDeploymentOption,
) -> Result<(Vec<Deployment>, i64)> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM deployment WHERE 1 = 1");
    push_filters(&mut count, opt);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut qb = QueryBuilder::new("SELECT * FROM deployment WHERE 1 = 1");
    push_filters(&mut qb, opt);
    qb.push(" ORDER BY deployment.id DESC");
    opt.base.push_limit(&mut qb);
    let items = qb.build_query_as::<Deployment>().fetch_all(&mut *conn).await?;
    Ok((items, total))
}

/// Write the provided status fields; `deployment` reflects them on success.
pub async fn update_status(
    conn: &mut SqliteConnection,
    deployment: &mut Deployment,
    opt: UpdateDeploymentStatusOption,
) -> Result<()> {
    let now = Utc::now();
    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE deployment SET updated_at = ");
    qb.push_bind(now);
    if let Some(status) = opt.status {
        qb.push(", status = ");
        qb.push_bind(status);
    }
    if let Some(at) = opt.status_syncing_at {
        qb.push(", status_syncing_at = ");
        qb.push_bind(at);
    }
    if let Some(at) = opt.status_updated_at {
        qb.push(", status_updated_at = ");
        qb.push_bind(at);
    }
    qb.push(" WHERE id = ");
    qb.push_bind(deployment.id);
    qb.build()
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to update status of deployment {}", deployment.name))?;

    deployment.updated_at = now;
    if let Some(status) = opt.status {
        deployment.status = status;
    }
    if let Some(at) = opt.status_syncing_at {
        deployment.status_syncing_at = at;
    }
    if let Some(at) = opt.status_updated_at {
        deployment.status_updated_at = at;
    }
    Ok(())
}

/// Namespace the deployment's resources live in.
pub fn kube_namespace(deployment: &Deployment) -> &str {
    &deployment.kube_namespace
}

/// Client for BentoDeployment resources in the deployment's cluster and
/// namespace.
pub async fn bento_deployment_client(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    deployment: &Deployment,
) -> Result<Arc<dyn BentoDeploymentClient>> {
    let cluster = cluster::get_associated_cluster(conn, deployment).await?;
    cp.kube
        .bento_deployments(&cluster, kube_namespace(deployment))
        .await
        .context("failed to get kube bento deployment client")
}

/// Read the live resource and record the status it reports.
pub async fn sync_status(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    deployment: &mut Deployment,
) -> Result<DeploymentStatus> {
    update_status(
        conn,
        deployment,
        UpdateDeploymentStatusOption {
            status_syncing_at: Some(Some(Utc::now())),
            ..Default::default()
        },
    )
    .await?;

    let client = bento_deployment_client(cp, conn, deployment).await?;
    let resource = client
        .get(&deployment.name)
        .await
        .context("failed to get kube bento deployment")?;
    let status = deployment_status_of(resource.as_ref());

    update_status(
        conn,
        deployment,
        UpdateDeploymentStatusOption {
            status: Some(status),
            status_updated_at: Some(Some(Utc::now())),
            ..Default::default()
        },
    )
    .await?;
    tracing::debug!(deployment = %deployment.name, ?status, "deployment status synced");
    Ok(status)
}

pub async fn get_associated_deployment<T: DeploymentAssociated>(
    conn: &mut SqliteConnection,
    associate: &T,
) -> Result<Deployment> {
    get(conn, associate.deployment_id())
        .await
        .context("failed to get associated deployment")
}
