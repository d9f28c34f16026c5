use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, SqliteConnection};

use super::validate_name;
use crate::db::ListOptions;
use crate::error::{Context, Error, Result};
use crate::records::{new_uid, Cluster, ClusterAssociated, Id};

/// Namespace used when a cluster does not name one.
pub const DEFAULT_NAMESPACE: &str = "modelyard";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClusterOption {
    #[serde(skip)]
    pub organization_id: Id,
    #[serde(skip)]
    pub creator_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kubeconfig YAML. Without one the server's ambient configuration is used.
    #[serde(default)]
    pub kube_config: Option<String>,
    #[serde(default)]
    pub default_namespace: Option<String>,
}

pub async fn create(conn: &mut SqliteConnection, opt: CreateClusterOption) -> Result<Cluster> {
    validate_name("cluster", &opt.name)?;
    let namespace = opt
        .default_namespace
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let now = Utc::now();
    let cluster = sqlx::query_as::<_, Cluster>(
        "INSERT INTO cluster (uid, organization_id, creator_id, name, description, kube_config,
                              default_namespace, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new_uid())
    .bind(opt.organization_id)
    .bind(opt.creator_id)
    .bind(&opt.name)
    .bind(&opt.description)
    .bind(&opt.kube_config)
    .bind(&namespace)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to create cluster {}", opt.name))?;

    tracing::info!(cluster = %cluster.name, namespace = %cluster.default_namespace, "cluster registered");
    Ok(cluster)
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Cluster> {
    sqlx::query_as::<_, Cluster>("SELECT * FROM cluster WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("cluster {}", id)))
}

pub async fn get_by_name(
    conn: &mut SqliteConnection,
    organization_id: Id,
    name: &str,
) -> Result<Cluster> {
    sqlx::query_as::<_, Cluster>("SELECT * FROM cluster WHERE organization_id = ? AND name = ?")
        .bind(organization_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("cluster {}", name)))
}

pub async fn list(
    conn: &mut SqliteConnection,
    organization_id: Id,
    opt: &ListOptions,
) -> Result<(Vec<Cluster>, i64)> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM cluster WHERE organization_id = ");
    count.push_bind(organization_id);
    opt.push_keyword(&mut count, "cluster.name");
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut qb = QueryBuilder::new("SELECT * FROM cluster WHERE organization_id = ");
    qb.push_bind(organization_id);
    opt.push_keyword(&mut qb, "cluster.name");
    qb.push(" ORDER BY cluster.id ASC");
    opt.push_limit(&mut qb);
    let items = qb.build_query_as::<Cluster>().fetch_all(&mut *conn).await?;
    Ok((items, total))
}

pub async fn get_associated_cluster<T: ClusterAssociated>(
    conn: &mut SqliteConnection,
    associate: &T,
) -> Result<Cluster> {
    get(conn, associate.cluster_id())
        .await
        .context("failed to get associated cluster")
}
