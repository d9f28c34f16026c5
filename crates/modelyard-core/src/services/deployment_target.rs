use chrono::Utc;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::SqliteConnection;

use crate::error::{Context, Error, Result};
use crate::records::{new_uid, DeploymentTarget, Id};
use crate::schemas::DeploymentTargetConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeploymentTargetOption {
    #[serde(skip)]
    pub creator_id: Id,
    #[serde(skip)]
    pub deployment_id: Id,
    #[serde(skip)]
    pub bento_id: Id,
    #[serde(default)]
    pub config: Option<DeploymentTargetConfig>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    opt: CreateDeploymentTargetOption,
) -> Result<DeploymentTarget> {
    let now = Utc::now();
    sqlx::query_as::<_, DeploymentTarget>(
        "INSERT INTO deployment_target (uid, deployment_id, bento_id, creator_id, config, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new_uid())
    .bind(opt.deployment_id)
    .bind(opt.bento_id)
    .bind(opt.creator_id)
    .bind(opt.config.map(Json))
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .context("failed to create deployment target")
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<DeploymentTarget> {
    sqlx::query_as::<_, DeploymentTarget>("SELECT * FROM deployment_target WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("deployment target {}", id)))
}

/// Targets of a deployment, newest first.
pub async fn list_by_deployment(
    conn: &mut SqliteConnection,
    deployment_id: Id,
) -> Result<Vec<DeploymentTarget>> {
    Ok(sqlx::query_as::<_, DeploymentTarget>(
        "SELECT * FROM deployment_target WHERE deployment_id = ? ORDER BY id DESC",
    )
    .bind(deployment_id)
    .fetch_all(&mut *conn)
    .await?)
}

/// Remember the resource version written for `target`, so an unchanged
/// redeploy can be skipped.
pub async fn record_kube_resource_version(
    conn: &mut SqliteConnection,
    target: &mut DeploymentTarget,
    resource_version: Option<String>,
) -> Result<()> {
    let mut config = target.config().cloned().unwrap_or_default();
    config.kube_resource_version = resource_version;
    let config = Json(config);
    let now = Utc::now();
    sqlx::query("UPDATE deployment_target SET config = ?, updated_at = ? WHERE id = ?")
        .bind(&config)
        .bind(now)
        .bind(target.id)
        .execute(&mut *conn)
        .await?;
    target.config = Some(config);
    target.updated_at = now;
    Ok(())
}
