use chrono::Utc;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{QueryBuilder, SqliteConnection};

use super::{cluster, validate_name};
use crate::config::S3Config;
use crate::control_plane::ControlPlane;
use crate::db::ListOptions;
use crate::error::{Context, Error, Result};
use crate::records::{new_uid, Cluster, Id, Organization, OrganizationAssociated, OrganizationConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganizationOption {
    #[serde(skip)]
    pub creator_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Option<OrganizationConfig>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    opt: CreateOrganizationOption,
) -> Result<Organization> {
    validate_name("organization", &opt.name)?;
    let now = Utc::now();
    let org = sqlx::query_as::<_, Organization>(
        "INSERT INTO organization (uid, name, description, creator_id, config, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new_uid())
    .bind(&opt.name)
    .bind(&opt.description)
    .bind(opt.creator_id)
    .bind(opt.config.map(Json))
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to create organization {}", opt.name))?;

    tracing::info!(organization = %org.name, "organization created");
    Ok(org)
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Organization> {
    sqlx::query_as::<_, Organization>("SELECT * FROM organization WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("organization {}", id)))
}

pub async fn get_by_uid(conn: &mut SqliteConnection, uid: &str) -> Result<Organization> {
    sqlx::query_as::<_, Organization>("SELECT * FROM organization WHERE uid = ?")
        .bind(uid)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("organization {}", uid)))
}

pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Organization> {
    sqlx::query_as::<_, Organization>("SELECT * FROM organization WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("organization {}", name)))
}

pub async fn list(
    conn: &mut SqliteConnection,
    opt: &ListOptions,
) -> Result<(Vec<Organization>, i64)> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM organization WHERE 1 = 1");
    opt.push_keyword(&mut count, "organization.name");
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut qb = QueryBuilder::new("SELECT * FROM organization WHERE 1 = 1");
    opt.push_keyword(&mut qb, "organization.name");
    qb.push(" ORDER BY organization.id DESC");
    opt.push_limit(&mut qb);
    let items = qb.build_query_as::<Organization>().fetch_all(&mut *conn).await?;
    Ok((items, total))
}

/// Replace the organization's config.
pub async fn update_config(
    conn: &mut SqliteConnection,
    org: &mut Organization,
    config: OrganizationConfig,
) -> Result<()> {
    let config = Json(config);
    let now = Utc::now();
    sqlx::query("UPDATE organization SET config = ?, updated_at = ? WHERE id = ?")
        .bind(&config)
        .bind(now)
        .bind(org.id)
        .execute(&mut *conn)
        .await?;
    org.config = Some(config);
    org.updated_at = now;
    Ok(())
}

pub async fn get_associated_organization<T: OrganizationAssociated>(
    conn: &mut SqliteConnection,
    associate: &T,
) -> Result<Organization> {
    get(conn, associate.organization_id())
        .await
        .context("failed to get associated organization")
}

/// Object storage settings for the organization: its own override, or the
/// server default.
pub fn s3_config(cp: &ControlPlane, org: &Organization) -> S3Config {
    org.config
        .as_ref()
        .and_then(|c| c.0.s3.clone())
        .unwrap_or_else(|| cp.s3.clone())
}

/// The cluster that hosts shared workloads such as image builders: the
/// configured major cluster, or else the first cluster registered.
pub async fn major_cluster(conn: &mut SqliteConnection, org: &Organization) -> Result<Cluster> {
    let configured = org
        .config
        .as_ref()
        .and_then(|c| c.0.major_cluster_name.clone())
        .filter(|name| !name.is_empty());
    if let Some(name) = configured {
        return cluster::get_by_name(conn, org.id, &name)
            .await
            .with_context(|| format!("failed to get major cluster {}", name));
    }

    sqlx::query_as::<_, Cluster>(
        "SELECT * FROM cluster WHERE organization_id = ? ORDER BY id ASC LIMIT 1",
    )
    .bind(org.id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::not_found(format!("major cluster of organization {}", org.name)))
}
