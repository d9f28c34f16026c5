use chrono::Utc;
use serde::Deserialize;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};

use super::{label, validate_name};
use crate::db::{push_label_filters, LabelFilter, ListOptions};
use crate::error::{Context, Error, Result};
use crate::records::{new_uid, Id, ModelRepository, ModelRepositoryAssociated};
use crate::schemas::{LabelItem, ResourceType};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateModelRepositoryOption {
    #[serde(skip)]
    pub creator_id: Id,
    #[serde(skip)]
    pub organization_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<LabelItem>,
}

#[derive(Debug, Clone, Default)]
pub struct ListModelRepositoryOption {
    pub base: ListOptions,
    pub organization_id: Option<Id>,
    pub creator_id: Option<Id>,
    pub label_filters: Vec<LabelFilter>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    opt: CreateModelRepositoryOption,
) -> Result<ModelRepository> {
    validate_name("model repository", &opt.name)?;
    let mut tx = conn.begin().await?;
    let now = Utc::now();
    let repository = sqlx::query_as::<_, ModelRepository>(
        "INSERT INTO model_repository (uid, organization_id, creator_id, name, description, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new_uid())
    .bind(opt.organization_id)
    .bind(opt.creator_id)
    .bind(&opt.name)
    .bind(&opt.description)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .with_context(|| format!("failed to create model repository {}", opt.name))?;

    label::create_or_update_labels(
        &mut *tx,
        &opt.labels,
        opt.creator_id,
        opt.organization_id,
        &repository,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(repository = %repository.name, "model repository created");
    Ok(repository)
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<ModelRepository> {
    sqlx::query_as::<_, ModelRepository>("SELECT * FROM model_repository WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("model repository {}", id)))
}

pub async fn get_by_uid(conn: &mut SqliteConnection, uid: &str) -> Result<ModelRepository> {
    sqlx::query_as::<_, ModelRepository>("SELECT * FROM model_repository WHERE uid = ?")
        .bind(uid)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("model repository {}", uid)))
}

pub async fn get_by_name(
    conn: &mut SqliteConnection,
    organization_id: Id,
    name: &str,
) -> Result<ModelRepository> {
    sqlx::query_as::<_, ModelRepository>(
        "SELECT * FROM model_repository WHERE organization_id = ? AND name = ?",
    )
    .bind(organization_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::not_found(format!("model repository {}", name)))
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, opt: &ListModelRepositoryOption) {
    if let Some(organization_id) = opt.organization_id {
        qb.push(" AND model_repository.organization_id = ");
        qb.push_bind(organization_id);
    }
    if let Some(creator_id) = opt.creator_id {
        qb.push(" AND model_repository.creator_id = ");
        qb.push_bind(creator_id);
    }
    opt.base.push_keyword(qb, "model_repository.name");
    push_label_filters(
        qb,
        "model_repository",
        ResourceType::ModelRepository,
        &opt.label_filters,
    );
}

pub async fn list(
    conn: &mut SqliteConnection,
    opt: &ListModelRepositoryOption,
) -> Result<(Vec<ModelRepository>, i64)> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM model_repository WHERE 1 = 1");
    push_filters(&mut count, opt);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut qb = QueryBuilder::new("SELECT * FROM model_repository WHERE 1 = 1");
    push_filters(&mut qb, opt);
    qb.push(" ORDER BY model_repository.id DESC");
    opt.base.push_limit(&mut qb);
    let items = qb
        .build_query_as::<ModelRepository>()
        .fetch_all(&mut *conn)
        .await?;
    Ok((items, total))
}

pub async fn get_associated_model_repository<T: ModelRepositoryAssociated>(
    conn: &mut SqliteConnection,
    associate: &T,
) -> Result<ModelRepository> {
    get(conn, associate.model_repository_id())
        .await
        .context("failed to get associated model repository")
}
