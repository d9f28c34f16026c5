use chrono::Utc;
use serde::Deserialize;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};

use super::{label, validate_name};
use crate::db::{push_label_filters, LabelFilter, ListOptions};
use crate::error::{Context, Error, Result};
use crate::records::{new_uid, BentoRepository, BentoRepositoryAssociated, Id};
use crate::schemas::{LabelItem, ResourceType};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBentoRepositoryOption {
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
pub struct ListBentoRepositoryOption {
    pub base: ListOptions,
    pub organization_id: Option<Id>,
    pub label_filters: Vec<LabelFilter>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    opt: CreateBentoRepositoryOption,
) -> Result<BentoRepository> {
    validate_name("bento repository", &opt.name)?;
    let mut tx = conn.begin().await?;
    let now = Utc::now();
    let repository = sqlx::query_as::<_, BentoRepository>(
        "INSERT INTO bento_repository (uid, organization_id, creator_id, name, description, created_at, updated_at)
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
    .with_context(|| format!("failed to create bento repository {}", opt.name))?;

    label::create_or_update_labels(
        &mut *tx,
        &opt.labels,
        opt.creator_id,
        opt.organization_id,
        &repository,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(repository = %repository.name, "bento repository created");
    Ok(repository)
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<BentoRepository> {
    sqlx::query_as::<_, BentoRepository>("SELECT * FROM bento_repository WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("bento repository {}", id)))
}

pub async fn get_by_name(
    conn: &mut SqliteConnection,
    organization_id: Id,
    name: &str,
) -> Result<BentoRepository> {
    sqlx::query_as::<_, BentoRepository>(
        "SELECT * FROM bento_repository WHERE organization_id = ? AND name = ?",
    )
    .bind(organization_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::not_found(format!("bento repository {}", name)))
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, opt: &ListBentoRepositoryOption) {
    if let Some(organization_id) = opt.organization_id {
        qb.push(" AND bento_repository.organization_id = ");
        qb.push_bind(organization_id);
    }
    opt.base.push_keyword(qb, "bento_repository.name");
    push_label_filters(
        qb,
        "bento_repository",
        ResourceType::BentoRepository,
        &opt.label_filters,
    );
}

pub async fn list(
    conn: &mut SqliteConnection,
    opt: &ListBentoRepositoryOption,
) -> Result<(Vec<BentoRepository>, i64)> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM bento_repository WHERE 1 = 1");
    push_filters(&mut count, opt);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut qb = QueryBuilder::new("SELECT * FROM bento_repository WHERE 1 = 1");
    push_filters(&mut qb, opt);
    qb.push(" ORDER BY bento_repository.id DESC");
    opt.base.push_limit(&mut qb);
    let items = qb
        .build_query_as::<BentoRepository>()
        .fetch_all(&mut *conn)
        .await?;
    Ok((items, total))
}

pub async fn get_associated_bento_repository<T: BentoRepositoryAssociated>(
    conn: &mut SqliteConnection,
    associate: &T,
) -> Result<BentoRepository> {
    get(conn, associate.bento_repository_id())
        .await
        .context("failed to get associated bento repository")
}
