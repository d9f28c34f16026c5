use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{Connection, QueryBuilder, SqliteConnection};

use super::{bento_repository, label, organization, validate_name};
use crate::db::{push_in, ListOptions};
use crate::error::{Context, Error, Result};
use crate::records::{new_uid, Bento, BentoAssociated, BentoModelRel, Id, User};
use crate::schemas::{BentoManifest, LabelItem, Tag};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBentoOption {
    #[serde(skip)]
    pub creator_id: Id,
    #[serde(skip)]
    pub bento_repository_id: Id,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub build_at: DateTime<Utc>,
    #[serde(default)]
    pub manifest: Option<BentoManifest>,
    #[serde(default)]
    pub labels: Vec<LabelItem>,
    /// Models packaged in the bento.
    #[serde(default)]
    pub model_ids: Vec<Id>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    current_user: &User,
    opt: CreateBentoOption,
) -> Result<Bento> {
    validate_name("bento version", &opt.version)?;
    let mut tx = conn.begin().await?;
    let now = Utc::now();
    let bento = sqlx::query_as::<_, Bento>(
        "INSERT INTO bento (uid, bento_repository_id, creator_id, version, description, build_at,
                            manifest, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new_uid())
    .bind(opt.bento_repository_id)
    .bind(opt.creator_id)
    .bind(&opt.version)
    .bind(&opt.description)
    .bind(opt.build_at)
    .bind(opt.manifest.map(Json))
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .with_context(|| format!("failed to create bento {}", opt.version))?;

    let repository = bento_repository::get_associated_bento_repository(&mut *tx, &bento).await?;
    let org = organization::get_associated_organization(&mut *tx, &repository).await?;
    label::create_or_update_labels(&mut *tx, &opt.labels, current_user.id, org.id, &bento).await?;
    link_models(&mut *tx, &bento, &opt.model_ids).await?;
    tx.commit().await?;

    tracing::info!(repository = %repository.name, version = %bento.version, "bento created");
    Ok(bento)
}

/// Record that `bento` packages the given models. Existing links are kept.
pub async fn link_models(
    conn: &mut SqliteConnection,
    bento: &Bento,
    model_ids: &[Id],
) -> Result<()> {
    for model_id in model_ids {
        sqlx::query("INSERT OR IGNORE INTO bento_model_rel (bento_id, model_id) VALUES (?, ?)")
            .bind(bento.id)
            .bind(model_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("failed to link model {} to bento {}", model_id, bento.version))?;
    }
    Ok(())
}

pub async fn list_model_rels(conn: &mut SqliteConnection, bento: &Bento) -> Result<Vec<BentoModelRel>> {
    Ok(sqlx::query_as::<_, BentoModelRel>(
        "SELECT bento_id, model_id FROM bento_model_rel WHERE bento_id = ? ORDER BY model_id",
    )
    .bind(bento.id)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn tag(conn: &mut SqliteConnection, bento: &Bento) -> Result<Tag> {
    let repository = bento_repository::get_associated_bento_repository(conn, bento).await?;
    Ok(Tag::new(&repository.name, &bento.version))
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Bento> {
    sqlx::query_as::<_, Bento>("SELECT * FROM bento WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("bento {}", id)))
}

pub async fn get_by_version(
    conn: &mut SqliteConnection,
    bento_repository_id: Id,
    version: &str,
) -> Result<Bento> {
    sqlx::query_as::<_, Bento>("SELECT * FROM bento WHERE bento_repository_id = ? AND version = ?")
        .bind(bento_repository_id)
        .bind(version)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("bento {}", version)))
}

pub async fn list_by_repository(
    conn: &mut SqliteConnection,
    bento_repository_id: Id,
    opt: &ListOptions,
) -> Result<(Vec<Bento>, i64)> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM bento WHERE bento_repository_id = ");
    count.push_bind(bento_repository_id);
    opt.push_keyword(&mut count, "bento.version");
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut qb = QueryBuilder::new("SELECT * FROM bento WHERE bento_repository_id = ");
    qb.push_bind(bento_repository_id);
    opt.push_keyword(&mut qb, "bento.version");
    qb.push(" ORDER BY bento.build_at DESC");
    opt.push_limit(&mut qb);
    let items = qb.build_query_as::<Bento>().fetch_all(&mut *conn).await?;
    Ok((items, total))
}

pub async fn list_by_ids(conn: &mut SqliteConnection, ids: &[Id]) -> Result<Vec<Bento>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::new("SELECT * FROM bento WHERE 1 = 1");
    push_in(&mut qb, "id", ids);
    Ok(qb.build_query_as::<Bento>().fetch_all(&mut *conn).await?)
}

pub async fn get_associated_bento<T: BentoAssociated>(
    conn: &mut SqliteConnection,
    associate: &T,
) -> Result<Bento> {
    get(conn, associate.bento_id())
        .await
        .context("failed to get associated bento")
}
