//! Model versions and their artifacts.
//!
//! A model row records one pushed version inside a model repository. Its
//! archive lives in the organization's models bucket at
//! `models/<org>/<repo>/<version>.tar.gz` and can be moved directly through
//! this server, through presigned URLs, or in parts through a multipart
//! upload.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::BoxStream;
use http::Method;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use url::Url;

use super::{image_builder, kebab_case, label, model_repository, organization, validate_name};
use crate::config::PRESIGN_EXPIRY;
use crate::control_plane::ControlPlane;
use crate::db::{order_clause, push_in, push_label_filters, LabelFilter, ListOptions};
use crate::error::{Context, Error, Result};
use crate::kubernetes::KubePodWithStatus;
use crate::records::{new_uid, Id, Model, ModelAssociated, ModelRepository, Organization, User};
use crate::schemas::{
    deserialize_nullable, ImageBuildStatus, LabelItem, ModelManifest, ModelUploadStatus,
    ResourceType, Tag,
};
use crate::storage::{ArtifactStore, CompletedPart, PartUploadClaims};

/// Columns a model list may be ordered by.
const ORDERABLE_COLUMNS: &[&str] = &["id", "version", "build_at", "created_at", "updated_at"];

/// Image build status older than this is due for a resync.
const IMAGE_BUILD_STATUS_SYNC_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateModelOption {
    #[serde(skip)]
    pub creator_id: Id,
    #[serde(skip)]
    pub model_repository_id: Id,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub build_at: DateTime<Utc>,
    #[serde(default)]
    pub manifest: Option<ModelManifest>,
    #[serde(default)]
    pub labels: Vec<LabelItem>,
}

/// Fields to change on a model. `None` leaves a field untouched; for the
/// timestamps, `Some(None)` clears the column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateModelOption {
    #[serde(default)]
    pub image_build_status: Option<ImageBuildStatus>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub image_build_status_syncing_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub image_build_status_updated_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub upload_status: Option<ModelUploadStatus>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub upload_started_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub upload_finished_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub upload_finished_reason: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<LabelItem>>,
}

impl UpdateModelOption {
    fn has_column_updates(&self) -> bool {
        self.image_build_status.is_some()
            || self.image_build_status_syncing_at.is_some()
            || self.image_build_status_updated_at.is_some()
            || self.upload_status.is_some()
            || self.upload_started_at.is_some()
            || self.upload_finished_at.is_some()
            || self.upload_finished_reason.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListModelOption {
    pub base: ListOptions,
    pub label_filters: Vec<LabelFilter>,
    pub model_repository_id: Option<Id>,
    pub ids: Option<Vec<Id>>,
    pub versions: Option<Vec<String>>,
    pub bento_ids: Option<Vec<Id>>,
    pub organization_id: Option<Id>,
    pub creator_id: Option<Id>,
    pub creator_ids: Option<Vec<Id>>,
    /// `"<column> [asc|desc]"`; defaults to newest build first.
    pub order: Option<String>,
    /// Model repository names.
    pub names: Option<Vec<String>>,
    /// Manifest modules.
    pub modules: Option<Vec<String>>,
}

/// Query parameters carried by a presigned part-upload URL.
#[derive(Debug, Clone, Deserialize)]
pub struct PartUploadParams {
    /// Signed [`PartUploadClaims`].
    pub token: String,
}

/// Insert a model with pending build and upload status and attach its labels.
pub async fn create(
    conn: &mut SqliteConnection,
    current_user: &User,
    opt: CreateModelOption,
) -> Result<Model> {
    validate_name("model version", &opt.version)?;
    let mut tx = conn.begin().await?;
    let now = Utc::now();
    let model = sqlx::query_as::<_, Model>(
        "INSERT INTO model (uid, model_repository_id, creator_id, version, description,
                            image_build_status, upload_status, build_at, manifest,
                            created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new_uid())
    .bind(opt.model_repository_id)
    .bind(opt.creator_id)
    .bind(&opt.version)
    .bind(&opt.description)
    .bind(ImageBuildStatus::Pending)
    .bind(ModelUploadStatus::Pending)
    .bind(opt.build_at)
    .bind(opt.manifest.map(Json))
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .with_context(|| format!("failed to create model {}", opt.version))?;

    let repository = model_repository::get_associated_model_repository(&mut *tx, &model).await?;
    let org = organization::get_associated_organization(&mut *tx, &repository).await?;
    label::create_or_update_labels(&mut *tx, &opt.labels, current_user.id, org.id, &model).await?;
    tx.commit().await?;

    tracing::info!(repository = %repository.name, version = %model.version, "model created");
    Ok(model)
}

struct ModelLocation {
    organization: Organization,
    repository: ModelRepository,
}

async fn locate(conn: &mut SqliteConnection, model: &Model) -> Result<ModelLocation> {
    let repository = model_repository::get_associated_model_repository(conn, model).await?;
    let organization = organization::get_associated_organization(conn, &repository).await?;
    Ok(ModelLocation {
        organization,
        repository,
    })
}

/// Object key of a model archive.
pub fn object_name(organization: &str, repository: &str, version: &str) -> String {
    format!("models/{}/{}/{}.tar.gz", organization, repository, version)
}

impl ModelLocation {
    fn object_name(&self, model: &Model) -> String {
        object_name(&self.organization.name, &self.repository.name, &model.version)
    }

    fn store(&self, cp: &ControlPlane) -> Result<ArtifactStore> {
        let s3 = organization::s3_config(cp, &self.organization);
        cp.stores
            .open(&s3, &s3.models_bucket_name)
            .context("failed to open models bucket")
    }
}

pub async fn s3_object_name(conn: &mut SqliteConnection, model: &Model) -> Result<String> {
    Ok(locate(conn, model).await?.object_name(model))
}

pub async fn s3_bucket_name(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
) -> Result<String> {
    let location = locate(conn, model).await?;
    Ok(organization::s3_config(cp, &location.organization).models_bucket_name)
}

pub async fn tag(conn: &mut SqliteConnection, model: &Model) -> Result<Tag> {
    let repository = model_repository::get_associated_model_repository(conn, model).await?;
    Ok(Tag::new(&repository.name, &model.version))
}

pub async fn start_multipart_upload(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
) -> Result<String> {
    let location = locate(conn, model).await?;
    let object = location.object_name(model);
    location
        .store(cp)?
        .start_multipart(&object)
        .await
        .with_context(|| format!("failed to start multipart upload of {}", object))
}

/// URL the client `PUT`s one part to. It targets this server's part-upload
/// endpoint and carries a signed token that expires with the usual presign
/// window.
pub async fn presign_multipart_upload_url(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
    part_number: usize,
    upload_id: &str,
) -> Result<Url> {
    if part_number == 0 {
        return Err(Error::InvalidArgument("part numbers start at 1".into()));
    }
    let location = locate(conn, model).await?;
    let object = location.object_name(model);
    let token = PartUploadClaims::new(&object, upload_id, part_number, PRESIGN_EXPIRY)
        .sign(&cp.signing_key)?;

    let base = format!(
        "{}/api/v1/orgs/{}/model_repositories/{}/models/{}/parts",
        cp.external_url, location.organization.name, location.repository.name, model.version
    );
    let mut url = Url::parse(&base)
        .map_err(|e| Error::Config(format!("invalid external url {}: {}", cp.external_url, e)))?;
    url.query_pairs_mut().append_pair("token", &token);
    Ok(url)
}

/// Store one part sent to a presigned part-upload URL and return its ETag.
pub async fn upload_part(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
    params: &PartUploadParams,
    data: Bytes,
) -> Result<String> {
    let location = locate(conn, model).await?;
    let object = location.object_name(model);
    let claims = PartUploadClaims::verify(&cp.signing_key, &params.token, &object)?;

    tracing::debug!(%object, part = claims.part_number, size = data.len(), "uploading part");
    location
        .store(cp)?
        .put_part(&object, &claims.upload_id, claims.part_number, data)
        .await
        .with_context(|| format!("failed to upload part {} of {}", claims.part_number, object))
}

pub async fn complete_multipart_upload(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
    upload_id: &str,
    parts: Vec<CompletedPart>,
) -> Result<()> {
    let location = locate(conn, model).await?;
    let object = location.object_name(model);
    location
        .store(cp)?
        .complete_multipart(&object, upload_id, parts)
        .await
        .with_context(|| format!("failed to complete multipart upload of {}", object))
}

/// Store the whole archive.
pub async fn upload(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
    data: Bytes,
) -> Result<()> {
    let location = locate(conn, model).await?;
    let store = location.store(cp)?;
    let object = location.object_name(model);

    tracing::debug!(bucket = store.bucket(), %object, "uploading to s3");
    store
        .put(&object, data)
        .await
        .context("failed to put object")?;
    tracing::debug!(bucket = store.bucket(), %object, "uploaded to s3");
    Ok(())
}

pub async fn presign_upload_url(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
) -> Result<Url> {
    let location = locate(conn, model).await?;
    location
        .store(cp)?
        .presign(Method::PUT, &location.object_name(model), PRESIGN_EXPIRY)
        .await
        .context("failed to presign put object")
}

/// Stream the archive.
pub async fn download(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
) -> Result<BoxStream<'static, Result<Bytes>>> {
    let location = locate(conn, model).await?;
    location
        .store(cp)?
        .get_stream(&location.object_name(model))
        .await
        .context("failed to get object")
}

pub async fn presign_download_url(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
) -> Result<Url> {
    let location = locate(conn, model).await?;
    location
        .store(cp)?
        .presign(Method::GET, &location.object_name(model), PRESIGN_EXPIRY)
        .await
        .context("failed to presign get object")
}

/// Write the provided fields and, when given, replace the labels. `model`
/// reflects the new values once the update succeeds.
pub async fn update(
    conn: &mut SqliteConnection,
    current_user: &User,
    model: &mut Model,
    opt: UpdateModelOption,
) -> Result<()> {
    let mut tx = conn.begin().await?;
    let now = Utc::now();

    if opt.has_column_updates() {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE model SET updated_at = ");
        qb.push_bind(now);
        if let Some(status) = opt.image_build_status {
            qb.push(", image_build_status = ");
            qb.push_bind(status);
        }
        if let Some(at) = opt.image_build_status_syncing_at {
            qb.push(", image_build_status_syncing_at = ");
            qb.push_bind(at);
        }
        if let Some(at) = opt.image_build_status_updated_at {
            qb.push(", image_build_status_updated_at = ");
            qb.push_bind(at);
        }
        if let Some(status) = opt.upload_status {
            qb.push(", upload_status = ");
            qb.push_bind(status);
        }
        if let Some(at) = opt.upload_started_at {
            qb.push(", upload_started_at = ");
            qb.push_bind(at);
        }
        if let Some(at) = opt.upload_finished_at {
            qb.push(", upload_finished_at = ");
            qb.push_bind(at);
        }
        if let Some(reason) = &opt.upload_finished_reason {
            qb.push(", upload_finished_reason = ");
            qb.push_bind(reason.clone());
        }
        qb.push(" WHERE id = ");
        qb.push_bind(model.id);
        qb.build().execute(&mut *tx).await?;
    }

    if let Some(labels) = &opt.labels {
        let location = locate(&mut *tx, model).await?;
        label::create_or_update_labels(
            &mut *tx,
            labels,
            current_user.id,
            location.organization.id,
            &*model,
        )
        .await?;
    }

    tx.commit().await?;

    if opt.has_column_updates() {
        model.updated_at = now;
    }
    if let Some(status) = opt.image_build_status {
        model.image_build_status = status;
    }
    if let Some(at) = opt.image_build_status_syncing_at {
        model.image_build_status_syncing_at = at;
    }
    if let Some(at) = opt.image_build_status_updated_at {
        model.image_build_status_updated_at = at;
    }
    if let Some(status) = opt.upload_status {
        model.upload_status = status;
    }
    if let Some(at) = opt.upload_started_at {
        model.upload_started_at = at;
    }
    if let Some(at) = opt.upload_finished_at {
        model.upload_finished_at = at;
    }
    if let Some(reason) = opt.upload_finished_reason {
        model.upload_finished_reason = reason;
    }
    Ok(())
}

/// Longest name Kubernetes accepts for a label-valued object name.
const KUBE_NAME_MAX_LEN: usize = 63;

/// Length of the random suffix on image builder names.
const BUILDER_ID_LEN: usize = 20;

/// A unique pod name for building this model's image.
pub async fn image_builder_kube_name(conn: &mut SqliteConnection, model: &Model) -> Result<String> {
    let location = locate(conn, model).await?;
    Ok(image_builder_name(
        &location.organization.name,
        &location.repository.name,
        &model.version,
    ))
}

/// `modelyard-image-builder-<org>-<repo>-<version>-<id>`, kebab-cased, with
/// the readable part cut short so the whole fits in [`KUBE_NAME_MAX_LEN`].
fn image_builder_name(organization: &str, repository: &str, version: &str) -> String {
    let stem = kebab_case(&format!(
        "modelyard-image-builder-{}-{}-{}",
        organization, repository, version
    ))
    .replace('.', "-");
    // kebab_case only emits ASCII, so any byte index is a char boundary.
    let max_stem = KUBE_NAME_MAX_LEN - BUILDER_ID_LEN - 1;
    let stem = stem.get(..max_stem).unwrap_or(&stem).trim_end_matches('-');

    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BUILDER_ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}", stem, id)
}

pub async fn image_builder_kube_labels(
    conn: &mut SqliteConnection,
    model: &Model,
) -> Result<BTreeMap<String, String>> {
    let repository = model_repository::get_associated_model_repository(conn, model).await?;
    Ok(BTreeMap::from([
        (
            image_builder::KUBE_LABEL_MODEL_REPOSITORY.to_string(),
            repository.name,
        ),
        (image_builder::KUBE_LABEL_MODEL.to_string(), model.version.clone()),
    ]))
}

/// Image builder pods for this model in the organization's major cluster.
pub async fn list_image_builder_pods(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    model: &Model,
) -> Result<Vec<KubePodWithStatus>> {
    let location = locate(conn, model).await?;
    let cluster = organization::major_cluster(conn, &location.organization).await?;
    let labels = image_builder_kube_labels(conn, model).await?;
    image_builder::list_image_builder_pods(cp, &cluster, &labels).await
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Model> {
    sqlx::query_as::<_, Model>("SELECT * FROM model WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("model {}", id)))
}

pub async fn get_by_uid(conn: &mut SqliteConnection, uid: &str) -> Result<Model> {
    sqlx::query_as::<_, Model>("SELECT * FROM model WHERE uid = ?")
        .bind(uid)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("model {}", uid)))
}

pub async fn get_by_version(
    conn: &mut SqliteConnection,
    model_repository_id: Id,
    version: &str,
) -> Result<Model> {
    sqlx::query_as::<_, Model>("SELECT * FROM model WHERE model_repository_id = ? AND version = ?")
        .bind(model_repository_id)
        .bind(version)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("model {}", version)))
        .with_context(|| {
            format!(
                "failed to get model by model repository id {} and version {}",
                model_repository_id, version
            )
        })
}

pub async fn list_by_uids(conn: &mut SqliteConnection, uids: &[String]) -> Result<Vec<Model>> {
    if uids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::new("SELECT * FROM model WHERE 1 = 1");
    push_in(&mut qb, "uid", uids);
    Ok(qb.build_query_as::<Model>().fetch_all(&mut *conn).await?)
}

/// Distinct manifest modules across an organization's models.
pub async fn list_all_modules(
    conn: &mut SqliteConnection,
    organization_id: Id,
) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT json_extract(model.manifest, '$.module') AS module
         FROM model JOIN model_repository ON model.model_repository_id = model_repository.id
         WHERE model_repository.organization_id = ?
           AND json_extract(model.manifest, '$.module') IS NOT NULL
           AND json_extract(model.manifest, '$.module') != ''
         ORDER BY module",
    )
    .bind(organization_id)
    .fetch_all(&mut *conn)
    .await?)
}

fn push_list_from(qb: &mut QueryBuilder<'_, Sqlite>, opt: &ListModelOption) {
    qb.push(" FROM model LEFT JOIN model_repository ON model.model_repository_id = model_repository.id");
    if opt.bento_ids.is_some() {
        qb.push(" LEFT JOIN bento_model_rel ON bento_model_rel.model_id = model.id");
    }
    qb.push(" WHERE 1 = 1");
    if let Some(bento_ids) = &opt.bento_ids {
        push_in(qb, "bento_model_rel.bento_id", bento_ids);
    }
    if let Some(organization_id) = opt.organization_id {
        qb.push(" AND model_repository.organization_id = ");
        qb.push_bind(organization_id);
    }
    if let Some(ids) = &opt.ids {
        push_in(qb, "model.id", ids);
    }
    if let Some(versions) = &opt.versions {
        push_in(qb, "model.version", versions);
    }
    if let Some(model_repository_id) = opt.model_repository_id {
        qb.push(" AND model.model_repository_id = ");
        qb.push_bind(model_repository_id);
    }
    if let Some(creator_id) = opt.creator_id {
        qb.push(" AND model.creator_id = ");
        qb.push_bind(creator_id);
    }
    if let Some(names) = &opt.names {
        push_in(qb, "model_repository.name", names);
    }
    if let Some(creator_ids) = &opt.creator_ids {
        push_in(qb, "model.creator_id", creator_ids);
    }
    if let Some(modules) = &opt.modules {
        push_in(qb, "json_extract(model.manifest, '$.module')", modules);
    }
    opt.base.push_keyword(qb, "model_repository.name");
    push_label_filters(qb, "model", ResourceType::Model, &opt.label_filters);
}

/// Models matching `opt`, with the total count before pagination.
pub async fn list(conn: &mut SqliteConnection, opt: &ListModelOption) -> Result<(Vec<Model>, i64)> {
    let order = order_clause(
        opt.order.as_deref(),
        "model",
        ORDERABLE_COLUMNS,
        "model.build_at DESC",
    )?;

    let mut count = QueryBuilder::new("SELECT COUNT(DISTINCT model.id)");
    push_list_from(&mut count, opt);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut qb = QueryBuilder::new("SELECT DISTINCT model.*");
    push_list_from(&mut qb, opt);
    qb.push(order);
    opt.base.push_limit(&mut qb);
    let items = qb.build_query_as::<Model>().fetch_all(&mut *conn).await?;
    Ok((items, total))
}

/// The newest (highest id) model of each repository.
pub async fn list_latest_by_model_repository_ids(
    conn: &mut SqliteConnection,
    model_repository_ids: &[Id],
) -> Result<Vec<Model>> {
    if model_repository_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::new(
        "SELECT * FROM model WHERE id IN (SELECT MAX(id) FROM model WHERE 1 = 1",
    );
    push_in(&mut qb, "model_repository_id", model_repository_ids);
    qb.push(" GROUP BY model_repository_id) ORDER BY id");
    Ok(qb.build_query_as::<Model>().fetch_all(&mut *conn).await?)
}

/// Models whose image build has not succeeded and whose status was not
/// synced or updated within the last minute, newest first.
pub async fn list_image_build_status_unsynced(conn: &mut SqliteConnection) -> Result<Vec<Model>> {
    let threshold = Utc::now() - ChronoDuration::seconds(IMAGE_BUILD_STATUS_SYNC_INTERVAL_SECS);
    Ok(sqlx::query_as::<_, Model>(
        "SELECT * FROM model
         WHERE image_build_status != ?
           AND (image_build_status_syncing_at IS NULL OR image_build_status_syncing_at < ?
                OR image_build_status_updated_at IS NULL OR image_build_status_updated_at < ?)
         ORDER BY id DESC",
    )
    .bind(ImageBuildStatus::Success)
    .bind(threshold)
    .bind(threshold)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn get_associated_model<T: ModelAssociated>(
    conn: &mut SqliteConnection,
    associate: &T,
) -> Result<Model> {
    get(conn, associate.model_id())
        .await
        .context("failed to get associated model")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_builder_name_fits_kube_limit() {
        let name = image_builder_name("acme", "iris", "v1.2");
        assert!(name.starts_with("modelyard-image-builder-acme-iris-v1-2-"));
        assert_eq!(name.len(), "modelyard-image-builder-acme-iris-v1-2-".len() + BUILDER_ID_LEN);

        let long = "x".repeat(80);
        let name = image_builder_name("a-very-long-organization", &long, "2024.06.01-rc.1");
        assert_eq!(name.len(), KUBE_NAME_MAX_LEN);
        assert!(name.starts_with("modelyard-image-builder-a-very-long-"));
        assert!(!name.contains("--"));
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));

        assert_ne!(
            image_builder_name("acme", "iris", "v1"),
            image_builder_name("acme", "iris", "v1")
        );
    }

    #[test]
    fn test_object_name_layout() {
        assert_eq!(
            object_name("acme", "iris", "v1.0"),
            "models/acme/iris/v1.0.tar.gz"
        );
    }

    #[test]
    fn test_update_option_reports_column_updates() {
        assert!(!UpdateModelOption::default().has_column_updates());
        let labels_only = UpdateModelOption {
            labels: Some(vec![]),
            ..Default::default()
        };
        assert!(!labels_only.has_column_updates());
        let clear = UpdateModelOption {
            upload_finished_at: Some(None),
            ..Default::default()
        };
        assert!(clear.has_column_updates());
    }
}
