//! Model endpoints: registry metadata and artifact transfer.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use modelyard_core::services::model::{
    self, CreateModelOption, ListModelOption, PartUploadParams, UpdateModelOption,
};
use modelyard_core::services::{label, model_repository, organization, user};
use modelyard_core::{
    KubePodWithStatus, Model, ModelRepository, ModelUploadStatus, ResourceType, Tag,
};
use sqlx::SqliteConnection;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::json::{
    split_csv, CompleteMultipartUploadRequest, FinishUploadRequest, ListQuery, ListResponse,
    ModelView, OrganizationModelsQuery, PartUploadResponse, PresignMultipartUploadRequest,
    PresignedUrlResponse, UploadIdResponse,
};
use crate::AppState;

const MODEL_PATH: &str = "/api/v1/orgs/:org/model_repositories/:repo/models/:version";

/// Model routes.
pub fn routes() -> Router<AppState> {
    let model_route = |suffix: &str| format!("{}{}", MODEL_PATH, suffix);

    Router::new()
        .route(
            "/api/v1/orgs/:org/model_repositories/:repo/models",
            get(list_models).post(create_model),
        )
        .route(MODEL_PATH, get(get_model).patch(update_model))
        .route(&model_route("/start_upload"), post(start_upload))
        .route(&model_route("/finish_upload"), post(finish_upload))
        .route(&model_route("/presign_upload_url"), post(presign_upload_url))
        .route(&model_route("/presign_download_url"), post(presign_download_url))
        .route(
            &model_route("/start_multipart_upload"),
            post(start_multipart_upload),
        )
        .route(
            &model_route("/presign_multipart_upload_url"),
            post(presign_multipart_upload_url),
        )
        .route(&model_route("/parts"), put(upload_part))
        .route(
            &model_route("/complete_multipart_upload"),
            post(complete_multipart_upload),
        )
        .route(&model_route("/upload"), put(upload))
        .route(&model_route("/download"), get(download))
        .route(&model_route("/image_builder_pods"), get(image_builder_pods))
        .route("/api/v1/orgs/:org/models", get(list_organization_models))
        .route("/api/v1/orgs/:org/model_modules", get(list_model_modules))
}

async fn find_repository(
    conn: &mut SqliteConnection,
    org: &str,
    repo: &str,
) -> Result<ModelRepository, AppError> {
    let org = organization::get_by_name(conn, org).await?;
    Ok(model_repository::get_by_name(conn, org.id, repo).await?)
}

async fn find_model(
    conn: &mut SqliteConnection,
    org: &str,
    repo: &str,
    version: &str,
) -> Result<Model, AppError> {
    let repository = find_repository(conn, org, repo).await?;
    Ok(model::get_by_version(conn, repository.id, version).await?)
}

/// Attach repository names, tags, and labels to models.
async fn to_views(
    conn: &mut SqliteConnection,
    models: Vec<Model>,
) -> Result<Vec<ModelView>, AppError> {
    let ids: Vec<_> = models.iter().map(|m| m.id).collect();
    let mut labels = label::list_by_resources(conn, ResourceType::Model, &ids).await?;

    let mut repositories: HashMap<_, String> = HashMap::new();
    let mut views = Vec::with_capacity(models.len());
    for model in models {
        if !repositories.contains_key(&model.model_repository_id) {
            let repository = model_repository::get_associated_model_repository(conn, &model).await?;
            repositories.insert(repository.id, repository.name);
        }
        let repository = repositories
            .get(&model.model_repository_id)
            .cloned()
            .unwrap_or_default();
        views.push(ModelView {
            tag: Tag::new(&repository, &model.version),
            labels: label::to_items(&labels.remove(&model.id).unwrap_or_default()),
            repository,
            model,
            presigned_upload_url: None,
            presigned_download_url: None,
        });
    }
    Ok(views)
}

async fn to_view(conn: &mut SqliteConnection, model: Model) -> Result<ModelView, AppError> {
    let mut views = to_views(conn, vec![model]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::Internal("model view missing".to_string()))
}

async fn create_model(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((org, repo)): Path<(String, String)>,
    Json(mut opt): Json<CreateModelOption>,
) -> Result<(StatusCode, Json<ModelView>), AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let repository = find_repository(&mut tx, &org, &repo).await?;
    opt.creator_id = current_user.user.id;
    opt.model_repository_id = repository.id;
    let created = model::create(&mut tx, &current_user.user, opt).await?;
    let view = to_view(&mut tx, created).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_models(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<ModelView>>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let repository = find_repository(&mut conn, &org, &repo).await?;
    let opt = ListModelOption {
        base: query.list_options(),
        label_filters: query.label_filters()?,
        model_repository_id: Some(repository.id),
        order: query.order.clone(),
        ..Default::default()
    };
    let (items, total) = model::list(&mut conn, &opt).await?;
    let items = to_views(&mut conn, items).await?;
    Ok(Json(ListResponse::new(&opt.base, total, items)))
}

async fn get_model(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
) -> Result<Json<ModelView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    Ok(Json(to_view(&mut conn, found).await?))
}

async fn update_model(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
    Json(opt): Json<UpdateModelOption>,
) -> Result<Json<ModelView>, AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let mut found = find_model(&mut tx, &org, &repo, &version).await?;
    model::update(&mut tx, &current_user.user, &mut found, opt).await?;
    let view = to_view(&mut tx, found).await?;
    tx.commit().await?;
    Ok(Json(view))
}

/// Mark the model as uploading.
async fn start_upload(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
) -> Result<Json<ModelView>, AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let mut found = find_model(&mut tx, &org, &repo, &version).await?;
    model::update(
        &mut tx,
        &current_user.user,
        &mut found,
        UpdateModelOption {
            upload_status: Some(ModelUploadStatus::Uploading),
            upload_started_at: Some(Some(Utc::now())),
            ..Default::default()
        },
    )
    .await?;
    let view = to_view(&mut tx, found).await?;
    tx.commit().await?;
    Ok(Json(view))
}

/// Record the outcome of an upload.
async fn finish_upload(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
    body: Option<Json<FinishUploadRequest>>,
) -> Result<Json<ModelView>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let mut tx = state.cp.pool.begin().await?;
    let mut found = find_model(&mut tx, &org, &repo, &version).await?;
    model::update(
        &mut tx,
        &current_user.user,
        &mut found,
        UpdateModelOption {
            upload_status: Some(request.status.unwrap_or(ModelUploadStatus::Success)),
            upload_finished_at: Some(Some(Utc::now())),
            upload_finished_reason: Some(request.reason.unwrap_or_default()),
            ..Default::default()
        },
    )
    .await?;
    let view = to_view(&mut tx, found).await?;
    tx.commit().await?;
    Ok(Json(view))
}

async fn presign_upload_url(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
) -> Result<Json<ModelView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    let url = model::presign_upload_url(&state.cp, &mut conn, &found).await?;
    let mut view = to_view(&mut conn, found).await?;
    view.presigned_upload_url = Some(url.to_string());
    Ok(Json(view))
}

async fn presign_download_url(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
) -> Result<Json<ModelView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    let url = model::presign_download_url(&state.cp, &mut conn, &found).await?;
    let mut view = to_view(&mut conn, found).await?;
    view.presigned_download_url = Some(url.to_string());
    Ok(Json(view))
}

async fn start_multipart_upload(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
) -> Result<Json<UploadIdResponse>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    let upload_id = model::start_multipart_upload(&state.cp, &mut conn, &found).await?;
    Ok(Json(UploadIdResponse { upload_id }))
}

async fn presign_multipart_upload_url(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
    Json(request): Json<PresignMultipartUploadRequest>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    let url = model::presign_multipart_upload_url(
        &state.cp,
        &mut conn,
        &found,
        request.part_number,
        &request.upload_id,
    )
    .await?;
    Ok(Json(PresignedUrlResponse {
        url: url.to_string(),
    }))
}

/// Receive one part sent to a presigned part URL. The URL's signed token is the
/// credential, so no user is required.
async fn upload_part(
    State(state): State<AppState>,
    Path((org, repo, version)): Path<(String, String, String)>,
    Query(params): Query<PartUploadParams>,
    data: Bytes,
) -> Result<Response, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    let etag = model::upload_part(&state.cp, &mut conn, &found, &params, data).await?;
    Ok((
        [(header::ETAG, etag.clone())],
        Json(PartUploadResponse { etag }),
    )
        .into_response())
}

async fn complete_multipart_upload(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
    Json(request): Json<CompleteMultipartUploadRequest>,
) -> Result<Json<ModelView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    model::complete_multipart_upload(
        &state.cp,
        &mut conn,
        &found,
        &request.upload_id,
        request.parts,
    )
    .await?;
    Ok(Json(to_view(&mut conn, found).await?))
}

/// Store the archive sent in the body and mark the upload successful.
async fn upload(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
    data: Bytes,
) -> Result<Json<ModelView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let mut found = find_model(&mut conn, &org, &repo, &version).await?;
    model::upload(&state.cp, &mut conn, &found, data).await?;
    let now = Utc::now();
    let opt = UpdateModelOption {
        upload_status: Some(ModelUploadStatus::Success),
        upload_started_at: found.upload_started_at.is_none().then_some(Some(now)),
        upload_finished_at: Some(Some(now)),
        ..Default::default()
    };
    model::update(&mut conn, &current_user.user, &mut found, opt).await?;
    Ok(Json(to_view(&mut conn, found).await?))
}

async fn download(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    let stream = model::download(&state.cp, &mut conn, &found).await?;
    let disposition = format!("attachment; filename=\"{}-{}.tar.gz\"", repo, version);
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn image_builder_pods(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
) -> Result<Json<Vec<KubePodWithStatus>>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let found = find_model(&mut conn, &org, &repo, &version).await?;
    Ok(Json(
        model::list_image_builder_pods(&state.cp, &mut conn, &found).await?,
    ))
}

/// Models across all repositories of an organization.
async fn list_organization_models(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(org): Path<String>,
    Query(query): Query<OrganizationModelsQuery>,
) -> Result<Json<ListResponse<ModelView>>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let org = organization::get_by_name(&mut conn, &org).await?;
    let list_query = query.list_query();

    let creator_ids = match split_csv(query.creators.as_deref()) {
        Some(names) => {
            let mut ids = Vec::with_capacity(names.len());
            for name in &names {
                match user::get_by_name(&mut conn, name).await {
                    Ok(found) => ids.push(found.id),
                    Err(err) if err.is_not_found() => {}
                    Err(err) => return Err(err.into()),
                }
            }
            Some(ids)
        }
        None => None,
    };

    let opt = ListModelOption {
        base: list_query.list_options(),
        label_filters: list_query.label_filters()?,
        organization_id: Some(org.id),
        creator_ids,
        order: list_query.order.clone(),
        names: split_csv(query.repositories.as_deref()),
        modules: split_csv(query.modules.as_deref()),
        ..Default::default()
    };
    let (items, total) = model::list(&mut conn, &opt).await?;
    let items = to_views(&mut conn, items).await?;
    Ok(Json(ListResponse::new(&opt.base, total, items)))
}

async fn list_model_modules(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(org): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let org = organization::get_by_name(&mut conn, &org).await?;
    Ok(Json(model::list_all_modules(&mut conn, org.id).await?))
}
