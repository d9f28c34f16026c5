//! Model repository endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use modelyard_core::services::model_repository::{
    self, CreateModelRepositoryOption, ListModelRepositoryOption,
};
use modelyard_core::services::{label, model, organization};
use modelyard_core::{ModelRepository, ResourceType};
use sqlx::SqliteConnection;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::json::{ListQuery, ListResponse, ModelRepositoryView};
use crate::AppState;

/// Model repository routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/orgs/:org/model_repositories",
            get(list_model_repositories).post(create_model_repository),
        )
        .route(
            "/api/v1/orgs/:org/model_repositories/:repo",
            get(get_model_repository),
        )
}

/// Attach labels and the newest model to each repository.
async fn to_views(
    conn: &mut SqliteConnection,
    repositories: Vec<ModelRepository>,
) -> Result<Vec<ModelRepositoryView>, AppError> {
    let ids: Vec<_> = repositories.iter().map(|r| r.id).collect();
    let mut labels = label::list_by_resources(conn, ResourceType::ModelRepository, &ids).await?;
    let mut latest: HashMap<_, _> = model::list_latest_by_model_repository_ids(conn, &ids)
        .await?
        .into_iter()
        .map(|m| (m.model_repository_id, m))
        .collect();

    Ok(repositories
        .into_iter()
        .map(|repository| ModelRepositoryView {
            labels: label::to_items(&labels.remove(&repository.id).unwrap_or_default()),
            latest_model: latest.remove(&repository.id),
            repository,
        })
        .collect())
}

async fn create_model_repository(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(org): Path<String>,
    Json(mut opt): Json<CreateModelRepositoryOption>,
) -> Result<(StatusCode, Json<ModelRepositoryView>), AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let org = organization::get_by_name(&mut tx, &org).await?;
    opt.organization_id = org.id;
    opt.creator_id = current_user.user.id;
    let repository = model_repository::create(&mut tx, opt).await?;
    let view = to_views(&mut tx, vec![repository]).await?.remove(0);
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_model_repositories(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(org): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<ModelRepositoryView>>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let org = organization::get_by_name(&mut conn, &org).await?;
    let opt = ListModelRepositoryOption {
        base: query.list_options(),
        organization_id: Some(org.id),
        creator_id: None,
        label_filters: query.label_filters()?,
    };
    let (items, total) = model_repository::list(&mut conn, &opt).await?;
    let items = to_views(&mut conn, items).await?;
    Ok(Json(ListResponse::new(&opt.base, total, items)))
}

async fn get_model_repository(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo)): Path<(String, String)>,
) -> Result<Json<ModelRepositoryView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let org = organization::get_by_name(&mut conn, &org).await?;
    let repository = model_repository::get_by_name(&mut conn, org.id, &repo).await?;
    Ok(Json(to_views(&mut conn, vec![repository]).await?.remove(0)))
}
