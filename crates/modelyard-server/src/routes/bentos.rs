//! Bento repository and bento endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use modelyard_core::services::bento::{self, CreateBentoOption};
use modelyard_core::services::bento_repository::{
    self, CreateBentoRepositoryOption, ListBentoRepositoryOption,
};
use modelyard_core::services::{label, model, organization};
use modelyard_core::{Bento, BentoRepository, ResourceType};
use sqlx::SqliteConnection;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::json::{BentoRepositoryView, BentoView, ListQuery, ListResponse};
use crate::AppState;

/// Bento routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/orgs/:org/bento_repositories",
            get(list_bento_repositories).post(create_bento_repository),
        )
        .route(
            "/api/v1/orgs/:org/bento_repositories/:repo",
            get(get_bento_repository),
        )
        .route(
            "/api/v1/orgs/:org/bento_repositories/:repo/bentos",
            get(list_bentos).post(create_bento),
        )
        .route(
            "/api/v1/orgs/:org/bento_repositories/:repo/bentos/:version",
            get(get_bento),
        )
}

async fn find_repository(
    conn: &mut SqliteConnection,
    org: &str,
    repo: &str,
) -> Result<BentoRepository, AppError> {
    let org = organization::get_by_name(conn, org).await?;
    Ok(bento_repository::get_by_name(conn, org.id, repo).await?)
}

async fn repository_view(
    conn: &mut SqliteConnection,
    repository: BentoRepository,
) -> Result<BentoRepositoryView, AppError> {
    let labels = label::list_by_resource(conn, ResourceType::BentoRepository, repository.id).await?;
    Ok(BentoRepositoryView {
        labels: label::to_items(&labels),
        repository,
    })
}

async fn bento_view(conn: &mut SqliteConnection, bento: Bento) -> Result<BentoView, AppError> {
    let tag = bento::tag(conn, &bento).await?;
    let labels = label::list_by_resource(conn, ResourceType::Bento, bento.id).await?;
    let mut models = Vec::new();
    for rel in bento::list_model_rels(conn, &bento).await? {
        models.push(model::get_associated_model(conn, &rel).await?.uid);
    }
    Ok(BentoView {
        tag,
        labels: label::to_items(&labels),
        models,
        bento,
    })
}

async fn create_bento_repository(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(org): Path<String>,
    Json(mut opt): Json<CreateBentoRepositoryOption>,
) -> Result<(StatusCode, Json<BentoRepositoryView>), AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let org = organization::get_by_name(&mut tx, &org).await?;
    opt.organization_id = org.id;
    opt.creator_id = current_user.user.id;
    let repository = bento_repository::create(&mut tx, opt).await?;
    let view = repository_view(&mut tx, repository).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_bento_repositories(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(org): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<BentoRepositoryView>>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let org = organization::get_by_name(&mut conn, &org).await?;
    let opt = ListBentoRepositoryOption {
        base: query.list_options(),
        organization_id: Some(org.id),
        label_filters: query.label_filters()?,
    };
    let (items, total) = bento_repository::list(&mut conn, &opt).await?;
    let mut views = Vec::with_capacity(items.len());
    for repository in items {
        views.push(repository_view(&mut conn, repository).await?);
    }
    Ok(Json(ListResponse::new(&opt.base, total, views)))
}

async fn get_bento_repository(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo)): Path<(String, String)>,
) -> Result<Json<BentoRepositoryView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let repository = find_repository(&mut conn, &org, &repo).await?;
    Ok(Json(repository_view(&mut conn, repository).await?))
}

/// Push a bento version. `model_ids` link the models it packages.
async fn create_bento(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((org, repo)): Path<(String, String)>,
    Json(mut opt): Json<CreateBentoOption>,
) -> Result<(StatusCode, Json<BentoView>), AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let repository = find_repository(&mut tx, &org, &repo).await?;
    opt.creator_id = current_user.user.id;
    opt.bento_repository_id = repository.id;
    let created = bento::create(&mut tx, &current_user.user, opt).await?;
    let view = bento_view(&mut tx, created).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_bentos(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<BentoView>>, AppError> {
    let options = query.list_options();
    let mut conn = state.cp.pool.acquire().await?;
    let repository = find_repository(&mut conn, &org, &repo).await?;
    let (items, total) = bento::list_by_repository(&mut conn, repository.id, &options).await?;
    let mut views = Vec::with_capacity(items.len());
    for item in items {
        views.push(bento_view(&mut conn, item).await?);
    }
    Ok(Json(ListResponse::new(&options, total, views)))
}

async fn get_bento(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, repo, version)): Path<(String, String, String)>,
) -> Result<Json<BentoView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let repository = find_repository(&mut conn, &org, &repo).await?;
    let found = bento::get_by_version(&mut conn, repository.id, &version).await?;
    Ok(Json(bento_view(&mut conn, found).await?))
}
