//! Cluster endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use modelyard_core::services::cluster::{self, CreateClusterOption};
use modelyard_core::services::organization;
use modelyard_core::Cluster;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::json::{ListQuery, ListResponse};
use crate::AppState;

/// Cluster routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/orgs/:org/clusters",
            get(list_clusters).post(create_cluster),
        )
        .route("/api/v1/orgs/:org/clusters/:cluster", get(get_cluster))
}

async fn create_cluster(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(org): Path<String>,
    Json(mut opt): Json<CreateClusterOption>,
) -> Result<(StatusCode, Json<Cluster>), AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let org = organization::get_by_name(&mut tx, &org).await?;
    opt.organization_id = org.id;
    opt.creator_id = current_user.user.id;
    let created = cluster::create(&mut tx, opt).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_clusters(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(org): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Cluster>>, AppError> {
    let options = query.list_options();
    let mut conn = state.cp.pool.acquire().await?;
    let org = organization::get_by_name(&mut conn, &org).await?;
    let (items, total) = cluster::list(&mut conn, org.id, &options).await?;
    Ok(Json(ListResponse::new(&options, total, items)))
}

async fn get_cluster(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, name)): Path<(String, String)>,
) -> Result<Json<Cluster>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let org = organization::get_by_name(&mut conn, &org).await?;
    Ok(Json(cluster::get_by_name(&mut conn, org.id, &name).await?))
}
