//! Organization endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use modelyard_core::services::organization::{self, CreateOrganizationOption};
use modelyard_core::Organization;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::json::{ListQuery, ListResponse};
use crate::AppState;

/// Organization routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/orgs",
            get(list_organizations).post(create_organization),
        )
        .route("/api/v1/orgs/:org", get(get_organization))
}

async fn create_organization(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(mut opt): Json<CreateOrganizationOption>,
) -> Result<(StatusCode, Json<Organization>), AppError> {
    opt.creator_id = current_user.user.id;
    let mut tx = state.cp.pool.begin().await?;
    let org = organization::create(&mut tx, opt).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(org)))
}

async fn list_organizations(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Organization>>, AppError> {
    let options = query.list_options();
    let mut conn = state.cp.pool.acquire().await?;
    let (items, total) = organization::list(&mut conn, &options).await?;
    Ok(Json(ListResponse::new(&options, total, items)))
}

async fn get_organization(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(org): Path<String>,
) -> Result<Json<Organization>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    Ok(Json(organization::get_by_name(&mut conn, &org).await?))
}
