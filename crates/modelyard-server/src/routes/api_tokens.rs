//! Personal API token endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use modelyard_core::services::api_token::{self, CreateApiTokenOption};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::json::ApiTokenView;
use crate::AppState;

/// API token routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/api_tokens",
            get(list_api_tokens).post(create_api_token),
        )
        .route("/api/v1/api_tokens/:name", delete(delete_api_token))
}

/// Issue a token. The plaintext is only ever returned here.
async fn create_api_token(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(mut opt): Json<CreateApiTokenOption>,
) -> Result<(StatusCode, Json<ApiTokenView>), AppError> {
    opt.user_id = current_user.user.id;
    let mut conn = state.cp.pool.acquire().await?;
    let (record, token) = api_token::create(&mut conn, opt).await?;
    let mut view = ApiTokenView::from(record);
    view.token = Some(token);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_api_tokens(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ApiTokenView>>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let tokens = api_token::list(&mut conn, current_user.user.id).await?;
    Ok(Json(tokens.into_iter().map(ApiTokenView::from).collect()))
}

async fn delete_api_token(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    api_token::delete(&mut conn, current_user.user.id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
