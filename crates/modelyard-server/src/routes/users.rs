//! User endpoints and login.

use axum::{
    extract::{Path, State},
    http::header::SET_COOKIE,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use modelyard_core::services::api_token::{self, CreateApiTokenOption};
use modelyard_core::services::user::{self, CreateUserOption};
use modelyard_core::User;

use crate::auth::{issue_session, session_cookie, CurrentUser};
use crate::error::AppError;
use crate::json::CreatedUserView;
use crate::AppState;

/// Name of the token every new user is issued.
const INITIAL_API_TOKEN: &str = "default";

/// User routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/:name", get(get_user))
        .route("/api/v1/auth/current", get(current_user))
        .route("/api/v1/auth/login", post(login))
}

/// Register a user. The first user may register without credentials and is
/// logged in straight away; afterwards an authenticated caller is required.
///
/// The response carries the new user's first API token, which is how they
/// log in.
async fn create_user(
    State(state): State<AppState>,
    current_user: Option<CurrentUser>,
    Json(opt): Json<CreateUserOption>,
) -> Result<Response, AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let bootstrap = current_user.is_none();
    if bootstrap && user::count(&mut tx).await? > 0 {
        return Err(AppError::Unauthorized("authentication required".to_string()));
    }
    let created = user::create(&mut tx, opt).await?;
    let (_, token) = api_token::create(
        &mut tx,
        CreateApiTokenOption {
            user_id: created.id,
            organization_id: None,
            name: INITIAL_API_TOKEN.to_string(),
            description: "issued at registration".to_string(),
            scopes: Vec::new(),
            expired_at: None,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user = %created.name, bootstrap, "user registered");
    let session = bootstrap
        .then(|| issue_session(&state.cp.signing_key, &created))
        .transpose()?;
    let body = Json(CreatedUserView {
        user: created,
        api_token: token,
    });
    Ok(match session {
        Some(session) => (
            StatusCode::CREATED,
            [(SET_COOKIE, session_cookie(&session))],
            body,
        )
            .into_response(),
        None => (StatusCode::CREATED, body).into_response(),
    })
}

/// Exchange a credential (an API token, or a still-valid session) for a
/// fresh session cookie.
async fn login(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Response, AppError> {
    let session = issue_session(&state.cp.signing_key, &current_user.user)?;
    tracing::info!(user = %current_user.user.name, "login");
    Ok((
        [(SET_COOKIE, session_cookie(&session))],
        Json(current_user.user),
    )
        .into_response())
}

async fn get_user(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<User>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    Ok(Json(user::get_by_name(&mut conn, &name).await?))
}

/// The authenticated caller.
async fn current_user(current_user: CurrentUser) -> Json<User> {
    Json(current_user.user)
}
