//! Web UI entry page and logout.
//!
//! Any non-API path no route claims is answered with the UI's `index.html`,
//! so client-side routes survive a reload.

use axum::{
    extract::State,
    http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::auth::clear_session_cookie;
use crate::error::AppError;
use crate::AppState;

/// UI routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/logout", get(logout))
}

/// Serve the UI entry page, reading it from disk on first use.
pub async fn index(State(state): State<AppState>) -> Result<Response, AppError> {
    let path = state.config.index_path();
    let html = state
        .index_html
        .get_or_try_init(|| async {
            tokio::fs::read_to_string(&path).await.map_err(|err| {
                tracing::error!(path = %path.display(), error = %err, "failed to read ui index");
                AppError::Internal(format!("ui index {} is unavailable", path.display()))
            })
        })
        .await?;
    Ok(([(CONTENT_TYPE, "text/html; charset=utf-8")], html.clone()).into_response())
}

/// Unmatched paths: JSON 404 under `/api/`, the UI entry page elsewhere.
pub async fn fallback(state: State<AppState>, uri: Uri) -> Result<Response, AppError> {
    if uri.path().starts_with("/api/") {
        return Err(AppError::NotFound(format!("no route for {}", uri.path())));
    }
    index(state).await
}

/// Clear the session cookie and send the browser back to the login page.
async fn logout() -> Response {
    (
        StatusCode::FOUND,
        [
            (SET_COOKIE, clear_session_cookie()),
            (LOCATION, "/login".to_string()),
        ],
    )
        .into_response()
}
