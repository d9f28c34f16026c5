//! Error handling for the API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflicts with an existing record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object storage or Kubernetes failed.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        }

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<modelyard_core::Error> for AppError {
    fn from(err: modelyard_core::Error) -> Self {
        use modelyard_core::Error;

        let message = err.to_string();
        match err.root() {
            Error::NotFound(_) => AppError::NotFound(message),
            Error::InvalidArgument(_) | Error::Serialization(_) => AppError::BadRequest(message),
            Error::Unauthorized(_) => AppError::Unauthorized(message),
            Error::Conflict(_) => AppError::Conflict(message),
            Error::Storage(_) | Error::Kube(_) => AppError::Upstream(message),
            _ => AppError::Internal(message),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        modelyard_core::Error::from(err).into()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use modelyard_core::{Context, Error};

    use super::*;

    fn status_of(err: Error) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_core_errors_map_to_statuses() {
        assert_eq!(status_of(Error::not_found("model v1")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(Error::InvalidArgument("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(Error::Unauthorized("nope".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(Error::Conflict("dup".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(Error::Config("broken".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_context_wrapped_errors_use_root() {
        let res: modelyard_core::Result<()> = Err(Error::not_found("bento 1"));
        let err = res.context("failed to get associated bento").unwrap_err();
        match AppError::from(err) {
            AppError::NotFound(message) => {
                assert_eq!(message, "failed to get associated bento: bento 1 not found")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
