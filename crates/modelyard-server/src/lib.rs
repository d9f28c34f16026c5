//! Modelyard API server.
//!
//! This crate exposes the Modelyard control plane over HTTP/JSON: model and
//! bento registries, artifact transfer, deployments, and API tokens, plus
//! the static entry page of the web UI.

pub mod auth;
pub mod config;
pub mod error;
pub mod json;
pub mod routes;

pub use config::{Args, ServerConfig, StorageBackend};
pub use error::AppError;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use modelyard_core::{ControlPlane, InMemoryStoreProvider};
use tokio::sync::OnceCell;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Database, storage, and cluster handles.
    pub cp: ControlPlane,
    /// Server configuration.
    pub config: ServerConfig,
    /// UI entry page, read on first request.
    pub index_html: Arc<OnceCell<String>>,
}

impl AppState {
    /// Create new application state.
    pub fn new(cp: ControlPlane, config: ServerConfig) -> Self {
        Self {
            cp,
            config,
            index_html: Arc::new(OnceCell::new()),
        }
    }
}

/// Connect to the database and assemble the control plane described by
/// `config`.
pub async fn build_control_plane(config: &ServerConfig) -> modelyard_core::Result<ControlPlane> {
    let pool = modelyard_core::db::connect(&config.database).await?;
    let mut cp = ControlPlane::new(pool, config.s3.clone())
        .with_external_url(&config.external_url)
        .with_image_builder_namespace(&config.image_builder_namespace);
    if let Some(key) = &config.signing_key {
        cp = cp.with_signing_key(key);
    }
    if config.storage == StorageBackend::Memory {
        cp = cp.with_stores(Arc::new(InMemoryStoreProvider::new()));
    }
    Ok(cp)
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::users::routes())
        .merge(routes::organizations::routes())
        .merge(routes::clusters::routes())
        .merge(routes::model_repositories::routes())
        .merge(routes::models::routes())
        .merge(routes::bentos::routes())
        .merge(routes::deployments::routes())
        .merge(routes::api_tokens::routes())
        .merge(routes::web::routes())
        .fallback(routes::web::fallback)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
