//! HTTP route handlers.

pub mod api_tokens;
pub mod bentos;
pub mod clusters;
pub mod deployments;
pub mod health;
pub mod model_repositories;
pub mod models;
pub mod organizations;
pub mod users;
pub mod web;
