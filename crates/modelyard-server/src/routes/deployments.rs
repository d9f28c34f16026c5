//! Deployment endpoints.
//!
//! Creating a deployment or giving it a new target writes a deployment
//! target and reconciles it into the cluster's BentoDeployment resource in
//! the same request. The status refresh that follows a write starts only
//! after the request's transaction has committed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use modelyard_core::services::deployment::{self, CreateDeploymentOption, ListDeploymentOption};
use modelyard_core::services::deployment_target::{self, CreateDeploymentTargetOption};
use modelyard_core::services::kube_bento_deployment::{self, Deployed};
use modelyard_core::services::{bento, bento_repository, cluster, label, organization};
use modelyard_core::{Cluster, ControlPlane, Deployment, ResourceType, User};
use sqlx::SqliteConnection;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::json::{
    CreateDeploymentRequest, DeploymentTargetRequest, DeploymentView, ListQuery, ListResponse,
    UpdateDeploymentRequest,
};
use crate::AppState;

/// Deployment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/orgs/:org/clusters/:cluster/deployments",
            get(list_deployments).post(create_deployment),
        )
        .route(
            "/api/v1/orgs/:org/clusters/:cluster/deployments/:name",
            get(get_deployment).put(update_deployment),
        )
        .route(
            "/api/v1/orgs/:org/clusters/:cluster/deployments/:name/sync_status",
            post(sync_status),
        )
}

async fn find_cluster(
    conn: &mut SqliteConnection,
    org: &str,
    name: &str,
) -> Result<Cluster, AppError> {
    let org = organization::get_by_name(conn, org).await?;
    Ok(cluster::get_by_name(conn, org.id, name).await?)
}

async fn to_view(
    conn: &mut SqliteConnection,
    cluster: &Cluster,
    deployment: Deployment,
) -> Result<DeploymentView, AppError> {
    let labels = label::list_by_resource(conn, ResourceType::Deployment, deployment.id).await?;
    let latest_target = deployment_target::list_by_deployment(conn, deployment.id)
        .await?
        .into_iter()
        .next();
    Ok(DeploymentView {
        cluster: cluster.name.clone(),
        labels: label::to_items(&labels),
        latest_target,
        deployment,
    })
}

/// Write a new target for `deployment` and reconcile it into the cluster.
async fn deploy_target(
    cp: &ControlPlane,
    conn: &mut SqliteConnection,
    cluster: &Cluster,
    deployment: &Deployment,
    creator: &User,
    request: DeploymentTargetRequest,
) -> Result<Deployed, AppError> {
    let repository =
        bento_repository::get_by_name(conn, cluster.organization_id, &request.bento_repository)
            .await?;
    let target_bento = bento::get_by_version(conn, repository.id, &request.bento).await?;
    let mut target = deployment_target::create(
        conn,
        CreateDeploymentTargetOption {
            creator_id: creator.id,
            deployment_id: deployment.id,
            bento_id: target_bento.id,
            config: request.config,
        },
    )
    .await?;

    let deployed = kube_bento_deployment::deploy(cp, conn, &target).await?;
    deployment_target::record_kube_resource_version(
        conn,
        &mut target,
        deployed.resource.metadata.resource_version.clone(),
    )
    .await?;
    Ok(deployed)
}

async fn create_deployment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((org, cluster_name)): Path<(String, String)>,
    Json(request): Json<CreateDeploymentRequest>,
) -> Result<(StatusCode, Json<DeploymentView>), AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let cluster = find_cluster(&mut tx, &org, &cluster_name).await?;
    let created = deployment::create(
        &mut tx,
        &cluster,
        CreateDeploymentOption {
            creator_id: current_user.user.id,
            cluster_id: cluster.id,
            name: request.name,
            description: request.description,
            kube_namespace: request.kube_namespace,
        },
    )
    .await?;
    label::create_or_update_labels(
        &mut tx,
        &request.labels,
        current_user.user.id,
        cluster.organization_id,
        &created,
    )
    .await?;

    let deployed = deploy_target(
        &state.cp,
        &mut tx,
        &cluster,
        &created,
        &current_user.user,
        request.target,
    )
    .await?;

    let created = deployment::get(&mut tx, created.id).await?;
    let view = to_view(&mut tx, &cluster, created).await?;
    tx.commit().await?;
    let _ = deployed.spawn_status_sync(&state.cp);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_deployments(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, cluster_name)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<DeploymentView>>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let cluster = find_cluster(&mut conn, &org, &cluster_name).await?;
    let opt = ListDeploymentOption {
        base: query.list_options(),
        cluster_id: Some(cluster.id),
        status: None,
        label_filters: query.label_filters()?,
    };
    let (items, total) = deployment::list(&mut conn, &opt).await?;
    let mut views = Vec::with_capacity(items.len());
    for item in items {
        views.push(to_view(&mut conn, &cluster, item).await?);
    }
    Ok(Json(ListResponse::new(&opt.base, total, views)))
}

async fn get_deployment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, cluster_name, name)): Path<(String, String, String)>,
) -> Result<Json<DeploymentView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let cluster = find_cluster(&mut conn, &org, &cluster_name).await?;
    let found = deployment::get_by_name(&mut conn, cluster.id, &name).await?;
    Ok(Json(to_view(&mut conn, &cluster, found).await?))
}

/// Point the deployment at a new target and redeploy.
async fn update_deployment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((org, cluster_name, name)): Path<(String, String, String)>,
    Json(request): Json<UpdateDeploymentRequest>,
) -> Result<Json<DeploymentView>, AppError> {
    let mut tx = state.cp.pool.begin().await?;
    let cluster = find_cluster(&mut tx, &org, &cluster_name).await?;
    let found = deployment::get_by_name(&mut tx, cluster.id, &name).await?;

    let deployed = deploy_target(
        &state.cp,
        &mut tx,
        &cluster,
        &found,
        &current_user.user,
        request.target,
    )
    .await?;

    let found = deployment::get(&mut tx, found.id).await?;
    let view = to_view(&mut tx, &cluster, found).await?;
    tx.commit().await?;
    let _ = deployed.spawn_status_sync(&state.cp);
    Ok(Json(view))
}

/// Read the live resource status into the deployment.
async fn sync_status(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((org, cluster_name, name)): Path<(String, String, String)>,
) -> Result<Json<DeploymentView>, AppError> {
    let mut conn = state.cp.pool.acquire().await?;
    let cluster = find_cluster(&mut conn, &org, &cluster_name).await?;
    let mut found = deployment::get_by_name(&mut conn, cluster.id, &name).await?;
    deployment::sync_status(&state.cp, &mut conn, &mut found).await?;
    Ok(Json(to_view(&mut conn, &cluster, found).await?))
}
