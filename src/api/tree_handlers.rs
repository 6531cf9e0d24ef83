//! Project, node and edge handlers

use super::handlers::{AppError, AppState, OkResponse};
use crate::question::QuestionOutcome;
use crate::tree::models::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Token cancelled when the handler future completes or is dropped
/// (client disconnect), so in-flight oracle calls stop with it.
fn request_token() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

// ============================================================================
// Projects
// ============================================================================

/// Create a project and its root node
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<TreeResponse>), AppError> {
    let tree = state.manager.create_project(req).await?;
    Ok((StatusCode::CREATED, Json(tree)))
}

/// List projects
pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.manager.list_projects().await?))
}

/// Get a project
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.manager.get_project(project_id).await?))
}

/// Update a project's title, description or archived state
pub async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<OkResponse>, AppError> {
    state.manager.update_project(project_id, req).await?;
    Ok(OkResponse::ok())
}

/// Mark a project as saved
pub async fn save_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<OkResponse>, AppError> {
    state.manager.save_project(project_id).await?;
    Ok(OkResponse::ok())
}

/// Get a project's tree
pub async fn get_tree(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<TreeResponse>, AppError> {
    Ok(Json(state.manager.get_tree(project_id).await?))
}

// ============================================================================
// Nodes
// ============================================================================

/// Create a node; children receive a follow-up question
pub async fn create_node(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<CreatedNode>), AppError> {
    let (cancel, _guard) = request_token();
    let created = state.manager.create_node(project_id, req, &cancel).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update node content
pub async fn update_node(
    State(state): State<AppState>,
    Path((project_id, node_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateNodeRequest>,
) -> Result<Json<OkResponse>, AppError> {
    state.manager.update_node(project_id, node_id, req).await?;
    Ok(OkResponse::ok())
}

/// Soft-delete a node and its descendants
pub async fn delete_node(
    State(state): State<AppState>,
    Path((project_id, node_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<OkResponse>, AppError> {
    state.manager.delete_node(project_id, node_id).await?;
    Ok(OkResponse::ok())
}

/// Preview the question a new child of this node would receive
pub async fn preview_question(
    State(state): State<AppState>,
    Path((project_id, node_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QuestionOutcome>, AppError> {
    let (cancel, _guard) = request_token();
    let outcome = state
        .manager
        .preview_question(project_id, node_id, &cancel)
        .await?;
    Ok(Json(outcome))
}

// ============================================================================
// Edges
// ============================================================================

/// Update an edge's relation or label
pub async fn update_edge(
    State(state): State<AppState>,
    Path((project_id, edge_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateEdgeRequest>,
) -> Result<Json<OkResponse>, AppError> {
    state.manager.update_edge(project_id, edge_id, req).await?;
    Ok(OkResponse::ok())
}

/// Reorder the children of one parent
pub async fn reorder(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<OkResponse>, AppError> {
    state.manager.reorder(project_id, req).await?;
    Ok(OkResponse::ok())
}
