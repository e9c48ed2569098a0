//! Project endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use super::{error_response, ApiResult, AppState};
use crate::error::TaskError;
use crate::models::Project;

/// Create project routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/:id", put(rename_project).delete(delete_project))
}

#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub name: String,
}

impl ProjectRequest {
    fn validated_name(self) -> ApiResult<String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(error_response(TaskError::Invalid("project name must not be empty".into())));
        }
        Ok(name)
    }
}

/// GET /projects - List projects by name.
pub async fn list_projects(State(state): State<Arc<AppState>>) -> Json<Vec<Project>> {
    Json(state.store.list_projects())
}

/// POST /projects - Create a project.
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    let name = req.validated_name()?;
    let project = state
        .store
        .create_project(name)
        .map_err(|e| error_response(e.into()))?;
    tracing::info!(project_id = project.id, "project created");
    Ok(Json(project))
}

/// PUT /projects/:id - Rename a project.
pub async fn rename_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    let name = req.validated_name()?;
    state
        .store
        .rename_project(id, name)
        .map(Json)
        .map_err(|e| error_response(e.into()))
}

/// DELETE /projects/:id - Delete a project; its tasks lose their project.
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_project(id)
        .map(|_| {
            tracing::info!(project_id = id, "project deleted");
            StatusCode::OK
        })
        .map_err(|e| error_response(e.into()))
}
