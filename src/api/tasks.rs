//! Task endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{error_response, ApiResult, AppState};
use crate::completion;
use crate::error::TaskError;
use crate::models::{NewTask, Task, TaskFilter, TaskPatch};
use crate::storage::TaskStore;
use crate::tasks as task_ops;

/// Create task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
        .route("/:id/complete", post(complete_task))
}

/// GET /tasks - List tasks, soonest due first.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TaskFilter>,
) -> Json<Vec<Task>> {
    Json(state.store.list_tasks(&filter))
}

/// POST /tasks - Create a task.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTask>,
) -> ApiResult<Json<Task>> {
    task_ops::create_task(&state.store, state.clock.as_ref(), req)
        .map(Json)
        .map_err(error_response)
}

/// GET /tasks/:id - Get one task.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Task>> {
    state
        .store
        .get_task(id)
        .map(Json)
        .map_err(|e| error_response(e.into()))
}

/// PUT /tasks/:id - Update the supplied fields of a task.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<Task>> {
    task_ops::edit_task(&state.store, state.clock.as_ref(), id, patch)
        .map(Json)
        .map_err(error_response)
}

/// DELETE /tasks/:id - Delete a task.
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_task(id)
        .map(|_| {
            tracing::info!(task_id = id, "task deleted");
            StatusCode::OK
        })
        .map_err(|e| error_response(e.into()))
}

/// POST /tasks/:id/complete - Close the task, or move a recurring task to its
/// next due date.
///
/// A recurrence that cannot be evaluated here is a server-side failure: the
/// task was accepted earlier, so the stored data is at fault, not the request.
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    match completion::complete_task(&state.store, state.clock.as_ref(), id) {
        Ok(_) => Ok(StatusCode::OK),
        Err(e @ TaskError::InvalidRecurrence(_)) => {
            tracing::error!(task_id = id, error = %e, "failed to compute next due date");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
        Err(e) => Err(error_response(e)),
    }
}
