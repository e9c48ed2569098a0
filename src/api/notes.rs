//! Note endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use super::{error_response, ApiResult, AppState};
use crate::error::TaskError;
use crate::models::Note;

/// Create note routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notes).post(create_note))
        .route("/:id", put(update_note).delete(delete_note))
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteQuery {
    pub task_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
    #[serde(default)]
    pub task_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub content: String,
}

fn non_empty(content: String) -> ApiResult<String> {
    if content.trim().is_empty() {
        return Err(error_response(TaskError::Invalid("note content must not be empty".into())));
    }
    Ok(content)
}

/// GET /notes - List notes, optionally for one task.
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NoteQuery>,
) -> Json<Vec<Note>> {
    Json(state.store.list_notes(query.task_id))
}

/// POST /notes - Create a note.
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<Json<Note>> {
    let content = non_empty(req.content)?;
    state
        .store
        .create_note(content, req.task_id, state.clock.now())
        .map(Json)
        .map_err(|e| error_response(e.into()))
}

/// PUT /notes/:id - Replace a note's content.
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<UpdateNoteRequest>,
) -> ApiResult<Json<Note>> {
    let content = non_empty(req.content)?;
    state
        .store
        .update_note(id, content)
        .map(Json)
        .map_err(|e| error_response(e.into()))
}

/// DELETE /notes/:id - Delete a note.
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_note(id)
        .map(|_| StatusCode::OK)
        .map_err(|e| error_response(e.into()))
}
