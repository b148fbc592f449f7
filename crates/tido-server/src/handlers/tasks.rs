use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use tido_core::{ListId, TaskId};
use tido_store::tasks::{ImportantTaskRow, ReorderItem, TaskPatch, TaskRepo, TaskRow};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::handlers::require_text;
use crate::server::AppState;

const TITLE_MAX: usize = 500;

#[derive(Debug, Deserialize)]
pub struct TaskPayload {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderPayload {
    pub items: Vec<ReorderItem>,
}

/// GET /lists/{id}/tasks — ordered by position.
pub async fn index(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
) -> Result<Json<Vec<TaskRow>>, ApiError> {
    let tasks = TaskRepo::new(state.db.clone()).list_for_list(user.id, list_id)?;
    Ok(Json(tasks))
}

/// POST /lists/{id}/tasks — append at the end of the list.
pub async fn create(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
    Json(body): Json<TaskPayload>,
) -> Result<(StatusCode, Json<TaskRow>), ApiError> {
    let title = require_text(&body.title, "title", TITLE_MAX)?;
    let task = TaskRepo::new(state.db.clone()).create(user.id, list_id, title)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /tasks/{id} — partial update; omitted fields are unchanged.
pub async fn update(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(mut patch): Json<TaskPatch>,
) -> Result<Json<TaskRow>, ApiError> {
    if let Some(title) = &patch.title {
        patch.title = Some(require_text(title, "title", TITLE_MAX)?.to_string());
    }
    let task = TaskRepo::new(state.db.clone()).update(user.id, task_id, &patch)?;
    Ok(Json(task))
}

/// DELETE /tasks/{id}
pub async fn remove(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> Result<StatusCode, ApiError> {
    TaskRepo::new(state.db.clone()).delete(user.id, task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /lists/{id}/tasks/reorder — transactional bulk position update.
/// Responds with the list's full task set in the new order.
pub async fn reorder(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
    Json(body): Json<ReorderPayload>,
) -> Result<Json<Vec<TaskRow>>, ApiError> {
    let mut ids: HashSet<TaskId> = HashSet::new();
    let mut positions: HashSet<i64> = HashSet::new();
    for item in &body.items {
        if !ids.insert(item.id) {
            return Err(ApiError::Validation(format!(
                "task {} appears more than once",
                item.id
            )));
        }
        if !positions.insert(item.position) {
            return Err(ApiError::Validation(format!(
                "position {} appears more than once",
                item.position
            )));
        }
    }

    let tasks = TaskRepo::new(state.db.clone()).reorder(user.id, list_id, &body.items)?;
    Ok(Json(tasks))
}

/// GET /tasks/important — cross-list view, newest first.
pub async fn important(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ImportantTaskRow>>, ApiError> {
    let tasks = TaskRepo::new(state.db.clone()).important_for_user(user.id)?;
    Ok(Json(tasks))
}
