use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use tido_core::ListId;
use tido_store::lists::{ListRepo, ListRow};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::handlers::require_text;
use crate::server::AppState;

const NAME_MAX: usize = 255;

#[derive(Debug, Deserialize)]
pub struct ListPayload {
    pub name: String,
}

/// GET /lists — the caller's lists, default first.
pub async fn index(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ListRow>>, ApiError> {
    let lists = ListRepo::new(state.db.clone()).list_for_user(user.id)?;
    Ok(Json(lists))
}

/// POST /lists
pub async fn create(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<ListPayload>,
) -> Result<(StatusCode, Json<ListRow>), ApiError> {
    let name = require_text(&body.name, "name", NAME_MAX)?;
    let list = ListRepo::new(state.db.clone()).create(user.id, name)?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// PUT /lists/{id} — rename; 403 for the default list.
pub async fn rename(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
    Json(body): Json<ListPayload>,
) -> Result<Json<ListRow>, ApiError> {
    let name = require_text(&body.name, "name", NAME_MAX)?;
    let list = ListRepo::new(state.db.clone()).rename(user.id, list_id, name)?;
    Ok(Json(list))
}

/// DELETE /lists/{id} — delete with task cascade; 403 for the default list.
pub async fn remove(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(list_id): Path<ListId>,
) -> Result<StatusCode, ApiError> {
    ListRepo::new(state.db.clone()).delete(user.id, list_id)?;
    Ok(StatusCode::NO_CONTENT)
}
