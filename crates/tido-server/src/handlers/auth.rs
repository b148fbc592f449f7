use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use tido_auth::password;
use tido_core::UserId;
use tido_store::lists::ListRepo;
use tido_store::users::UserRepo;
use tido_store::StoreError;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::handlers::require_text;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: Identity,
}

/// POST /auth/register — create the user and their default list, return
/// a token. The duplicate check runs before the password is hashed.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let username = require_text(&body.username, "username", 255)?;
    if body.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".into()));
    }

    let users = UserRepo::new(state.db.clone());
    if users.username_taken(username)? {
        return Err(ApiError::Conflict(format!(
            "username \"{username}\" is taken"
        )));
    }

    let hash = password::hash_password(&body.password)?;
    let user = users.create(username, &hash)?;
    ListRepo::new(state.db.clone()).create_default(user.id)?;

    let token = state.keys.issue(user.id, &user.username)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token,
            user: Identity {
                id: user.id,
                username: user.username,
            },
        }),
    ))
}

/// POST /auth/login — verify credentials, return a fresh token.
/// Unknown usernames and wrong passwords are indistinguishable.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let users = UserRepo::new(state.db.clone());
    let user = match users.find_by_username(body.username.trim()) {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => return Err(ApiError::InvalidCredential),
        Err(other) => return Err(other.into()),
    };

    if !password::verify_password(&body.password, &user.password_hash)? {
        return Err(ApiError::InvalidCredential);
    }

    let token = state.keys.issue(user.id, &user.username)?;
    Ok(Json(TokenResponse {
        token,
        user: Identity {
            id: user.id,
            username: user.username,
        },
    }))
}

/// GET /auth/me — echo the identity carried by the token.
pub async fn me(user: CurrentUser) -> Json<Identity> {
    Json(Identity {
        id: user.id,
        username: user.username,
    })
}
