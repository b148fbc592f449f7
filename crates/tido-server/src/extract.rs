use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use tido_auth::TokenKeys;
use tido_core::UserId;

use crate::error::ApiError;

/// Identity decoded from the bearer token. No database lookup happens
/// here; the claims are trusted until the token expires.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    TokenKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(ApiError::MissingCredential)?;
        let value = header.to_str().map_err(|_| ApiError::InvalidCredential)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(ApiError::InvalidCredential)?;

        let keys = TokenKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| ApiError::InvalidCredential)?;

        Ok(Self {
            id: claims.sub,
            username: claims.username,
        })
    }
}
