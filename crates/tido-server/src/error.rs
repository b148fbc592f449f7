use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use tido_auth::AuthError;
use tido_store::StoreError;

/// API-facing error. Ownership failures are collapsed into NotFound so
/// responses never reveal whether another user's resource exists.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("missing credential")]
    MissingCredential,

    #[error("invalid or expired credential")]
    InvalidCredential,

    #[error("{0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential | Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Protected(msg) => Self::Forbidden(msg),
            other => {
                tracing::error!(error = %other, "store failure");
                Self::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken => Self::InvalidCredential,
            other => {
                tracing::error!(error = %other, "auth failure");
                Self::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::MissingCredential.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCredential.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn ownership_miss_becomes_not_found() {
        let err: ApiError = StoreError::NotFound("list 9".into()).into();
        assert!(matches!(err, ApiError::NotFound));
        // Detail is dropped; the body says only "not found".
        assert_eq!(err.to_string(), "not found");
    }

    #[test]
    fn internal_detail_is_opaque() {
        let err: ApiError = StoreError::Database("disk I/O error".into()).into();
        assert_eq!(err.to_string(), "internal error");
    }

    #[test]
    fn protected_becomes_forbidden() {
        let err: ApiError = StoreError::Protected("the default list cannot be deleted".into()).into();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
