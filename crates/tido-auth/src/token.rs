use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use tido_core::UserId;

use crate::error::AuthError;

/// Fixed token lifetime. Tokens are not refreshed.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// JWT payload. The identity here is trusted between verifications; no
/// database lookup happens per request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing/verification keys derived from a shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token for a user, expiring in [`TOKEN_TTL_DAYS`].
    pub fn issue(&self, user_id: UserId, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Verify signature and expiry. All failure modes collapse into the
    /// same error so callers cannot distinguish a bad signature from an
    /// expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::from_secret(b"test-secret")
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = keys();
        let token = keys.issue(UserId::from_raw(7), "alice").unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, UserId::from_raw(7));
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = keys().issue(UserId::from_raw(7), "alice").unwrap();
        let other = TokenKeys::from_secret(b"different-secret");
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_token_rejected() {
        assert!(matches!(
            keys().verify("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_rejected_with_same_error() {
        let keys = keys();
        let now = Utc::now();
        let claims = Claims {
            sub: UserId::from_raw(1),
            username: "alice".into(),
            iat: (now - Duration::days(8)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
        };
        let token =
            jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken)));
    }
}
