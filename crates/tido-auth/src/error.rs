#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("hashing error: {0}")]
    Hash(String),

    #[error("token error: {0}")]
    Token(String),
}
