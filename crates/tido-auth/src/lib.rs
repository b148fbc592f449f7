pub mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, TokenKeys};
