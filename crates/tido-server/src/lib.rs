pub mod error;
pub mod extract;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use extract::CurrentUser;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
