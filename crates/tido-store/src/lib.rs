pub mod database;
pub mod error;
pub mod lists;
pub mod row_helpers;
pub mod schema;
pub mod tasks;
pub mod users;

pub use database::Database;
pub use error::StoreError;
