pub mod ids;

pub use ids::{ListId, TaskId, UserId};
