pub mod comments;
pub mod database;
pub mod error;
pub mod schema;
pub mod snapshot;
pub mod stories;
pub mod timefmt;

pub use comments::{CommentRepo, CommentRow};
pub use database::Database;
pub use error::StoreError;
pub use snapshot::{create_snapshot, SnapshotError};
pub use stories::{StoryRepo, StoryRow, StoryStats};
