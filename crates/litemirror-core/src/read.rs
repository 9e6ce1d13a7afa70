use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{Activity, Comment, Me, NewStory, Project, Story, StoryQuery};

/// The read-only surface of the remote tracker, as the sync engine and poll
/// loop consume it. The production implementation lives in `litemirror-api`;
/// tests substitute a mock.
#[async_trait]
pub trait TrackerRead: Send + Sync {
    async fn me(&self) -> Result<Me, ApiError>;

    async fn projects(&self) -> Result<Vec<Project>, ApiError>;

    async fn stories(&self, project_id: i64, query: &StoryQuery) -> Result<Vec<Story>, ApiError>;

    async fn story(&self, project_id: i64, story_id: i64) -> Result<Story, ApiError>;

    async fn comments(&self, project_id: i64, story_id: i64) -> Result<Vec<Comment>, ApiError>;

    /// Activity strictly after the given timestamp. Whether an activity
    /// stamped exactly at the boundary is included is the remote's choice.
    async fn activity_since(
        &self,
        project_id: i64,
        occurred_after: &str,
    ) -> Result<Vec<Activity>, ApiError>;

    async fn create_story(&self, project_id: i64, story: &NewStory) -> Result<Story, ApiError>;
}
