use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use litemirror_core::error::ApiError;
use litemirror_core::read::TrackerRead;
use litemirror_core::types::{Activity, Comment, Me, NewStory, Project, Story, StoryQuery};

/// Canned tracker for deterministic tests without network access: fixed
/// stories per (project, state), comments per story, activities per project,
/// plus per-target failure injection. Activity fetches are recorded so tests
/// can assert which cursor was used.
#[derive(Default)]
pub struct MockTracker {
    stories: HashMap<(i64, String), Vec<Story>>,
    comments: HashMap<i64, Vec<Comment>>,
    activities: HashMap<i64, Vec<Activity>>,
    fail_stories: HashSet<i64>,
    fail_comments: HashSet<i64>,
    fail_activity: HashSet<i64>,
    activity_fetches: Mutex<Vec<(i64, String)>>,
}

impl MockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stories(mut self, project_id: i64, state: &str, stories: Vec<Story>) -> Self {
        self.stories.insert((project_id, state.to_string()), stories);
        self
    }

    pub fn with_comments(mut self, story_id: i64, comments: Vec<Comment>) -> Self {
        self.comments.insert(story_id, comments);
        self
    }

    pub fn with_activities(mut self, project_id: i64, activities: Vec<Activity>) -> Self {
        self.activities.insert(project_id, activities);
        self
    }

    /// Every story fetch for this project fails.
    pub fn failing_stories(mut self, project_id: i64) -> Self {
        self.fail_stories.insert(project_id);
        self
    }

    /// Every comment fetch for this story fails.
    pub fn failing_comments(mut self, story_id: i64) -> Self {
        self.fail_comments.insert(story_id);
        self
    }

    /// Every activity fetch for this project fails.
    pub fn failing_activity(mut self, project_id: i64) -> Self {
        self.fail_activity.insert(project_id);
        self
    }

    /// (project_id, occurred_after) of every activity fetch so far.
    pub fn activity_fetches(&self) -> Vec<(i64, String)> {
        self.activity_fetches.lock().clone()
    }
}

#[async_trait]
impl TrackerRead for MockTracker {
    async fn me(&self) -> Result<Me, ApiError> {
        Ok(Me {
            id: 568,
            username: "alice".into(),
            ..Me::default()
        })
    }

    async fn projects(&self) -> Result<Vec<Project>, ApiError> {
        Ok(Vec::new())
    }

    async fn stories(&self, project_id: i64, query: &StoryQuery) -> Result<Vec<Story>, ApiError> {
        if self.fail_stories.contains(&project_id) {
            return Err(ApiError::Transport("connection reset".into()));
        }
        let state = query.state.clone().unwrap_or_default();
        Ok(self
            .stories
            .get(&(project_id, state))
            .cloned()
            .unwrap_or_default())
    }

    async fn story(&self, _project_id: i64, story_id: i64) -> Result<Story, ApiError> {
        self.stories
            .values()
            .flatten()
            .find(|s| s.id == story_id)
            .cloned()
            .ok_or_else(|| ApiError::from_status(404, "story not found"))
    }

    async fn comments(&self, _project_id: i64, story_id: i64) -> Result<Vec<Comment>, ApiError> {
        if self.fail_comments.contains(&story_id) {
            return Err(ApiError::Transport("connection reset".into()));
        }
        Ok(self.comments.get(&story_id).cloned().unwrap_or_default())
    }

    async fn activity_since(
        &self,
        project_id: i64,
        occurred_after: &str,
    ) -> Result<Vec<Activity>, ApiError> {
        self.activity_fetches
            .lock()
            .push((project_id, occurred_after.to_string()));
        if self.fail_activity.contains(&project_id) {
            return Err(ApiError::Transport("connection reset".into()));
        }
        Ok(self.activities.get(&project_id).cloned().unwrap_or_default())
    }

    async fn create_story(&self, _project_id: i64, story: &NewStory) -> Result<Story, ApiError> {
        Ok(Story {
            id: 1,
            title: story.name.clone(),
            ..Story::default()
        })
    }
}
