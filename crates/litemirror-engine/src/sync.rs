use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use litemirror_core::config::Config;
use litemirror_core::mention::mentions_user;
use litemirror_core::read::TrackerRead;
use litemirror_core::types::{Comment, Story, StoryQuery};
use litemirror_store::comments::CommentRow;
use litemirror_store::snapshot::create_snapshot;
use litemirror_store::stories::StoryRow;
use litemirror_store::{CommentRepo, Database, StoryRepo};

/// Workflow states pulled on every sync pass, in fetch order.
pub const SYNC_STATES: [&str; 5] = ["started", "unstarted", "delivered", "accepted", "rejected"];

const STORIES_PER_STATE: u32 = 200;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub stories: u64,
    pub mine: u64,
    pub comments: u64,
}

/// Pulls remote stories and comments into the local mirror. Every per-item
/// failure is logged and skipped; a sync pass never aborts as a whole.
pub struct SyncEngine {
    tracker: Arc<dyn TrackerRead>,
    stories: StoryRepo,
    comments: CommentRepo,
    db: Database,
    snapshot_path: PathBuf,
    user_id: i64,
    username: String,
    project_ids: Vec<i64>,
}

impl SyncEngine {
    pub fn new(tracker: Arc<dyn TrackerRead>, db: Database, config: &Config) -> Self {
        Self {
            tracker,
            stories: StoryRepo::new(db.clone()),
            comments: CommentRepo::new(db.clone()),
            db,
            snapshot_path: config.snapshot_path(),
            user_id: config.user_id,
            username: config.username.clone(),
            project_ids: config.project_ids.clone(),
        }
    }

    /// Mirror one project: all stories across the fixed state set, then the
    /// comments of every fetched story. Stories seen under more than one
    /// state filter are upserted more than once (idempotent by id), so
    /// `stories` can overcount; `mine` counts distinct story ids.
    #[instrument(skip(self))]
    pub async fn sync_project(&self, project_id: i64) -> SyncStats {
        let mut stats = SyncStats::default();

        let mut candidates: Vec<Story> = Vec::new();
        for state in SYNC_STATES {
            match self
                .tracker
                .stories(project_id, &StoryQuery::with_state(state, STORIES_PER_STATE))
                .await
            {
                Ok(batch) => candidates.extend(batch),
                Err(e) => {
                    error!(project_id, state, error = %e, "story fetch failed, skipping state")
                }
            }
        }

        let my_ids: HashSet<i64> = candidates
            .iter()
            .filter(|s| s.is_owned_by(self.user_id))
            .map(|s| s.id)
            .collect();

        for story in &candidates {
            let row = story_row(story, project_id, my_ids.contains(&story.id));
            if let Err(e) = self.stories.upsert(&row) {
                error!(story_id = story.id, error = %e, "story upsert failed");
                continue;
            }
            stats.stories += 1;
        }
        stats.mine = my_ids.len() as u64;

        for story in &candidates {
            let comments = match self.tracker.comments(project_id, story.id).await {
                Ok(comments) => comments,
                Err(e) => {
                    error!(story_id = story.id, error = %e, "comment fetch failed");
                    continue;
                }
            };
            for comment in &comments {
                let mentions = mentions_user(&comment.text, &self.username);
                let row = comment_row(comment, story.id, project_id, mentions);
                if let Err(e) = self.comments.upsert(&row) {
                    error!(comment_id = comment.id, error = %e, "comment upsert failed");
                    continue;
                }
                stats.comments += 1;
                if mentions {
                    // Separate targeted update so a later story upsert in the
                    // same pass cannot overwrite the flag.
                    if let Err(e) = self.stories.mark_mentions_me(story.id) {
                        warn!(story_id = story.id, error = %e, "mention flag update failed");
                    }
                }
            }
        }

        stats
    }

    /// Sync every tracked project, then publish a fresh snapshot.
    pub async fn sync_all(&self) {
        info!("starting story sync");
        for project_id in self.project_ids.clone() {
            let stats = self.sync_project(project_id).await;
            info!(
                project_id,
                stories = stats.stories,
                mine = stats.mine,
                comments = stats.comments,
                "synced project"
            );
        }
        match create_snapshot(&self.db, &self.snapshot_path) {
            Ok(()) => info!("snapshot created"),
            Err(e) => error!(error = %e, "snapshot creation failed"),
        }
        info!("story sync complete");
    }
}

fn story_row(story: &Story, project_id: i64, is_mine: bool) -> StoryRow {
    let owner_names = story
        .owners
        .iter()
        .map(|o| o.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let label_names = story
        .labels
        .iter()
        .map(|l| l.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    StoryRow {
        id: story.id,
        project_id,
        title: story.title.clone(),
        description: none_if_empty(&story.description),
        story_type: none_if_empty(&story.story_type),
        current_state: none_if_empty(&story.current_state),
        estimate: story.estimate,
        priority: none_if_empty(&story.story_priority),
        url: none_if_empty(&story.url),
        requested_by_id: story.requested_by_id,
        owner_names: none_if_empty(&owner_names),
        label_names: none_if_empty(&label_names),
        is_mine,
        mentions_me: false,
        created_at: story.created_at.clone(),
        updated_at: story.updated_at.clone(),
    }
}

fn comment_row(comment: &Comment, story_id: i64, project_id: i64, mentions_me: bool) -> CommentRow {
    CommentRow {
        id: comment.id,
        story_id,
        project_id,
        text: none_if_empty(&comment.text),
        person_id: (comment.person_id != 0).then_some(comment.person_id),
        person_name: comment
            .person
            .as_ref()
            .and_then(|p| none_if_empty(&p.name)),
        mentions_me,
        created_at: comment.created_at.clone(),
    }
}

fn none_if_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTracker;
    use litemirror_core::types::{Label, Person, StoryOwner};
    use secrecy::SecretString;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            token: SecretString::from("t"),
            base_url: String::new(),
            web_url: String::new(),
            username: "alice".into(),
            email: String::new(),
            password: SecretString::from(""),
            user_id: 568,
            project_ids: vec![7],
            poll_interval: Duration::from_secs(300),
            data_dir: std::env::temp_dir(),
        }
    }

    fn owned_story(id: i64, state: &str) -> Story {
        Story {
            id,
            title: format!("story {id}"),
            current_state: state.into(),
            owners: vec![StoryOwner {
                id: 1,
                user_id: 568,
                name: "Alice".into(),
                initials: "A".into(),
            }],
            labels: vec![Label {
                id: 3,
                name: "backend".into(),
                kind: "label".into(),
            }],
            ..Story::default()
        }
    }

    fn other_story(id: i64, state: &str) -> Story {
        Story {
            id,
            title: format!("story {id}"),
            current_state: state.into(),
            owners: vec![StoryOwner {
                id: 2,
                user_id: 999,
                name: "Bob".into(),
                initials: "B".into(),
            }],
            ..Story::default()
        }
    }

    fn comment(id: i64, text: &str) -> Comment {
        Comment {
            id,
            text: text.into(),
            person_id: 999,
            person: Some(Person {
                id: 999,
                name: "Bob".into(),
                ..Person::default()
            }),
            created_at: "12 Feb 2026, 09:15AM".into(),
            ..Comment::default()
        }
    }

    fn engine(tracker: MockTracker) -> (SyncEngine, Database) {
        let db = Database::in_memory().unwrap();
        let engine = SyncEngine::new(Arc::new(tracker), db.clone(), &test_config());
        (engine, db)
    }

    #[tokio::test]
    async fn two_states_one_mine_with_mentioning_comment() {
        let tracker = MockTracker::new()
            .with_stories(7, "started", vec![owned_story(1, "started")])
            .with_stories(7, "unstarted", vec![other_story(2, "unstarted")])
            .with_comments(1, vec![comment(10, "hey @alice can you check this")]);
        let (engine, db) = engine(tracker);

        let stats = engine.sync_project(7).await;
        assert_eq!(
            stats,
            SyncStats {
                stories: 2,
                mine: 1,
                comments: 1
            }
        );

        let stories = StoryRepo::new(db.clone());
        let mine = stories.get(1).unwrap().unwrap();
        assert!(mine.is_mine);
        assert!(mine.mentions_me, "mentioning comment must flag the story");
        assert_eq!(mine.owner_names.as_deref(), Some("Alice"));
        assert_eq!(mine.label_names.as_deref(), Some("backend"));

        let theirs = stories.get(2).unwrap().unwrap();
        assert!(!theirs.is_mine);
        assert!(!theirs.mentions_me);

        let stored = CommentRepo::new(db).get(10).unwrap().unwrap();
        assert!(stored.mentions_me);
        assert_eq!(stored.person_name.as_deref(), Some("Bob"));
    }

    #[tokio::test]
    async fn state_fetch_failure_is_not_fatal() {
        let tracker = MockTracker::new()
            .failing_stories(7)
            .with_activities(7, vec![]);
        let (engine, _db) = engine(tracker);

        let stats = engine.sync_project(7).await;
        assert_eq!(stats, SyncStats::default());
    }

    #[tokio::test]
    async fn comment_fetch_failure_skips_only_that_story() {
        let tracker = MockTracker::new()
            .with_stories(
                7,
                "started",
                vec![owned_story(1, "started"), owned_story(2, "started")],
            )
            .failing_comments(1)
            .with_comments(2, vec![comment(11, "routine update")]);
        let (engine, _db) = engine(tracker);

        let stats = engine.sync_project(7).await;
        assert_eq!(stats.stories, 2);
        assert_eq!(stats.comments, 1);
    }

    #[tokio::test]
    async fn duplicate_story_across_states_stays_one_row() {
        let story = owned_story(1, "started");
        let tracker = MockTracker::new()
            .with_stories(7, "started", vec![story.clone()])
            .with_stories(7, "delivered", vec![story]);
        let (engine, db) = engine(tracker);

        let stats = engine.sync_project(7).await;
        // Upserted twice, counted twice, stored once.
        assert_eq!(stats.stories, 2);
        assert_eq!(stats.mine, 1);
        assert_eq!(StoryRepo::new(db).stats().unwrap().total_stories, 1);
    }

    #[tokio::test]
    async fn non_mentioning_comments_leave_flags_alone() {
        let tracker = MockTracker::new()
            .with_stories(7, "started", vec![owned_story(1, "started")])
            .with_comments(1, vec![comment(10, "shipped the fix")]);
        let (engine, db) = engine(tracker);

        let stats = engine.sync_project(7).await;
        assert_eq!(stats.comments, 1);
        assert!(!StoryRepo::new(db).get(1).unwrap().unwrap().mentions_me);
    }
}
