use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::timefmt;

/// Incoming story state from a sync pass. Timestamps are still in the
/// remote's textual format; the upsert normalizes them.
#[derive(Clone, Debug, Default)]
pub struct StoryRow {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub story_type: Option<String>,
    pub current_state: Option<String>,
    pub estimate: Option<i64>,
    pub priority: Option<String>,
    pub url: Option<String>,
    pub requested_by_id: Option<i64>,
    pub owner_names: Option<String>,
    pub label_names: Option<String>,
    pub is_mine: bool,
    pub mentions_me: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A story as stored, timestamps normalized.
#[derive(Clone, Debug, Serialize)]
pub struct StoredStory {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub story_type: Option<String>,
    pub current_state: Option<String>,
    pub estimate: Option<i64>,
    pub priority: Option<String>,
    pub url: Option<String>,
    pub owner_names: Option<String>,
    pub label_names: Option<String>,
    pub is_mine: bool,
    pub mentions_me: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub synced_at: String,
}

/// Row shape shared by the my_stories / my_active_stories views.
#[derive(Clone, Debug, Serialize)]
pub struct StorySummary {
    pub id: i64,
    pub title: String,
    pub story_type: Option<String>,
    pub current_state: Option<String>,
    pub estimate: Option<i64>,
    pub priority: Option<String>,
    pub owner_names: Option<String>,
    pub label_names: Option<String>,
    pub url: Option<String>,
    pub mentions_me: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MentionedStory {
    pub id: i64,
    pub title: String,
    pub current_state: Option<String>,
    pub owner_names: Option<String>,
    pub is_mine: bool,
    pub updated_at: Option<String>,
    pub mention_count: i64,
}

/// Aggregate counts from the story_stats view.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StoryStats {
    pub total_stories: i64,
    pub my_stories: i64,
    pub stories_with_mentions: i64,
    pub started: i64,
    pub unstarted: i64,
    pub delivered: i64,
    pub accepted: i64,
    pub rejected: i64,
}

pub struct StoryRepo {
    db: Database,
}

impl StoryRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or update by remote id. Every scalar takes the incoming value;
    /// mentions_me becomes existing OR incoming and never clears. The OR is
    /// computed here at the store boundary, not in SQL.
    #[instrument(skip(self, row), fields(story_id = row.id))]
    pub fn upsert(&self, row: &StoryRow) -> Result<(), StoreError> {
        let synced_at = Utc::now().to_rfc3339();
        let created_at = timefmt::parse_remote_timestamp(&row.created_at);
        let updated_at = timefmt::parse_remote_timestamp(&row.updated_at);

        self.db.with_conn(|conn| {
            let existing: Option<bool> = conn
                .query_row(
                    "SELECT mentions_me FROM stories WHERE id = ?1",
                    [row.id],
                    |r| r.get(0),
                )
                .optional()?;
            let mentions_me = row.mentions_me || existing.unwrap_or(false);

            conn.execute(
                "INSERT INTO stories (id, project_id, title, description, story_type, current_state,
                     estimate, priority, url, requested_by_id, owner_names, label_names,
                     is_mine, mentions_me, created_at, updated_at, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                 ON CONFLICT(id) DO UPDATE SET
                     project_id = excluded.project_id,
                     title = excluded.title,
                     description = excluded.description,
                     story_type = excluded.story_type,
                     current_state = excluded.current_state,
                     estimate = excluded.estimate,
                     priority = excluded.priority,
                     url = excluded.url,
                     requested_by_id = excluded.requested_by_id,
                     owner_names = excluded.owner_names,
                     label_names = excluded.label_names,
                     is_mine = excluded.is_mine,
                     mentions_me = excluded.mentions_me,
                     created_at = excluded.created_at,
                     updated_at = excluded.updated_at,
                     synced_at = excluded.synced_at",
                params![
                    row.id,
                    row.project_id,
                    row.title,
                    row.description,
                    row.story_type,
                    row.current_state,
                    row.estimate,
                    row.priority,
                    row.url,
                    row.requested_by_id,
                    row.owner_names,
                    row.label_names,
                    row.is_mine,
                    mentions_me,
                    created_at,
                    updated_at,
                    synced_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Force the mention flag on, independent of any story upsert in the same
    /// pass.
    pub fn mark_mentions_me(&self, story_id: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE stories SET mentions_me = 1 WHERE id = ?1",
                [story_id],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, story_id: i64) -> Result<Option<StoredStory>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, project_id, title, description, story_type, current_state,
                        estimate, priority, url, owner_names, label_names,
                        is_mine, mentions_me, created_at, updated_at, synced_at
                 FROM stories WHERE id = ?1",
                [story_id],
                |row| {
                    Ok(StoredStory {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                        story_type: row.get(4)?,
                        current_state: row.get(5)?,
                        estimate: row.get(6)?,
                        priority: row.get(7)?,
                        url: row.get(8)?,
                        owner_names: row.get(9)?,
                        label_names: row.get(10)?,
                        is_mine: row.get(11)?,
                        mentions_me: row.get(12)?,
                        created_at: row.get(13)?,
                        updated_at: row.get(14)?,
                        synced_at: row.get(15)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
    }

    pub fn my_stories(&self) -> Result<Vec<StorySummary>, StoreError> {
        self.summaries("SELECT id, title, story_type, current_state, estimate, priority, owner_names, label_names, url, mentions_me, created_at, updated_at FROM my_stories")
    }

    pub fn my_active_stories(&self) -> Result<Vec<StorySummary>, StoreError> {
        self.summaries("SELECT id, title, story_type, current_state, estimate, priority, owner_names, label_names, url, mentions_me, created_at, updated_at FROM my_active_stories")
    }

    pub fn mentioning_me(&self) -> Result<Vec<MentionedStory>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, current_state, owner_names, is_mine, updated_at, mention_count
                 FROM stories_mentioning_me",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(MentionedStory {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    current_state: row.get(2)?,
                    owner_names: row.get(3)?,
                    is_mine: row.get(4)?,
                    updated_at: row.get(5)?,
                    mention_count: row.get(6)?,
                })
            })?;
            rows.collect::<Result<_, _>>().map_err(StoreError::from)
        })
    }

    pub fn stats(&self) -> Result<StoryStats, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT total_stories, my_stories, stories_with_mentions,
                        started, unstarted, delivered, accepted, rejected
                 FROM story_stats",
                [],
                |row| {
                    Ok(StoryStats {
                        total_stories: row.get(0)?,
                        my_stories: row.get(1)?,
                        stories_with_mentions: row.get(2)?,
                        started: row.get(3)?,
                        unstarted: row.get(4)?,
                        delivered: row.get(5)?,
                        accepted: row.get(6)?,
                        rejected: row.get(7)?,
                    })
                },
            )
            .map_err(StoreError::from)
        })
    }

    fn summaries(&self, sql: &str) -> Result<Vec<StorySummary>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], |row| {
                Ok(StorySummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    story_type: row.get(2)?,
                    current_state: row.get(3)?,
                    estimate: row.get(4)?,
                    priority: row.get(5)?,
                    owner_names: row.get(6)?,
                    label_names: row.get(7)?,
                    url: row.get(8)?,
                    mentions_me: row.get(9)?,
                    created_at: row.get(10)?,
                    updated_at: row.get(11)?,
                })
            })?;
            rows.collect::<Result<_, _>>().map_err(StoreError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> StoryRepo {
        StoryRepo::new(Database::in_memory().unwrap())
    }

    fn row(id: i64) -> StoryRow {
        StoryRow {
            id,
            project_id: 7,
            title: format!("story {id}"),
            current_state: Some("started".into()),
            created_at: "11 Feb 2026, 04:30AM".into(),
            updated_at: "12 Feb 2026, 09:15AM".into(),
            ..StoryRow::default()
        }
    }

    #[test]
    fn second_upsert_overwrites_scalars() {
        let repo = repo();
        repo.upsert(&row(1)).unwrap();

        let mut updated = row(1);
        updated.title = "renamed".into();
        updated.current_state = Some("delivered".into());
        updated.estimate = Some(3);
        repo.upsert(&updated).unwrap();

        let stored = repo.get(1).unwrap().unwrap();
        assert_eq!(stored.title, "renamed");
        assert_eq!(stored.current_state.as_deref(), Some("delivered"));
        assert_eq!(stored.estimate, Some(3));
        assert_eq!(repo.stats().unwrap().total_stories, 1);
    }

    #[test]
    fn mentions_me_is_monotonic() {
        let repo = repo();
        let mut first = row(1);
        first.mentions_me = true;
        repo.upsert(&first).unwrap();

        let mut second = row(1);
        second.mentions_me = false;
        repo.upsert(&second).unwrap();

        assert!(repo.get(1).unwrap().unwrap().mentions_me, "flag must not clear");
    }

    #[test]
    fn mark_mentions_me_survives_later_upsert() {
        let repo = repo();
        repo.upsert(&row(1)).unwrap();
        repo.mark_mentions_me(1).unwrap();

        // A later pass that sees no mentioning comment must not clear it.
        repo.upsert(&row(1)).unwrap();
        assert!(repo.get(1).unwrap().unwrap().mentions_me);
    }

    #[test]
    fn timestamps_normalized_or_null() {
        let repo = repo();
        repo.upsert(&row(1)).unwrap();
        let stored = repo.get(1).unwrap().unwrap();
        assert_eq!(stored.created_at.as_deref(), Some("2026-02-11T04:30:00+00:00"));
        assert!(!stored.synced_at.is_empty());

        let mut bad = row(2);
        bad.created_at = "not a date".into();
        bad.updated_at = String::new();
        repo.upsert(&bad).unwrap();
        let stored = repo.get(2).unwrap().unwrap();
        assert_eq!(stored.created_at, None);
        assert_eq!(stored.updated_at, None);
    }

    #[test]
    fn my_views_filter_by_ownership_and_state() {
        let repo = repo();
        let mut mine = row(1);
        mine.is_mine = true;
        repo.upsert(&mine).unwrap();

        let mut mine_done = row(2);
        mine_done.is_mine = true;
        mine_done.current_state = Some("accepted".into());
        repo.upsert(&mine_done).unwrap();

        repo.upsert(&row(3)).unwrap();

        assert_eq!(repo.my_stories().unwrap().len(), 2);
        let active = repo.my_active_stories().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
    }

    #[test]
    fn stats_count_per_state() {
        let repo = repo();
        let mut mine = row(1);
        mine.is_mine = true;
        repo.upsert(&mine).unwrap();

        let mut delivered = row(2);
        delivered.current_state = Some("delivered".into());
        repo.upsert(&delivered).unwrap();

        let stats = repo.stats().unwrap();
        assert_eq!(stats.total_stories, 2);
        assert_eq!(stats.my_stories, 1);
        assert_eq!(stats.started, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.rejected, 0);
    }
}
