use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::timefmt;

/// Incoming comment state from a sync pass.
#[derive(Clone, Debug, Default)]
pub struct CommentRow {
    pub id: i64,
    pub story_id: i64,
    pub project_id: i64,
    pub text: Option<String>,
    pub person_id: Option<i64>,
    pub person_name: Option<String>,
    pub mentions_me: bool,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct StoredComment {
    pub id: i64,
    pub story_id: i64,
    pub project_id: i64,
    pub text: Option<String>,
    pub person_id: Option<i64>,
    pub person_name: Option<String>,
    pub mentions_me: bool,
    pub created_at: Option<String>,
    pub synced_at: String,
}

/// Row shape of the recent_comments view (joined with the story title).
#[derive(Clone, Debug, Serialize)]
pub struct RecentComment {
    pub id: i64,
    pub story_id: i64,
    pub story_title: String,
    pub person_name: Option<String>,
    pub text: Option<String>,
    pub mentions_me: bool,
    pub created_at: Option<String>,
}

pub struct CommentRepo {
    db: Database,
}

impl CommentRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or update by remote id, with the same monotonic mentions_me
    /// rule as stories. created_at stays as first seen; comments do not move.
    #[instrument(skip(self, row), fields(comment_id = row.id))]
    pub fn upsert(&self, row: &CommentRow) -> Result<(), StoreError> {
        let synced_at = Utc::now().to_rfc3339();
        let created_at = timefmt::parse_remote_timestamp(&row.created_at);

        self.db.with_conn(|conn| {
            let existing: Option<bool> = conn
                .query_row(
                    "SELECT mentions_me FROM comments WHERE id = ?1",
                    [row.id],
                    |r| r.get(0),
                )
                .optional()?;
            let mentions_me = row.mentions_me || existing.unwrap_or(false);

            conn.execute(
                "INSERT INTO comments (id, story_id, project_id, text, person_id, person_name,
                     mentions_me, created_at, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                     text = excluded.text,
                     person_id = excluded.person_id,
                     person_name = excluded.person_name,
                     mentions_me = excluded.mentions_me,
                     synced_at = excluded.synced_at",
                params![
                    row.id,
                    row.story_id,
                    row.project_id,
                    row.text,
                    row.person_id,
                    row.person_name,
                    mentions_me,
                    created_at,
                    synced_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, comment_id: i64) -> Result<Option<StoredComment>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, story_id, project_id, text, person_id, person_name,
                        mentions_me, created_at, synced_at
                 FROM comments WHERE id = ?1",
                [comment_id],
                |row| {
                    Ok(StoredComment {
                        id: row.get(0)?,
                        story_id: row.get(1)?,
                        project_id: row.get(2)?,
                        text: row.get(3)?,
                        person_id: row.get(4)?,
                        person_name: row.get(5)?,
                        mentions_me: row.get(6)?,
                        created_at: row.get(7)?,
                        synced_at: row.get(8)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
    }

    /// Newest comments first, joined with their story titles.
    pub fn recent(&self, limit: u32) -> Result<Vec<RecentComment>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, story_id, story_title, person_name, text, mentions_me, created_at
                 FROM recent_comments LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit], |row| {
                Ok(RecentComment {
                    id: row.get(0)?,
                    story_id: row.get(1)?,
                    story_title: row.get(2)?,
                    person_name: row.get(3)?,
                    text: row.get(4)?,
                    mentions_me: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?;
            rows.collect::<Result<_, _>>().map_err(StoreError::from)
        })
    }
}
