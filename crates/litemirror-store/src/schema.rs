/// SQL DDL for the mirror store. The mirror is rebuildable from the remote,
/// so schema migration is drop-and-recreate when the stored version is behind.
pub const SCHEMA_VERSION: i64 = 2;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

pub const DROP_TABLES: &str = r#"
DROP TABLE IF EXISTS comments;
DROP TABLE IF EXISTS stories;
DROP TABLE IF EXISTS schema_version;
"#;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS stories (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    story_type TEXT,
    current_state TEXT,
    estimate INTEGER,
    priority TEXT,
    url TEXT,
    requested_by_id INTEGER,
    owner_names TEXT,
    label_names TEXT,
    is_mine INTEGER NOT NULL DEFAULT 0,
    mentions_me INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT,
    synced_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY,
    story_id INTEGER NOT NULL,
    project_id INTEGER NOT NULL,
    text TEXT,
    person_id INTEGER,
    person_name TEXT,
    mentions_me INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    synced_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stories_mine ON stories(is_mine);
CREATE INDEX IF NOT EXISTS idx_stories_state ON stories(current_state);
CREATE INDEX IF NOT EXISTS idx_stories_project ON stories(project_id);
CREATE INDEX IF NOT EXISTS idx_stories_updated ON stories(updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_stories_mine_state ON stories(is_mine, current_state);
CREATE INDEX IF NOT EXISTS idx_comments_story ON comments(story_id);
CREATE INDEX IF NOT EXISTS idx_comments_mentions ON comments(mentions_me);
CREATE INDEX IF NOT EXISTS idx_comments_created ON comments(created_at DESC);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// Derived views for snapshot consumers and the CLI read commands. SQLite has
/// no CREATE OR REPLACE VIEW, so each open drops and recreates them.
pub const CREATE_VIEWS: &str = r#"
DROP VIEW IF EXISTS my_stories;
CREATE VIEW my_stories AS
SELECT id, title, story_type, current_state, estimate, priority,
       owner_names, label_names, url, mentions_me, created_at, updated_at
FROM stories WHERE is_mine = 1
ORDER BY updated_at DESC;

DROP VIEW IF EXISTS my_active_stories;
CREATE VIEW my_active_stories AS
SELECT id, title, story_type, current_state, estimate, priority,
       owner_names, label_names, url, mentions_me, created_at, updated_at
FROM stories WHERE is_mine = 1 AND current_state IN ('started', 'unstarted')
ORDER BY updated_at DESC;

DROP VIEW IF EXISTS stories_mentioning_me;
CREATE VIEW stories_mentioning_me AS
SELECT s.id, s.title, s.current_state, s.owner_names, s.is_mine,
       s.updated_at, COUNT(c.id) AS mention_count
FROM stories s
JOIN comments c ON c.story_id = s.id AND c.mentions_me = 1
GROUP BY s.id, s.title, s.current_state, s.owner_names, s.is_mine, s.updated_at
ORDER BY s.updated_at DESC;

DROP VIEW IF EXISTS recent_comments;
CREATE VIEW recent_comments AS
SELECT c.id, c.story_id, s.title AS story_title, c.person_name,
       c.text, c.mentions_me, c.created_at
FROM comments c
JOIN stories s ON s.id = c.story_id
ORDER BY c.created_at DESC;

DROP VIEW IF EXISTS story_stats;
CREATE VIEW story_stats AS
SELECT
  COUNT(*) AS total_stories,
  COUNT(*) FILTER (WHERE is_mine) AS my_stories,
  COUNT(*) FILTER (WHERE mentions_me) AS stories_with_mentions,
  COUNT(*) FILTER (WHERE current_state = 'started') AS started,
  COUNT(*) FILTER (WHERE current_state = 'unstarted') AS unstarted,
  COUNT(*) FILTER (WHERE current_state = 'delivered') AS delivered,
  COUNT(*) FILTER (WHERE current_state = 'accepted') AS accepted,
  COUNT(*) FILTER (WHERE current_state = 'rejected') AS rejected
FROM stories;
"#;
