use std::path::{Path, PathBuf};

use tracing::debug;

use crate::database::Database;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("checkpoint: {0}")]
    Checkpoint(String),

    #[error("copy store: {0}")]
    Copy(String),

    #[error("publish snapshot: {0}")]
    Publish(String),
}

/// Publish a point-in-time copy of the live store for external readers.
/// The final step is a single atomic rename, so the published path only ever
/// holds a complete file: the previous snapshot or the new one, never a
/// partial write.
pub fn create_snapshot(db: &Database, snapshot_path: &Path) -> Result<(), SnapshotError> {
    let tmp = tmp_path(snapshot_path);
    // A failed prior attempt may have left its scratch file behind.
    let _ = std::fs::remove_file(&tmp);

    db.checkpoint()
        .map_err(|e| SnapshotError::Checkpoint(e.to_string()))?;

    std::fs::copy(db.path(), &tmp).map_err(|e| SnapshotError::Copy(e.to_string()))?;
    if let Err(e) = std::fs::rename(&tmp, snapshot_path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(SnapshotError::Publish(e.to_string()));
    }

    debug!(path = %snapshot_path.display(), "snapshot published");
    Ok(())
}

fn tmp_path(snapshot_path: &Path) -> PathBuf {
    let mut os = snapshot_path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stories::{StoryRepo, StoryRow};

    fn live_db_with_story(dir: &Path) -> Database {
        let db = Database::open(&dir.join("live.db")).unwrap();
        StoryRepo::new(db.clone())
            .upsert(&StoryRow {
                id: 1,
                project_id: 7,
                title: "snapshotted".into(),
                ..StoryRow::default()
            })
            .unwrap();
        db
    }

    #[test]
    fn snapshot_is_a_complete_readable_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = live_db_with_story(dir.path());
        let snap = dir.path().join("snapshot.db");

        create_snapshot(&db, &snap).unwrap();

        let copy = Database::open(&snap).unwrap();
        let story = StoryRepo::new(copy).get(1).unwrap().unwrap();
        assert_eq!(story.title, "snapshotted");
    }

    #[test]
    fn stale_tmp_file_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let db = live_db_with_story(dir.path());
        let snap = dir.path().join("snapshot.db");
        let tmp = tmp_path(&snap);
        std::fs::write(&tmp, b"leftover junk from a crashed attempt").unwrap();

        create_snapshot(&db, &snap).unwrap();

        assert!(!tmp.exists());
        assert!(Database::open(&snap).is_ok());
    }

    #[test]
    fn failed_copy_leaves_published_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let db = live_db_with_story(dir.path());
        let snap = dir.path().join("snapshot.db");
        create_snapshot(&db, &snap).unwrap();
        let before = std::fs::read(&snap).unwrap();

        // An in-memory store has no backing file, so the copy step fails.
        let broken = Database::in_memory().unwrap();
        let err = create_snapshot(&broken, &snap).unwrap_err();
        assert!(matches!(err, SnapshotError::Copy(_)), "got {err:?}");

        assert_eq!(std::fs::read(&snap).unwrap(), before);
        assert!(!tmp_path(&snap).exists());
    }

    #[test]
    fn republish_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let db = live_db_with_story(dir.path());
        let snap = dir.path().join("snapshot.db");
        create_snapshot(&db, &snap).unwrap();

        StoryRepo::new(db.clone())
            .upsert(&StoryRow {
                id: 2,
                project_id: 7,
                title: "second pass".into(),
                ..StoryRow::default()
            })
            .unwrap();
        create_snapshot(&db, &snap).unwrap();

        let copy = Database::open(&snap).unwrap();
        let repo = StoryRepo::new(copy);
        assert!(repo.get(1).unwrap().is_some());
        assert!(repo.get(2).unwrap().is_some());
    }
}
