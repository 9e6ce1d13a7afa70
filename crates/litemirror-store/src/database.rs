use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::schema;

/// Thread-safe SQLite connection wrapper.
/// Uses parking_lot::Mutex for synchronous access (rusqlite is not Send).
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open or create the mirror store at the given path, migrating the
    /// schema if the stored version is behind.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(schema::PRAGMAS)?;
        migrate(&conn)?;

        info!(path = %path.display(), "cache store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::PRAGMAS)?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the WAL into the main database file so it can be copied whole.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
    }

    /// Close the underlying connection if this is the last handle; other
    /// handles keep it alive and it closes with the final drop.
    pub fn close(self) -> Result<(), StoreError> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => mutex
                .into_inner()
                .close()
                .map_err(|(_, e)| StoreError::Database(e.to_string())),
            Err(_) => Ok(()),
        }
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            path: self.path.clone(),
        }
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let stored = stored_version(conn);
    if stored < schema::SCHEMA_VERSION {
        if stored > 0 {
            info!(
                from = stored,
                to = schema::SCHEMA_VERSION,
                "schema out of date, rebuilding mirror tables"
            );
        }
        conn.execute_batch(schema::DROP_TABLES)?;
    }
    conn.execute_batch(schema::CREATE_TABLES)?;
    if stored_version(conn) == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [schema::SCHEMA_VERSION],
        )?;
    }
    conn.execute_batch(schema::CREATE_VIEWS)?;
    Ok(())
}

fn stored_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })
    .unwrap_or(0)
}
