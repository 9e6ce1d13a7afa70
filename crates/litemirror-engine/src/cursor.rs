use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Persisted progress marker for the poll loop: the timestamp of the last
/// completed cycle. Strictly non-decreasing across successful cycles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollState {
    #[serde(rename = "lastPoll")]
    pub last_poll: String,
}

impl PollState {
    pub fn now() -> Self {
        Self {
            last_poll: Utc::now().to_rfc3339(),
        }
    }
}

/// Loads and stores the poll cursor file. An absent or corrupt file defaults
/// to "now"; a fresh process never back-fills history.
pub struct PollCursor {
    path: PathBuf,
}

impl PollCursor {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> PollState {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "poll state unreadable, restarting from now");
                PollState::now()
            }),
            Err(_) => PollState::now(),
        }
    }

    pub fn store(&self, state: &PollState) -> std::io::Result<()> {
        let data = serde_json::to_vec_pretty(state).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn roundtrips_through_the_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = PollCursor::new(dir.path().join("poll-state.json"));

        let state = PollState {
            last_poll: "2026-02-11T04:30:00+00:00".into(),
        };
        cursor.store(&state).unwrap();
        assert_eq!(cursor.load(), state);
    }

    #[test]
    fn missing_file_defaults_to_now() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = PollCursor::new(dir.path().join("nope.json"));

        let before = Utc::now();
        let state = cursor.load();
        let parsed = DateTime::parse_from_rfc3339(&state.last_poll).unwrap();
        assert!(parsed >= before.fixed_offset() - chrono::Duration::seconds(1));
    }

    #[test]
    fn corrupt_file_defaults_to_now() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poll-state.json");
        std::fs::write(&path, "{not json").unwrap();

        let state = PollCursor::new(path).load();
        assert!(DateTime::parse_from_rfc3339(&state.last_poll).is_ok());
    }

    #[test]
    fn file_uses_the_last_poll_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poll-state.json");
        let cursor = PollCursor::new(path.clone());
        cursor
            .store(&PollState {
                last_poll: "2026-02-11T04:30:00+00:00".into(),
            })
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"lastPoll\""), "got: {raw}");
    }
}
