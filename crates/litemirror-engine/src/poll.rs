use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use litemirror_core::config::Config;
use litemirror_core::mention::contains_ignore_case;
use litemirror_core::read::TrackerRead;
use litemirror_core::types::Activity;

use crate::cursor::{PollCursor, PollState};
use crate::notify::Notifier;
use crate::sync::SyncEngine;

const COMMENT_CREATE_KIND: &str = "comment_create_activity";
const FALLBACK_TITLE: &str = "LiteTracker";
const FALLBACK_PERFORMER: &str = "Someone";

/// Whether an activity deserves a notification: its message mentions the
/// user, a structured change value mentions the user, or it is a new comment
/// (comments on tracked stories are always worth surfacing).
pub fn is_notifiable(activity: &Activity, username: &str) -> bool {
    if contains_ignore_case(&activity.message, username) {
        return true;
    }
    for change in &activity.changes {
        if let Some(values) = &change.new_values {
            if contains_ignore_case(&values.to_string(), username) {
                return true;
            }
        }
    }
    activity.kind == COMMENT_CREATE_KIND
}

/// Title and body for an activity's notification.
pub fn notification_for(activity: &Activity) -> (String, String) {
    let title = activity
        .primary_resources
        .first()
        .map(|r| format!("[{}]", r.name))
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());
    let performer = if activity.performed_by.name.is_empty() {
        FALLBACK_PERFORMER
    } else {
        activity.performed_by.name.as_str()
    };
    (title, format!("{performer}: {}", activity.message))
}

/// The periodic poll/notify loop. Each cycle fetches activity since the
/// persisted cursor for every tracked project, notifies on relevant entries,
/// and advances the cursor to the cycle's start time, even when some
/// projects failed, accepting a gap over reprocessing the same window
/// forever.
pub struct PollLoop {
    tracker: Arc<dyn TrackerRead>,
    notifier: Arc<dyn Notifier>,
    cursor: PollCursor,
    username: String,
    project_ids: Vec<i64>,
    interval: Duration,
}

impl PollLoop {
    pub fn new(
        tracker: Arc<dyn TrackerRead>,
        notifier: Arc<dyn Notifier>,
        cursor: PollCursor,
        config: &Config,
    ) -> Self {
        Self {
            tracker,
            notifier,
            cursor,
            username: config.username.clone(),
            project_ids: config.project_ids.clone(),
            interval: config.poll_interval,
        }
    }

    /// One poll cycle. Each activity is evaluated exactly once per cycle;
    /// cross-cycle dedup is only the advancing cursor.
    #[instrument(skip(self, state))]
    pub async fn poll_once(&self, state: &mut PollState) {
        let since = state.last_poll.clone();
        let now = Utc::now().to_rfc3339();

        for project_id in &self.project_ids {
            // An activity stamped exactly at the cursor follows the remote's
            // inclusive/exclusive semantics; delivery is at-least-once.
            let activities = match self.tracker.activity_since(*project_id, &since).await {
                Ok(activities) => activities,
                Err(e) => {
                    error!(project_id, error = %e, "activity fetch failed");
                    continue;
                }
            };
            for activity in &activities {
                if is_notifiable(activity, &self.username) {
                    let (title, body) = notification_for(activity);
                    info!(kind = %activity.kind, message = %activity.message, "notification triggered");
                    self.notifier.notify(&title, &body);
                }
            }
        }

        state.last_poll = now;
        if let Err(e) = self.cursor.store(state) {
            warn!(error = %e, "persist poll cursor failed");
        }
    }

    /// Run until the token is cancelled: one immediate poll + sync, then one
    /// of each per tick. In-flight network calls are bounded only by their
    /// own timeout.
    pub async fn run(&self, sync: &SyncEngine, shutdown: CancellationToken) {
        let mut state = self.cursor.load();
        info!(last_poll = %state.last_poll, "loaded poll cursor");

        self.poll_once(&mut state).await;
        sync.sync_all().await;
        info!("initial poll and sync complete");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; the initial pass above already ran.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once(&mut state).await;
                    info!(last_poll = %state.last_poll, "poll complete");
                    sync.sync_all().await;
                }
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping poll loop");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTracker;
    use litemirror_core::types::{ActivityChange, ActivityResource, Person};
    use parking_lot::Mutex;
    use secrecy::SecretString;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.sent.lock().push((title.to_string(), body.to_string()));
        }
    }

    fn test_config(project_ids: Vec<i64>) -> Config {
        Config {
            token: SecretString::from("t"),
            base_url: String::new(),
            web_url: String::new(),
            username: "alice".into(),
            email: String::new(),
            password: SecretString::from(""),
            user_id: 568,
            project_ids,
            poll_interval: Duration::from_secs(300),
            data_dir: std::env::temp_dir(),
        }
    }

    fn activity(kind: &str, message: &str) -> Activity {
        Activity {
            kind: kind.into(),
            message: message.into(),
            performed_by: Person {
                id: 2,
                name: "Dana".into(),
                ..Person::default()
            },
            primary_resources: vec![ActivityResource {
                kind: "story".into(),
                id: 7,
                name: "Checkout flow".into(),
                ..ActivityResource::default()
            }],
            ..Activity::default()
        }
    }

    #[test]
    fn message_mention_is_notifiable() {
        let a = activity("story_update_activity", "Dana assigned Alice to this");
        assert!(is_notifiable(&a, "alice"));
        assert!(!is_notifiable(&a, "bob"));
    }

    #[test]
    fn structured_change_value_is_notifiable() {
        let mut a = activity("story_update_activity", "edited this feature");
        a.changes = vec![ActivityChange {
            kind: "story".into(),
            change_type: "update".into(),
            new_values: Some(serde_json::json!({"owner_names": ["Alice"]})),
            ..ActivityChange::default()
        }];
        assert!(is_notifiable(&a, "alice"));
    }

    #[test]
    fn comment_creation_always_notifies() {
        let a = activity(COMMENT_CREATE_KIND, "added a comment");
        assert!(is_notifiable(&a, "alice"));
        // Even with no username configured.
        assert!(is_notifiable(&a, ""));
    }

    #[test]
    fn notification_payload_shape() {
        let a = activity("story_update_activity", "started this feature");
        let (title, body) = notification_for(&a);
        assert_eq!(title, "[Checkout flow]");
        assert_eq!(body, "Dana: started this feature");
    }

    #[test]
    fn notification_fallbacks() {
        let mut a = activity("story_update_activity", "started this feature");
        a.primary_resources.clear();
        a.performed_by.name.clear();
        let (title, body) = notification_for(&a);
        assert_eq!(title, "LiteTracker");
        assert_eq!(body, "Someone: started this feature");
    }

    #[tokio::test]
    async fn cycle_notifies_each_relevant_activity_once() {
        let tracker = Arc::new(MockTracker::new().with_activities(
            7,
            vec![
                activity(COMMENT_CREATE_KIND, "added a comment"),
                activity("story_update_activity", "nothing relevant"),
                activity("story_update_activity", "mentioned @alice here"),
            ],
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let dir = tempfile::tempdir().unwrap();
        let poll = PollLoop::new(
            tracker,
            notifier.clone(),
            PollCursor::new(dir.path().join("poll-state.json")),
            &test_config(vec![7]),
        );

        let mut state = PollState {
            last_poll: "2026-02-11T00:00:00+00:00".into(),
        };
        poll.poll_once(&mut state).await;

        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, "Dana: added a comment");
    }

    #[tokio::test]
    async fn cursor_advances_despite_project_failure() {
        let tracker = Arc::new(
            MockTracker::new()
                .with_activities(1, vec![])
                .failing_activity(2)
                .with_activities(3, vec![]),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let dir = tempfile::tempdir().unwrap();
        let cursor_path = dir.path().join("poll-state.json");
        let poll = PollLoop::new(
            tracker.clone(),
            notifier,
            PollCursor::new(cursor_path.clone()),
            &test_config(vec![1, 2, 3]),
        );

        let start = "2026-02-11T00:00:00+00:00".to_string();
        let mut state = PollState {
            last_poll: start.clone(),
        };
        poll.poll_once(&mut state).await;

        // Advanced past the failed window and persisted.
        assert_ne!(state.last_poll, start);
        let persisted = PollCursor::new(cursor_path).load();
        assert_eq!(persisted, state);

        // The next cycle queries with the advanced cursor.
        poll.poll_once(&mut state).await;
        let fetches = tracker.activity_fetches();
        assert_eq!(fetches.len(), 6);
        assert_eq!(fetches[0].1, start);
        assert_eq!(fetches[3].1, persisted.last_poll);
    }
}
