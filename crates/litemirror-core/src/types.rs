use serde::{Deserialize, Serialize};

/// A tracked project as returned by the read API.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub public: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub initials: String,
    #[serde(default)]
    pub kind: String,
}

/// Membership row on a story's owner list. `user_id` is the account-level id
/// used for ownership checks; `id` is the membership row itself.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoryOwner {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub initials: String,
}

/// A story as returned by the read API. Timestamps are kept in the remote's
/// textual format here; the store normalizes them on upsert.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub story_type: String,
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub estimate: Option<i64>,
    #[serde(default)]
    pub story_priority: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub owner_ids: Vec<i64>,
    #[serde(default)]
    pub owners: Vec<StoryOwner>,
    #[serde(default)]
    pub requested_by_id: Option<i64>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub project_id: Option<i64>,
}

impl Story {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        user_id != 0 && self.owners.iter().any(|o| o.user_id == user_id)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub person_id: i64,
    #[serde(default)]
    pub person: Option<Person>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivityChange {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub change_type: String,
    #[serde(default)]
    pub new_values: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivityResource {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub story_type: String,
    #[serde(default)]
    pub url: String,
}

/// One entry in a project's activity feed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub performed_by: Person,
    #[serde(default)]
    pub occurred_at: String,
    #[serde(default)]
    pub changes: Vec<ActivityChange>,
    #[serde(default)]
    pub primary_resources: Vec<ActivityResource>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectMembership {
    #[serde(default)]
    pub project_id: i64,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub role: String,
}

/// The authenticated user's profile.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Me {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub initials: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub accounts: Vec<AccountSummary>,
    #[serde(default)]
    pub projects: Vec<ProjectMembership>,
}

/// Filters for the story list endpoint. `limit` defaults to 20 at request
/// build time when unset.
#[derive(Clone, Debug, Default)]
pub struct StoryQuery {
    pub filter: Option<String>,
    pub query: Option<i64>,
    pub owners: Option<i64>,
    pub section_type: Option<String>,
    pub owned_by: Option<i64>,
    pub state: Option<String>,
    pub limit: Option<u32>,
}

impl StoryQuery {
    /// Query for every story in one workflow state.
    pub fn with_state(state: &str, limit: u32) -> Self {
        Self {
            state: Some(state.to_string()),
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Payload for story creation.
#[derive(Clone, Debug, Default, Serialize)]
pub struct NewStory {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelName>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LabelName {
    pub name: String,
}

impl NewStory {
    /// Parse a comma-separated label list into label payloads, skipping blanks.
    pub fn parse_labels(raw: &str) -> Vec<LabelName> {
        raw.split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| LabelName {
                name: l.to_string(),
            })
            .collect()
    }
}
