use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use litemirror_core::config::Config;
use litemirror_core::error::{AuthError, WriteError};
use litemirror_core::mention::contains_ignore_case;
use litemirror_core::read::TrackerRead;
use litemirror_core::types::{Comment, Label, StoryOwner};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CSRF_PATTERN: &str = r#"csrf-token[^>]*content="([^"]*)""#;

/// Session-authenticated client for the internal write API. The remote only
/// accepts these mutations from a browser-style session: a form login with a
/// CSRF token scraped from the login page, then a cookie for every call.
///
/// One mutex serializes login and all writes process-wide, so the shared
/// cookie jar never sees concurrent logins.
pub struct SessionClient {
    http: Client,
    web_url: String,
    email: String,
    password: SecretString,
    user_id: i64,
    read: Arc<dyn TrackerRead>,
    state: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    logged_in: bool,
}

impl SessionClient {
    pub fn new(config: &Config, read: Arc<dyn TrackerRead>) -> Self {
        Self {
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .cookie_store(true)
                .build()
                .expect("failed to build HTTP client"),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            password: config.password.clone(),
            user_id: config.user_id,
            read,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Log in if the session is not already established.
    pub async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        let mut session = self.state.lock().await;
        self.login_if_needed(&mut session).await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.logged_in
    }

    /// Post a comment on a story via the multipart endpoint.
    pub async fn post_comment(&self, story_id: i64, text: &str) -> Result<Comment, WriteError> {
        self.with_session(|| self.post_comment_inner(story_id, text))
            .await
    }

    /// Attach a label to a story, creating it in the project if needed.
    pub async fn add_label(
        &self,
        story_id: i64,
        project_id: i64,
        name: &str,
    ) -> Result<Label, WriteError> {
        self.with_session(|| self.add_label_inner(story_id, project_id, name))
            .await
    }

    /// Add an owner to a story. The current owner list is re-read from the
    /// token API first; if the user is already an owner this is a no-op and
    /// no mutating request is issued.
    pub async fn add_owner(
        &self,
        story_id: i64,
        project_id: i64,
        user_id: i64,
    ) -> Result<Vec<StoryOwner>, WriteError> {
        self.with_session(|| self.add_owner_inner(story_id, project_id, user_id))
            .await
    }

    /// Run one write under the session lock. A session-expired failure forces
    /// a re-login and retries the operation exactly once; any second failure
    /// surfaces unmodified.
    async fn with_session<T, F, Fut>(&self, op: F) -> Result<T, WriteError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, WriteError>>,
    {
        let mut session = self.state.lock().await;
        self.login_if_needed(&mut session).await?;
        match op().await {
            Err(e) if e.is_session_expired() => {
                info!("session expired, re-authenticating and retrying once");
                session.logged_in = false;
                self.login_if_needed(&mut session).await?;
                op().await
            }
            result => result,
        }
    }

    async fn login_if_needed(&self, session: &mut SessionState) -> Result<(), AuthError> {
        if session.logged_in {
            return Ok(());
        }
        if self.email.is_empty() || self.password.expose_secret().is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let login_url = format!("{}/login", self.web_url);
        let resp = self
            .http
            .get(&login_url)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        let page = resp
            .text()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        let csrf = extract_csrf_token(&page).ok_or(AuthError::CsrfNotFound)?;

        let form = [
            ("authenticity_token", csrf.as_str()),
            ("user[login]", self.email.as_str()),
            ("user[password]", self.password.expose_secret()),
            ("user[remember_me]", "1"),
        ];
        let resp = self
            .http
            .post(&login_url)
            .header("Accept", "text/html")
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        let status = resp.status().as_u16();
        // Drain the body so the connection can be reused.
        let _ = resp.text().await;

        if status == 401 || status == 422 {
            return Err(AuthError::InvalidCredentials { status });
        }

        session.logged_in = true;
        info!("session authenticated");
        Ok(())
    }

    async fn post_comment_inner(&self, story_id: i64, text: &str) -> Result<Comment, WriteError> {
        let url = format!("{}/api/v1/stories/{story_id}/comments", self.web_url);
        let form = reqwest::multipart::Form::new()
            .text("comment[content]", text.to_string())
            .text("comment[user_id]", self.user_id.to_string())
            .text("comment[commentable_type]", "Story")
            .text("comment[commentable_id]", story_id.to_string());

        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;
        let body = classify(resp).await?;

        Ok(match serde_json::from_str::<JsonApiComment>(&body) {
            Ok(parsed) => Comment {
                id: parsed.data.id.parse().unwrap_or_default(),
                text: parsed.data.attributes.content,
                person_id: parsed.data.attributes.user_id,
                created_at: parsed.data.attributes.created_at,
                ..Comment::default()
            },
            // An unrecognized success body still means the comment landed.
            Err(_) => Comment {
                text: text.to_string(),
                ..Comment::default()
            },
        })
    }

    async fn add_label_inner(
        &self,
        story_id: i64,
        project_id: i64,
        name: &str,
    ) -> Result<Label, WriteError> {
        let url = format!("{}/api/v1/stories/{story_id}/labels", self.web_url);
        let payload = serde_json::json!({
            "label": {"name": name, "project_id": project_id}
        });

        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;
        let body = classify(resp).await?;

        Ok(match serde_json::from_str::<JsonApiLabel>(&body) {
            Ok(parsed) => Label {
                id: parsed.data.id.parse().unwrap_or_default(),
                name: parsed.data.attributes.name,
                kind: String::new(),
            },
            Err(_) => Label {
                name: name.to_string(),
                ..Label::default()
            },
        })
    }

    async fn add_owner_inner(
        &self,
        story_id: i64,
        project_id: i64,
        user_id: i64,
    ) -> Result<Vec<StoryOwner>, WriteError> {
        // Current owners come from the token API, never the local mirror.
        let story = self.read.story(project_id, story_id).await?;

        let mut ids = Vec::with_capacity(story.owners.len() + 1);
        for owner in &story.owners {
            if owner.user_id == user_id {
                return Ok(story.owners);
            }
            ids.push(owner.user_id);
        }
        ids.push(user_id);

        let url = format!("{}/api/v1/stories/{story_id}", self.web_url);
        let payload = serde_json::json!({"story": {"owner_ids": ids}});
        let resp = self
            .http
            .put(&url)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;
        let body = classify(resp).await?;

        Ok(serde_json::from_str::<OwnerReplace>(&body)
            .map(|r| r.owners)
            .unwrap_or_default())
    }
}

/// Turn a response from the session surface into its body text, classifying
/// session expiry on the way: a 401, or a 2xx that served the sign-in page
/// instead of JSON (the service does both for stale sessions).
async fn classify(resp: reqwest::Response) -> Result<String, WriteError> {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    if status >= 400 {
        return Err(WriteError::from_status(status, &body));
    }
    if looks_like_login_page(&body) {
        return Err(WriteError::SessionExpired);
    }
    Ok(body)
}

fn looks_like_login_page(body: &str) -> bool {
    body.contains("csrf-token") && contains_ignore_case(body, "sign in")
}

fn extract_csrf_token(html: &str) -> Option<String> {
    let re = Regex::new(CSRF_PATTERN).ok()?;
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Default, Deserialize)]
struct JsonApiComment {
    #[serde(default)]
    data: JsonApiCommentData,
}

#[derive(Debug, Default, Deserialize)]
struct JsonApiCommentData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    attributes: JsonApiCommentAttrs,
}

#[derive(Debug, Default, Deserialize)]
struct JsonApiCommentAttrs {
    #[serde(default)]
    content: String,
    #[serde(default, rename = "created-at")]
    created_at: String,
    #[serde(default, rename = "user-id")]
    user_id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct JsonApiLabel {
    #[serde(default)]
    data: JsonApiLabelData,
}

#[derive(Debug, Default, Deserialize)]
struct JsonApiLabelData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    attributes: JsonApiLabelAttrs,
}

#[derive(Debug, Default, Deserialize)]
struct JsonApiLabelAttrs {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwnerReplace {
    #[serde(default)]
    owners: Vec<StoryOwner>,
}
