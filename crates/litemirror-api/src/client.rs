use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use litemirror_core::config::Config;
use litemirror_core::error::ApiError;
use litemirror_core::read::TrackerRead;
use litemirror_core::types::{Activity, Comment, Me, NewStory, Project, Story, StoryQuery};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const AUTH_HEADER: &str = "X-TrackerToken";
const DEFAULT_STORY_LIMIT: u32 = 20;
const ACTIVITY_LIMIT: u32 = 100;

/// Stateless, token-authenticated client for the public read API. No retries;
/// transport and status errors surface directly to the caller.
pub struct ReadClient {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl ReadClient {
    pub fn new(base_url: &str, token: SecretString) -> Self {
        Self {
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.base_url, config.token.clone())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header(AUTH_HEADER, self.token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        resp.json().await.map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, ApiError> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(AUTH_HEADER, self.token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        resp.json().await.map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TrackerRead for ReadClient {
    async fn me(&self) -> Result<Me, ApiError> {
        self.get_json("/me", &[]).await
    }

    async fn projects(&self) -> Result<Vec<Project>, ApiError> {
        self.get_json("/projects", &[]).await
    }

    async fn stories(&self, project_id: i64, query: &StoryQuery) -> Result<Vec<Story>, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(filter) = &query.filter {
            params.push(("filter", filter.clone()));
        }
        if let Some(q) = query.query {
            params.push(("query", q.to_string()));
        }
        if let Some(owners) = query.owners {
            params.push(("owners", owners.to_string()));
        }
        if let Some(section) = &query.section_type {
            params.push(("section_type", section.clone()));
        }
        if let Some(owned_by) = query.owned_by {
            params.push(("owned_by", owned_by.to_string()));
        }
        if let Some(state) = &query.state {
            params.push(("with_state", state.clone()));
        }
        let limit = query.limit.unwrap_or(DEFAULT_STORY_LIMIT);
        params.push(("limit", limit.to_string()));

        self.get_json(&format!("/projects/{project_id}/stories"), &params)
            .await
    }

    async fn story(&self, project_id: i64, story_id: i64) -> Result<Story, ApiError> {
        self.get_json(&format!("/projects/{project_id}/stories/{story_id}"), &[])
            .await
    }

    async fn comments(&self, project_id: i64, story_id: i64) -> Result<Vec<Comment>, ApiError> {
        self.get_json(
            &format!("/projects/{project_id}/stories/{story_id}/comments"),
            &[],
        )
        .await
    }

    async fn activity_since(
        &self,
        project_id: i64,
        occurred_after: &str,
    ) -> Result<Vec<Activity>, ApiError> {
        let params = [
            ("occurred_after", occurred_after.to_string()),
            ("limit", ACTIVITY_LIMIT.to_string()),
        ];
        let params: Vec<(&str, String)> = params.to_vec();
        self.get_json(&format!("/projects/{project_id}/activity"), &params)
            .await
    }

    async fn create_story(&self, project_id: i64, story: &NewStory) -> Result<Story, ApiError> {
        self.post_json(&format!("/projects/{project_id}/stories"), story)
            .await
    }
}
