use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::diff;
use super::types::{Group, MergeRequest, MergeRequestChanges, Note, Project};
use super::{GitLabError, GroupScope, RemoteSource};

/// GitLab caps `per_page` at 100; only the first page is ever requested.
const PAGE_SIZE: &str = "100";

/// HTTP implementation of [`RemoteSource`] against the GitLab v4 REST API.
#[derive(Clone)]
pub struct GitLabClient {
    client: Client,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GitLabClient {
    /// Build a client for the instance at `base_url` (without `/api/v4`).
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, GitLabError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = reqwest::Url::parse(trimmed)
            .map_err(|_| GitLabError::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GitLabError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("mr-dashboard")
            .build()?;

        Ok(Self {
            client,
            api_url: format!("{trimmed}/api/v4"),
            token: token.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GitLabError> {
        let url = format!("{}{}", self.api_url, path);
        debug!(%url, ?query, "GET");

        let response = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitLabError::Status {
                endpoint: path.to_string(),
                status,
                body,
            });
        }

        let body = response.text().await?;
        debug!(path, body_bytes = body.len(), "received response");
        serde_json::from_str(&body).map_err(|source| GitLabError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl RemoteSource for GitLabClient {
    #[instrument(skip(self))]
    async fn list_groups(&self, scope: GroupScope) -> Result<Vec<Group>, GitLabError> {
        let filter = match scope {
            GroupScope::TopLevel => ("top_level_only", "true"),
            GroupScope::AllAvailable => ("all_available", "true"),
        };
        self.get_json("/groups", &[filter, ("per_page", PAGE_SIZE)])
            .await
    }

    #[instrument(skip(self))]
    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>, GitLabError> {
        self.get_json(
            &format!("/groups/{group_id}/subgroups"),
            &[("per_page", PAGE_SIZE)],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>, GitLabError> {
        self.get_json(
            &format!("/groups/{group_id}/projects"),
            &[("per_page", PAGE_SIZE)],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_merge_requests(
        &self,
        project_id: u64,
        states: &[String],
    ) -> Result<Vec<MergeRequest>, GitLabError> {
        let path = format!("/projects/{project_id}/merge_requests");
        let mut merge_requests = Vec::new();
        for state in states {
            let batch: Vec<MergeRequest> = self
                .get_json(&path, &[("state", state.as_str()), ("per_page", PAGE_SIZE)])
                .await?;
            debug!(%state, count = batch.len(), "fetched merge requests");
            merge_requests.extend(batch);
        }
        Ok(merge_requests)
    }

    #[instrument(skip(self))]
    async fn diff_size(&self, project_id: u64, mr_iid: u64) -> Result<u64, GitLabError> {
        let changes: MergeRequestChanges = self
            .get_json(
                &format!("/projects/{project_id}/merge_requests/{mr_iid}/changes"),
                &[],
            )
            .await?;
        diff::total_lines_changed(&changes.changes)
    }

    #[instrument(skip(self))]
    async fn non_system_comment_count(
        &self,
        project_id: u64,
        mr_iid: u64,
    ) -> Result<u64, GitLabError> {
        let notes: Vec<Note> = self
            .get_json(
                &format!("/projects/{project_id}/merge_requests/{mr_iid}/notes"),
                &[("per_page", PAGE_SIZE)],
            )
            .await?;
        Ok(notes.iter().filter(|note| !note.is_system()).count() as u64)
    }
}
