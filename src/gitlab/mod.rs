pub mod client;
pub mod diff;
pub mod types;

pub use client::GitLabClient;
pub use types::{Assignee, Group, MergeRequest, MergeRequestState, Project};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitLabError {
    #[error("GitLab API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitLab API returned HTTP {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Unexpected payload from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid GitLab base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),
}

/// Which groups `list_groups` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupScope {
    /// Only groups without a parent (`top_level_only=true`)
    #[default]
    TopLevel,
    /// Every group visible to the token (`all_available=true`)
    AllAvailable,
}

/// Read-only view of a GitLab instance.
///
/// Every list call returns the first page only (up to 100 items).
/// Implementations must be Send + Sync so per-merge-request calls can
/// run concurrently.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn list_groups(&self, scope: GroupScope) -> Result<Vec<Group>, GitLabError>;

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>, GitLabError>;

    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>, GitLabError>;

    /// One request per state, concatenated in the order the states are given.
    /// A merge request matching several states appears once per match.
    async fn list_merge_requests(
        &self,
        project_id: u64,
        states: &[String],
    ) -> Result<Vec<MergeRequest>, GitLabError>;

    /// Added plus deleted lines across all changed files.
    async fn diff_size(&self, project_id: u64, mr_iid: u64) -> Result<u64, GitLabError>;

    /// Number of notes that are not system notes.
    async fn non_system_comment_count(&self, project_id: u64, mr_iid: u64)
        -> Result<u64, GitLabError>;
}
