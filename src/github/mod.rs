//! GitHub metadata for tracked repositories
//!
//! The orchestrator calls [`GitHubClient`] once per request and never retries.
//! [`GitHubRest`] is the REST implementation.

mod rest;

pub use rest::{GitHubRest, DEFAULT_API_BASE};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RepoResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    /// `queued`, `in_progress`, `completed`, ...
    #[serde(default)]
    pub status: Option<String>,
    /// `success`, `failure`, ... once completed
    #[serde(default)]
    pub conclusion: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// Emoji for the run state, in the same palette as file states
    pub fn symbol(&self) -> &str {
        match (self.status.as_deref(), self.conclusion.as_deref()) {
            (Some("completed"), Some("success")) => "🟢",
            (Some("completed"), Some("skipped" | "neutral" | "cancelled")) => "⚪",
            (Some("completed"), _) => "🔴",
            _ => "🟡",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRequest {
    pub title: String,
    /// Branch with the changes
    pub head: String,
    /// Branch to merge into
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// Created pull request or issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedItem {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    pub state: String,
}

#[async_trait]
pub trait GitHubClient: Send + Sync {
    /// Most recent workflow runs, newest first. Works without a token for
    /// public repositories.
    async fn try_get_workflow_runs(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
    ) -> RepoResult<Vec<WorkflowRun>>;

    async fn try_create_pull_request(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
        request: &PullRequestRequest,
    ) -> RepoResult<CreatedItem>;

    async fn try_create_issue(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
        request: &IssueRequest,
    ) -> RepoResult<CreatedItem>;
}
