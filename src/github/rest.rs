//! GitHub REST API client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CreatedItem, GitHubClient, IssueRequest, PullRequestRequest, WorkflowRun};
use crate::error::{RepoError, RepoResult};

/// Default GitHub API base URL
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT_VALUE: &str = concat!("repodeck/", env!("CARGO_PKG_VERSION"));
const WORKFLOW_RUNS_PER_PAGE: u32 = 20;

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Clone)]
pub struct GitHubRest {
    client: Client,
    /// Configurable for GitHub Enterprise (`https://github.example.com/api/v3`)
    api_base: String,
    timeout: Duration,
}

impl std::fmt::Debug for GitHubRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRest")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GitHubRest {
    pub fn with_api_base(api_base: impl Into<String>, timeout: Duration) -> RepoResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RepoError::failed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn repo_url(&self, owner: &str, name: &str, path: &str) -> String {
        format!("{}/repos/{owner}/{name}/{path}", self.api_base)
    }

    fn headers(token: Option<&str>) -> RepoResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| RepoError::AuthFailed("token contains invalid characters".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
        Ok(headers)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
        repo: &str,
    ) -> RepoResult<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RepoError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                }
            } else {
                RepoError::failed(format!("{operation} failed: {e}"))
            }
        })?;
        Self::handle_response(response, operation, repo).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: Response,
        operation: &str,
        repo: &str,
    ) -> RepoResult<T> {
        let status = response.status();
        debug!(operation, repo, status = status.as_u16(), "GitHub response");

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| RepoError::failed(format!("{operation}: unexpected response: {e}")));
        }

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => RepoError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => RepoError::AuthFailed(format!("permission denied: {message}")),
            StatusCode::NOT_FOUND => RepoError::repository_not_found(repo),
            StatusCode::TOO_MANY_REQUESTS => {
                RepoError::failed(format!("{operation}: GitHub rate limit exceeded"))
            }
            _ => RepoError::failed(format!(
                "{operation}: GitHub API error {}: {message}",
                status.as_u16()
            )),
        })
    }

    fn require_token(token: Option<&str>) -> RepoResult<&str> {
        token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RepoError::AuthFailed("a GitHub token is required".into()))
    }
}

#[async_trait]
impl GitHubClient for GitHubRest {
    async fn try_get_workflow_runs(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
    ) -> RepoResult<Vec<WorkflowRun>> {
        let request = self
            .client
            .get(self.repo_url(owner, name, "actions/runs"))
            .headers(Self::headers(token)?)
            .query(&[("per_page", WORKFLOW_RUNS_PER_PAGE)]);
        let runs: WorkflowRunsResponse = self
            .send(request, "list workflow runs", &format!("{owner}/{name}"))
            .await?;
        Ok(runs.workflow_runs)
    }

    async fn try_create_pull_request(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
        request: &PullRequestRequest,
    ) -> RepoResult<CreatedItem> {
        let token = Self::require_token(token)?;
        let request = self
            .client
            .post(self.repo_url(owner, name, "pulls"))
            .headers(Self::headers(Some(token))?)
            .json(request);
        self.send(request, "create pull request", &format!("{owner}/{name}"))
            .await
    }

    async fn try_create_issue(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
        request: &IssueRequest,
    ) -> RepoResult<CreatedItem> {
        let token = Self::require_token(token)?;
        let request = self
            .client
            .post(self.repo_url(owner, name, "issues"))
            .headers(Self::headers(Some(token))?)
            .json(request);
        self.send(request, "create issue", &format!("{owner}/{name}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_has_no_secrets() {
        let client =
            GitHubRest::with_api_base("https://example.test/api/v3/", Duration::from_secs(5))
                .expect("client should build");
        let shown = format!("{client:?}");
        assert!(shown.contains("https://example.test/api/v3"));
        assert_eq!(
            client.repo_url("acme", "widgets", "pulls"),
            "https://example.test/api/v3/repos/acme/widgets/pulls"
        );
    }

    #[test]
    fn test_token_required_for_writes() {
        assert!(matches!(
            GitHubRest::require_token(None),
            Err(RepoError::AuthFailed(_))
        ));
        assert!(matches!(
            GitHubRest::require_token(Some("")),
            Err(RepoError::AuthFailed(_))
        ));
        assert_eq!(GitHubRest::require_token(Some("t")).unwrap(), "t");
    }
}
