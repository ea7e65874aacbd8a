//! GitHub REST API client.
//!
//! Authenticates with a personal access token. Every method checks the
//! response status and captures the error body, so a failing call carries
//! enough context to be logged and skipped without aborting the pass.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use crate::locator::PullRequestLocator;

const API_BASE_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// A pull request as returned by both the list and detail endpoints.
///
/// `merged` is absent from list responses and defaults to `false`;
/// `mergeable` is `null` while GitHub is still computing mergeability.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub state: String,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub mergeable: Option<bool>,
    pub user: Account,
    #[serde(default)]
    pub requested_reviewers: Vec<Account>,
    pub base: BranchRef,
    pub head: BranchRef,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
    pub user: Account,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

/// Read and write access to pull requests, abstracted for testability.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// List the currently open pull requests of one repository.
    async fn list_open_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>>;

    /// Fetch the full detail of one pull request.
    async fn get_pull_request(&self, locator: &PullRequestLocator) -> Result<PullRequest>;

    /// List review comments, optionally restricted to those updated at or
    /// after `since`.
    async fn list_review_comments(
        &self,
        locator: &PullRequestLocator,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReviewComment>>;

    /// List the files changed by a pull request, including their patches.
    async fn list_changed_files(&self, locator: &PullRequestLocator) -> Result<Vec<ChangedFile>>;

    /// Post a new issue comment on a pull request.
    async fn create_issue_comment(
        &self,
        locator: &PullRequestLocator,
        body: &str,
    ) -> Result<IssueComment>;

    /// Replace the body of an existing issue comment.
    async fn update_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: String) -> Self {
        let client = Client::builder()
            .user_agent("sentinel/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            token,
            base_url: API_BASE_URL.to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("Failed to send GET {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            return Err(anyhow!("GitHub API error on {path}: {status} - {error_text}"));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {path}"))
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {method} {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            return Err(anyhow!("GitHub API error on {path}: {status} - {error_text}"));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {path}"))
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn list_open_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>> {
        self.get_json(
            &format!("repos/{owner}/{repo}/pulls"),
            &[("state", "open".to_string())],
        )
        .await
    }

    async fn get_pull_request(&self, locator: &PullRequestLocator) -> Result<PullRequest> {
        self.get_json(
            &format!(
                "repos/{}/{}/pulls/{}",
                locator.owner, locator.repository, locator.number
            ),
            &[],
        )
        .await
    }

    async fn list_review_comments(
        &self,
        locator: &PullRequestLocator,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReviewComment>> {
        let mut query = Vec::new();
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339()));
        }

        self.get_json(
            &format!(
                "repos/{}/{}/pulls/{}/comments",
                locator.owner, locator.repository, locator.number
            ),
            &query,
        )
        .await
    }

    async fn list_changed_files(&self, locator: &PullRequestLocator) -> Result<Vec<ChangedFile>> {
        self.get_json(
            &format!(
                "repos/{}/{}/pulls/{}/files",
                locator.owner, locator.repository, locator.number
            ),
            &[],
        )
        .await
    }

    async fn create_issue_comment(
        &self,
        locator: &PullRequestLocator,
        body: &str,
    ) -> Result<IssueComment> {
        info!("Posting issue comment on {}", locator);

        self.send_json(
            reqwest::Method::POST,
            &format!(
                "repos/{}/{}/issues/{}/comments",
                locator.owner, locator.repository, locator.number
            ),
            &CommentBody { body },
        )
        .await
    }

    async fn update_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<()> {
        let _: IssueComment = self
            .send_json(
                reqwest::Method::PATCH,
                &format!("repos/{owner}/{repo}/issues/comments/{comment_id}"),
                &CommentBody { body },
            )
            .await?;
        Ok(())
    }
}
