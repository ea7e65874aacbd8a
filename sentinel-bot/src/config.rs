use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Reviewer/author bookkeeping policies whose behavior differed between
/// revisions of the original system. The defaults are the coherent pair:
/// author is captured once and never overwritten, and an emptied reviewer
/// list clears the tracked reviewer silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    /// Notify the PR author when the requested-reviewer list empties out.
    pub notify_on_reviewer_clear: bool,
    /// Overwrite the stored author account with each fetch instead of
    /// first-write-wins.
    pub overwrite_author: bool,
}

#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub github_owner: String,
    pub repositories: Vec<String>,
    pub slack_webhook_url: String,
    pub dify_endpoint: String,
    pub dify_api_key: String,
    pub dify_user: String,
    pub operator_email: String,
    pub mail_endpoint: String,
    pub mail_api_key: String,
    pub mail_from: String,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    pub policy: Policy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token =
            env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable is required")?;

        let github_owner =
            env::var("GITHUB_OWNER").context("GITHUB_OWNER environment variable is required")?;

        let repositories = parse_repository_list(
            &env::var("REPOSITORIES").context("REPOSITORIES environment variable is required")?,
        );
        anyhow::ensure!(
            !repositories.is_empty(),
            "REPOSITORIES must name at least one repository"
        );

        let slack_webhook_url = env::var("SLACK_WEBHOOK_URL")
            .context("SLACK_WEBHOOK_URL environment variable is required")?;

        let dify_endpoint =
            env::var("DIFY_ENDPOINT").context("DIFY_ENDPOINT environment variable is required")?;

        let dify_api_key =
            env::var("DIFY_API_KEY").context("DIFY_API_KEY environment variable is required")?;

        let dify_user =
            env::var("DIFY_USER").context("DIFY_USER environment variable is required")?;

        let operator_email = env::var("OPERATOR_EMAIL")
            .context("OPERATOR_EMAIL environment variable is required")?;

        let mail_endpoint =
            env::var("MAIL_ENDPOINT").context("MAIL_ENDPOINT environment variable is required")?;

        let mail_api_key =
            env::var("MAIL_API_KEY").context("MAIL_API_KEY environment variable is required")?;

        let mail_from =
            env::var("MAIL_FROM").context("MAIL_FROM environment variable is required")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let policy = Policy {
            notify_on_reviewer_clear: parse_flag(env::var("NOTIFY_ON_REVIEWER_CLEAR").ok()),
            overwrite_author: parse_flag(env::var("OVERWRITE_AUTHOR_ON_FETCH").ok()),
        };

        Ok(Config {
            github_token,
            github_owner,
            repositories,
            slack_webhook_url,
            dify_endpoint,
            dify_api_key,
            dify_user,
            operator_email,
            mail_endpoint,
            mail_api_key,
            mail_from,
            state_dir,
            policy,
        })
    }
}

/// Split a comma-separated repository list, dropping empty entries and
/// surrounding whitespace.
pub fn parse_repository_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an optional boolean flag from an environment variable value.
///
/// Missing, empty, or unparseable values are treated as `false`.
pub fn parse_flag(value: Option<String>) -> bool {
    value
        .and_then(|raw| raw.trim().parse::<bool>().ok())
        .unwrap_or(false)
}
