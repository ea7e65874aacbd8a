//! Pull-request identity parsed from a canonical web URL.
//!
//! A tracking row is keyed by its PR URL; everything else about the PR's
//! identity (owner, repository, number) is derived from that URL in
//! exactly one place, here. No other module parses PR URLs.

use std::fmt;
use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::Regex;

static PR_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com/([^/]+)/([^/]+)/pull/(\d+)$").expect("valid regex")
});

/// The `(owner, repository, number)` triple identifying a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestLocator {
    pub owner: String,
    pub repository: String,
    pub number: u64,
}

impl PullRequestLocator {
    /// Parse a canonical pull-request web URL
    /// (`https://github.com/{owner}/{repo}/pull/{number}`).
    pub fn parse(url: &str) -> Result<Self> {
        let captures = PR_URL_PATTERN
            .captures(url)
            .ok_or_else(|| anyhow!("not a valid GitHub pull request URL: {url}"))?;

        let number = captures[3]
            .parse::<u64>()
            .map_err(|_| anyhow!("pull request number out of range in URL: {url}"))?;

        Ok(Self {
            owner: captures[1].to_string(),
            repository: captures[2].to_string(),
            number,
        })
    }
}

impl fmt::Display for PullRequestLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repository, self.number)
    }
}
