//! Discovery of open pull requests by tracked authors.

use std::collections::HashSet;

use tracing::{error, info};

use crate::github::PullRequestSource;

/// List the URLs of currently open pull requests authored by a tracked
/// account, across all tracked repositories.
///
/// A fetch failure in one repository is logged and excluded; it never
/// aborts discovery for the others. The result contains no duplicates.
pub async fn discover_open_pull_requests(
    source: &dyn PullRequestSource,
    owner: &str,
    repositories: &[String],
    tracked_accounts: &HashSet<&str>,
) -> Vec<String> {
    let mut urls = Vec::new();
    let mut seen = HashSet::new();

    for repo in repositories {
        let pull_requests = match source.list_open_pull_requests(owner, repo).await {
            Ok(pull_requests) => pull_requests,
            Err(error) => {
                error!("Failed to list open pull requests for {owner}/{repo}: {error:#}");
                continue;
            }
        };

        for pr in pull_requests {
            if !tracked_accounts.contains(pr.user.login.as_str()) {
                continue;
            }
            if seen.insert(pr.html_url.clone()) {
                urls.push(pr.html_url);
            }
        }
    }

    info!("Discovered {} open pull request(s) from tracked authors", urls.len());
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_pull_request, FakeSource};

    fn tracked<'a>(accounts: &[&'a str]) -> HashSet<&'a str> {
        accounts.iter().copied().collect()
    }

    #[tokio::test]
    async fn filters_by_tracked_author() {
        let source = FakeSource::new();
        source.set_open_pull_requests(
            "widgets",
            vec![
                open_pull_request("https://github.com/octo/widgets/pull/1", "alice"),
                open_pull_request("https://github.com/octo/widgets/pull/2", "stranger"),
            ],
        );

        let urls = discover_open_pull_requests(
            &source,
            "octo",
            &["widgets".to_string()],
            &tracked(&["alice"]),
        )
        .await;

        assert_eq!(urls, vec!["https://github.com/octo/widgets/pull/1"]);
    }

    #[tokio::test]
    async fn repository_failure_is_isolated() {
        let source = FakeSource::new();
        source.fail_repository("broken");
        source.set_open_pull_requests(
            "widgets",
            vec![open_pull_request(
                "https://github.com/octo/widgets/pull/1",
                "alice",
            )],
        );

        let urls = discover_open_pull_requests(
            &source,
            "octo",
            &["broken".to_string(), "widgets".to_string()],
            &tracked(&["alice"]),
        )
        .await;

        assert_eq!(urls, vec!["https://github.com/octo/widgets/pull/1"]);
    }

    #[tokio::test]
    async fn output_has_no_duplicates() {
        let source = FakeSource::new();
        source.set_open_pull_requests(
            "widgets",
            vec![
                open_pull_request("https://github.com/octo/widgets/pull/1", "alice"),
                open_pull_request("https://github.com/octo/widgets/pull/1", "alice"),
            ],
        );

        let urls = discover_open_pull_requests(
            &source,
            "octo",
            &["widgets".to_string()],
            &tracked(&["alice"]),
        )
        .await;

        assert_eq!(urls.len(), 1);
    }
}
