//! Merge-conflict inspection pass.
//!
//! Stateless: every invocation re-checks every tracked row and notifies the
//! author of any PR GitHub reports as unmergeable. Repeated reminders while
//! the conflict persists are intended behavior.

use anyhow::{Context, Result};
use tracing::error;

use super::{Engine, MSG_CONFLICT};
use crate::directory::AccountDirectory;
use crate::github::PullRequestSource;
use crate::locator::PullRequestLocator;
use crate::store::TrackingTable;

impl Engine {
    pub async fn inspect_conflicts(&self) -> Result<()> {
        let mappings = self
            .directory
            .read_all()
            .await
            .context("Failed to read account directory")?;
        let rows = self
            .table
            .read_all()
            .await
            .context("Failed to read tracking table")?;

        for row in &rows {
            let locator = match PullRequestLocator::parse(&row.url) {
                Ok(locator) => locator,
                Err(error) => {
                    error!("{error:#}");
                    continue;
                }
            };

            let pr = match self.source.get_pull_request(&locator).await {
                Ok(pr) => pr,
                Err(error) => {
                    error!("Failed to fetch {locator}: {error:#}");
                    continue;
                }
            };

            if pr.mergeable == Some(false) {
                self.notify(&mappings, Some(&pr.user.login), MSG_CONFLICT, &row.url)
                    .await;
            }
        }

        Ok(())
    }
}
