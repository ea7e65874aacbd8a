//! Summarize-and-comment pass.
//!
//! For each tracked row without a summary marker, concatenates the PR's
//! file patches, asks the summarizer for review text, posts it as an issue
//! comment, and records the created comment id so the PR is never
//! summarized twice. A summarizer failure produces an operator email and
//! leaves the marker unset, so a later pass retries.

use anyhow::{Context, Result};
use tracing::{error, info};

use sentinel_core::{join_patches, Summarizer};

use super::{Engine, MSG_SUMMARIZED};
use crate::github::PullRequestSource;
use crate::locator::PullRequestLocator;
use crate::notify::Notifier;
use crate::store::{Cell, TrackedRow, TrackingTable};

impl Engine {
    pub async fn run_review_pass(&self) -> Result<()> {
        let rows = self
            .table
            .read_all()
            .await
            .context("Failed to read tracking table")?;

        for index in (0..rows.len()).rev() {
            let row = &rows[index];
            if row.summary_comment_id.is_some() {
                continue;
            }

            let locator = match PullRequestLocator::parse(&row.url) {
                Ok(locator) => locator,
                Err(error) => {
                    error!("Row {index}: {error:#}");
                    continue;
                }
            };

            if let Err(error) = self.review_row(index, row, &locator).await {
                error!("Failed to review {locator}: {error:#}");
            }
        }

        Ok(())
    }

    async fn review_row(
        &self,
        index: usize,
        row: &TrackedRow,
        locator: &PullRequestLocator,
    ) -> Result<()> {
        let files = self
            .source
            .list_changed_files(locator)
            .await
            .with_context(|| format!("Failed to fetch changed files for {locator}"))?;

        let payload = join_patches(files.iter().map(|file| file.patch.as_deref()));

        let text = match self.summarizer.summarize(&payload).await {
            Ok(text) => text,
            Err(error) => {
                error!("Summarizer failed for {locator}: {error}");
                self.email_operator(
                    "[sentinel] Summarizer request failed",
                    &format!("Summarizing {} failed: {error}", row.url),
                )
                .await;
                return Ok(());
            }
        };

        let comment = self
            .source
            .create_issue_comment(locator, &text)
            .await
            .with_context(|| format!("Failed to post summary comment on {locator}"))?;

        self.table
            .update_cell(index, Cell::SummaryCommentId(comment.id))
            .await?;

        info!("Posted summary comment {} on {locator}", comment.id);

        let link = format!("{}#issuecomment-{}", row.url, comment.id);
        if let Err(error) = self.notifier.post(MSG_SUMMARIZED, None, &link).await {
            error!("Failed to deliver summary notification: {error:#}");
        }

        Ok(())
    }
}
