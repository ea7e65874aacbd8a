//! The per-PR reconciliation state machine.
//!
//! One reconciliation pass discovers new PRs, appends rows for them, and
//! then visits every tracked row in reverse snapshot order:
//!
//! ```text
//! OPEN ──(merged)──────▶ notify, delete row   (terminal)
//! OPEN ──(closed)──────▶ notify, delete row   (terminal)
//! OPEN ──(still open)──▶ capture author, apply reviewer delta,
//!                        ledger-dedup new comments, notify, refresh
//!                        the since-filter
//! ```
//!
//! Idempotency rests on two pieces of persisted state: the comment ledger
//! (a comment id is notified on at most once, ever) and `last_fetched_at`
//! (the incremental fetch bound). Re-running the pass with no remote change
//! produces no ledger growth and no notifications.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};

use super::{
    discovery, merged_message, Engine, MSG_CLOSED, MSG_NEW_COMMENT, MSG_REPLY,
    MSG_REVIEWER_ASSIGNED, MSG_REVIEWER_CLEARED,
};
use crate::directory::{AccountDirectory, AccountMapping};
use crate::github::{PullRequestSource, ReviewComment};
use crate::locator::PullRequestLocator;
use crate::store::{Cell, CommentLedger, LedgerEntry, TrackedRow, TrackingTable};

/// Outcome of comparing the stored reviewer against the remote
/// requested-reviewer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewerDelta {
    /// First reviewer appeared while the stored cell was empty.
    Assign(String),
    /// Remote list emptied out while a reviewer was stored.
    Clear,
    Unchanged,
}

/// Compute the reviewer-field mutation for one row.
///
/// Only the empty → non-empty transition assigns (and notifies); a stored
/// reviewer is never replaced while the remote list stays non-empty.
pub fn reviewer_delta(current: Option<&str>, requested: &[String]) -> ReviewerDelta {
    match (current, requested.first()) {
        (None, Some(first)) => ReviewerDelta::Assign(first.clone()),
        (Some(_), None) => ReviewerDelta::Clear,
        _ => ReviewerDelta::Unchanged,
    }
}

/// A notification owed for a newly ledgered comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentEvent {
    /// A top-level comment; goes to the PR author, linking the PR itself.
    New { link: String },
    /// A reply to an already-ledgered comment; goes to the original
    /// commenter, linking the reply.
    Reply {
        recipient_account: String,
        link: String,
    },
}

/// Split incoming comments into ledger additions and notification events.
///
/// The set difference is keyed on comment id alone: a comment whose id is
/// already in `ledger` is dropped (idempotent under overlapping `since`
/// windows), and a duplicate id within `incoming` itself is counted once.
/// Reply detection consults the pre-update ledger only, so a reply whose
/// parent arrives in the same batch is classified as a new comment.
pub fn classify_comments(
    incoming: &[ReviewComment],
    ledger: &CommentLedger,
    pr_url: &str,
) -> (Vec<LedgerEntry>, Vec<CommentEvent>) {
    let mut added = Vec::new();
    let mut events = Vec::new();
    let mut batch_ids = HashSet::new();

    for comment in incoming {
        if ledger.contains(comment.id) || !batch_ids.insert(comment.id) {
            continue;
        }

        added.push(LedgerEntry {
            id: comment.id,
            user: comment.user.login.clone(),
        });

        let event = match comment.in_reply_to_id.and_then(|parent| ledger.find(parent)) {
            Some(parent) => CommentEvent::Reply {
                recipient_account: parent.user.clone(),
                link: comment.html_url.clone(),
            },
            None => CommentEvent::New {
                link: pr_url.to_string(),
            },
        };
        events.push(event);
    }

    (added, events)
}

impl Engine {
    /// One full reconciliation pass: discovery, row synchronization, then
    /// the per-row state machine over a fresh snapshot in reverse order.
    pub async fn run_reconciliation(&self) -> Result<()> {
        let mappings = self
            .directory
            .read_all()
            .await
            .context("Failed to read account directory")?;
        let tracked_accounts: HashSet<&str> = mappings
            .iter()
            .map(|mapping| mapping.github_account.as_str())
            .collect();

        let snapshot = self
            .table
            .read_all()
            .await
            .context("Failed to read tracking table")?;
        let existing_urls: HashSet<&str> = snapshot.iter().map(|row| row.url.as_str()).collect();

        let discovered = discovery::discover_open_pull_requests(
            self.source.as_ref(),
            &self.github_owner,
            &self.repositories,
            &tracked_accounts,
        )
        .await;

        for url in &discovered {
            if !existing_urls.contains(url.as_str()) {
                self.table
                    .append_url(url)
                    .await
                    .with_context(|| format!("Failed to append tracked row for {url}"))?;
                info!("Started tracking {url}");
            }
        }

        let rows = self
            .table
            .read_all()
            .await
            .context("Failed to re-read tracking table")?;

        for index in (0..rows.len()).rev() {
            if let Err(error) = self.reconcile_row(index, &rows[index], &mappings).await {
                error!(
                    "Failed to reconcile row {index} ({}): {error:#}",
                    rows[index].url
                );
            }
        }

        Ok(())
    }

    /// Run the state machine for one tracked row.
    ///
    /// Remote fetch failures are logged and leave the row untouched; store
    /// write failures bubble up to the pass loop, which logs them and moves
    /// on to the next row.
    async fn reconcile_row(
        &self,
        index: usize,
        row: &TrackedRow,
        mappings: &[AccountMapping],
    ) -> Result<()> {
        let locator = match PullRequestLocator::parse(&row.url) {
            Ok(locator) => locator,
            Err(error) => {
                error!("Row {index}: {error:#}");
                return Ok(());
            }
        };

        let pr = match self.source.get_pull_request(&locator).await {
            Ok(pr) => pr,
            Err(error) => {
                error!("Failed to fetch {locator}: {error:#}");
                return Ok(());
            }
        };

        // Stored value wins over the freshly fetched login: an earlier
        // fetch may have captured the author while a later one returns
        // stale or empty data.
        let author = row
            .author_account
            .clone()
            .unwrap_or_else(|| pr.user.login.clone());

        if pr.merged {
            let message = merged_message(&pr.base.ref_name, &pr.head.ref_name);
            self.notify(mappings, Some(&author), &message, &row.url).await;
            self.table.delete_row(index).await?;
            info!("{locator} was merged; stopped tracking");
            return Ok(());
        }

        if pr.state == "closed" {
            self.notify(mappings, Some(&author), MSG_CLOSED, &row.url).await;
            self.table.delete_row(index).await?;
            info!("{locator} was closed; stopped tracking");
            return Ok(());
        }

        let author_needs_write = match &row.author_account {
            None => true,
            Some(stored) => self.policy.overwrite_author && *stored != pr.user.login,
        };
        if author_needs_write {
            self.table
                .update_cell(index, Cell::Author(pr.user.login.clone()))
                .await?;
        }

        let requested: Vec<String> = pr
            .requested_reviewers
            .iter()
            .map(|account| account.login.clone())
            .collect();

        match reviewer_delta(row.reviewer_account.as_deref(), &requested) {
            ReviewerDelta::Assign(reviewer) => {
                self.table
                    .update_cell(index, Cell::Reviewer(Some(reviewer.clone())))
                    .await?;
                self.notify(mappings, Some(&reviewer), MSG_REVIEWER_ASSIGNED, &row.url)
                    .await;
            }
            ReviewerDelta::Clear => {
                self.table.update_cell(index, Cell::Reviewer(None)).await?;
                if self.policy.notify_on_reviewer_clear {
                    self.notify(mappings, Some(&author), MSG_REVIEWER_CLEARED, &row.url)
                        .await;
                }
            }
            ReviewerDelta::Unchanged => {}
        }

        let incoming = match self
            .source
            .list_review_comments(&locator, row.last_fetched_at)
            .await
        {
            Ok(incoming) => incoming,
            Err(error) => {
                // The since-filter is the bound of the last *successful*
                // fetch, so it must not advance past a failed one.
                error!("Failed to fetch comments for {locator}: {error:#}");
                return Ok(());
            }
        };

        let (added, events) = classify_comments(&incoming, &row.ledger, &row.url);

        if !added.is_empty() {
            let mut ledger = row.ledger.clone();
            ledger.extend(added);
            self.table.update_cell(index, Cell::Ledger(ledger)).await?;
        }

        for event in events {
            match event {
                CommentEvent::New { link } => {
                    self.notify(mappings, Some(&author), MSG_NEW_COMMENT, &link).await;
                }
                CommentEvent::Reply {
                    recipient_account,
                    link,
                } => {
                    self.notify(mappings, Some(&recipient_account), MSG_REPLY, &link)
                        .await;
                }
            }
        }

        self.table
            .update_cell(index, Cell::LastFetchedAt(Utc::now()))
            .await?;

        Ok(())
    }
}
