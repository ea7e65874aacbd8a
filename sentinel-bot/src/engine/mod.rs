//! The reconciliation engine.
//!
//! Drives the three scheduler-invoked passes:
//!
//! - [`Engine::run_reconciliation`]: discovery, row synchronization, and
//!   the per-PR state machine (`reconcile`)
//! - [`Engine::inspect_conflicts`]: stateless merge-conflict reminders
//! - [`Engine::run_review_pass`]: on-demand diff summarization
//!
//! The engine owns all row-index arithmetic. Each pass reads a snapshot of
//! the tracking table and (where it deletes rows) walks it in reverse, so a
//! deletion only shifts indices of rows already visited.

pub mod conflict;
pub mod discovery;
pub mod reconcile;
pub mod review;

pub use reconcile::{classify_comments, reviewer_delta, CommentEvent, ReviewerDelta};

use std::sync::Arc;

use tracing::error;

use sentinel_core::Summarizer;

use crate::config::Policy;
use crate::directory::{resolve_chat_user, AccountDirectory, AccountMapping};
use crate::github::PullRequestSource;
use crate::mail::MailSender;
use crate::notify::Notifier;
use crate::store::TrackingTable;

pub const MSG_CLOSED: &str = "The pull request was closed.";
pub const MSG_REVIEWER_ASSIGNED: &str = "You have been assigned as a reviewer.";
pub const MSG_REVIEWER_CLEARED: &str = "The requested reviewer was removed.";
pub const MSG_NEW_COMMENT: &str = "There is a new comment.";
pub const MSG_REPLY: &str = "There is a reply to your comment.";
pub const MSG_CONFLICT: &str = "Please resolve the merge conflict.";
pub const MSG_SUMMARIZED: &str = "The diff was summarized and reviewed by Dify.";

pub fn merged_message(base_ref: &str, head_ref: &str) -> String {
    format!("Branch {head_ref} was merged into {base_ref}.")
}

pub struct Engine {
    pub source: Arc<dyn PullRequestSource>,
    pub table: Arc<dyn TrackingTable>,
    pub directory: Arc<dyn AccountDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub mailer: Arc<dyn MailSender>,
    pub summarizer: Arc<dyn Summarizer>,
    pub github_owner: String,
    pub repositories: Vec<String>,
    pub operator_email: String,
    pub policy: Policy,
}

impl Engine {
    /// Deliver a notification, mentioning the chat user mapped from
    /// `github_account` when a valid mapping exists. Delivery failure is
    /// logged and swallowed: a missed chat message never aborts a pass.
    pub(crate) async fn notify(
        &self,
        mappings: &[AccountMapping],
        github_account: Option<&str>,
        message: &str,
        link: &str,
    ) {
        let mention = github_account.and_then(|account| resolve_chat_user(mappings, account));

        if let Err(error) = self.notifier.post(message, mention.as_ref(), link).await {
            error!("Failed to deliver notification ({message}): {error:#}");
        }
    }

    /// Best-effort operator email; a failed send is only logged.
    pub(crate) async fn email_operator(&self, subject: &str, body: &str) {
        if let Err(error) = self.mailer.send(subject, body, &self.operator_email).await {
            error!("Failed to send operator email ({subject}): {error:#}");
        }
    }
}
