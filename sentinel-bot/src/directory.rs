//! Account Directory: GitHub account → chat user id.
//!
//! The directory serves two purposes: resolving the mention target for a
//! notification, and defining the tracked-author set used by discovery
//! (a PR is tracked iff its author appears in the directory).

use std::fmt;
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

/// Slack user ids look like `U` followed by ten uppercase alphanumerics.
static CHAT_USER_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^U[A-Z0-9]{10}$").expect("valid regex"));

/// A validated chat-system user id, usable as a mention target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUserId(String);

impl ChatUserId {
    /// Validate a raw id. Anything not matching the fixed format is
    /// rejected; callers treat rejection as "no mapping found".
    pub fn parse(raw: &str) -> Option<Self> {
        if CHAT_USER_ID_PATTERN.is_match(raw) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `(github_account, chat_user_id)` pair as stored. The chat user id is
/// unvalidated here; validation happens at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMapping {
    pub github_account: String,
    pub chat_user_id: String,
}

/// Read access to the account mapping table.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn read_all(&self) -> Result<Vec<AccountMapping>>;
}

/// Resolve the chat user for a GitHub account against a directory snapshot.
///
/// An invalid stored id is logged and treated as absent, so the caller
/// notifies without a mention rather than mentioning a garbage id.
pub fn resolve_chat_user(mappings: &[AccountMapping], github_account: &str) -> Option<ChatUserId> {
    let mapping = mappings
        .iter()
        .find(|mapping| mapping.github_account == github_account)?;

    match ChatUserId::parse(&mapping.chat_user_id) {
        Some(id) => Some(id),
        None => {
            warn!(
                "Invalid chat user id {:?} mapped to GitHub account {}; ignoring mapping",
                mapping.chat_user_id, github_account
            );
            None
        }
    }
}

/// In-memory directory, for tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    mappings: std::sync::RwLock<Vec<AccountMapping>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pairs(&self, pairs: &[(&str, &str)]) {
        *self.mappings.write().expect("lock poisoned") = pairs
            .iter()
            .map(|(account, chat_id)| AccountMapping {
                github_account: account.to_string(),
                chat_user_id: chat_id.to_string(),
            })
            .collect();
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn read_all(&self) -> Result<Vec<AccountMapping>> {
        Ok(self.mappings.read().expect("lock poisoned").clone())
    }
}
