//! Tracking Store abstraction.
//!
//! One row per tracked (open) pull request. The store is an ordered table
//! addressed by row index; all row-index arithmetic lives in the engine,
//! which iterates a snapshot in reverse so that deletions never perturb the
//! indices of rows it has yet to visit. Implementations provide different
//! backends (in-memory for tests, SQLite for production).

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One comment the system has already notified on.
///
/// Serialized as `{"id":…,"user":…}` inside the row's ledger cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub user: String,
}

/// The set of review comments already notified on for one pull request.
///
/// Entries are append-only while the row exists and deduplicated by comment
/// id. Serialization to JSON happens only at the storage boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentLedger {
    entries: Vec<LedgerEntry>,
}

impl CommentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, comment_id: u64) -> bool {
        self.entries.iter().any(|entry| entry.id == comment_id)
    }

    /// Look up the ledger entry for a comment id.
    pub fn find(&self, comment_id: u64) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.id == comment_id)
    }

    /// Append entries, silently dropping any whose id is already present.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = LedgerEntry>) {
        for entry in entries {
            if !self.contains(entry.id) {
                self.entries.push(entry);
            }
        }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Parse the JSON cell format. An empty cell is an empty ledger.
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        let entries: Vec<LedgerEntry> = serde_json::from_str(raw)?;
        Ok(Self { entries })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}

impl FromIterator<LedgerEntry> for CommentLedger {
    fn from_iter<T: IntoIterator<Item = LedgerEntry>>(iter: T) -> Self {
        let mut ledger = Self::new();
        ledger.extend(iter);
        ledger
    }
}

/// One row of the Tracking Store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedRow {
    /// Canonical PR web URL; unique key within the store.
    pub url: String,
    pub ledger: CommentLedger,
    /// Lower bound (`since`) for the next incremental comment fetch.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// PR author account; captured once on first sight.
    pub author_account: Option<String>,
    /// Currently tracked requested reviewer, if any.
    pub reviewer_account: Option<String>,
    /// Id of the posted summary comment; set at most once per row.
    pub summary_comment_id: Option<u64>,
}

impl TrackedRow {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// A single-cell update on one row.
#[derive(Debug, Clone)]
pub enum Cell {
    Ledger(CommentLedger),
    LastFetchedAt(DateTime<Utc>),
    Author(String),
    Reviewer(Option<String>),
    SummaryCommentId(u64),
}

/// Ordered table of tracked pull requests.
///
/// `read_all` defines the row order; `update_cell` and `delete_row` address
/// rows by their index in that order. Appending never reorders existing
/// rows, and `append_url` is a no-op when the URL is already present, so no
/// two rows for the same URL can ever coexist.
#[async_trait]
pub trait TrackingTable: Send + Sync {
    async fn read_all(&self) -> Result<Vec<TrackedRow>>;

    async fn append_url(&self, url: &str) -> Result<()>;

    async fn update_cell(&self, index: usize, cell: Cell) -> Result<()>;

    async fn delete_row(&self, index: usize) -> Result<()>;
}
