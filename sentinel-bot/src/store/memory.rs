//! In-memory implementation of `TrackingTable`.
//!
//! Holds rows in a `Vec` behind a `RwLock`; all state is lost on restart.
//! Useful for tests and for dry runs against a scratch table.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{Cell, TrackedRow, TrackingTable};

#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<TrackedRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with pre-built rows.
    pub fn with_rows(rows: Vec<TrackedRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Replace the table contents wholesale.
    pub fn set_rows(&self, rows: Vec<TrackedRow>) {
        *self.rows.write().expect("lock poisoned") = rows;
    }
}

#[async_trait]
impl TrackingTable for InMemoryStore {
    async fn read_all(&self) -> Result<Vec<TrackedRow>> {
        Ok(self.rows.read().expect("lock poisoned").clone())
    }

    async fn append_url(&self, url: &str) -> Result<()> {
        let mut rows = self.rows.write().expect("lock poisoned");
        if rows.iter().any(|row| row.url == url) {
            return Ok(());
        }
        rows.push(TrackedRow::new(url));
        Ok(())
    }

    async fn update_cell(&self, index: usize, cell: Cell) -> Result<()> {
        let mut rows = self.rows.write().expect("lock poisoned");
        let Some(row) = rows.get_mut(index) else {
            bail!("no tracked row at index {index}");
        };

        match cell {
            Cell::Ledger(ledger) => row.ledger = ledger,
            Cell::LastFetchedAt(at) => row.last_fetched_at = Some(at),
            Cell::Author(author) => row.author_account = Some(author),
            Cell::Reviewer(reviewer) => row.reviewer_account = reviewer,
            Cell::SummaryCommentId(id) => row.summary_comment_id = Some(id),
        }
        Ok(())
    }

    async fn delete_row(&self, index: usize) -> Result<()> {
        let mut rows = self.rows.write().expect("lock poisoned");
        if index >= rows.len() {
            bail!("no tracked row at index {index}");
        }
        rows.remove(index);
        Ok(())
    }
}
