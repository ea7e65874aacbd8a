//! SQLite implementation of the Tracking Store and Account Directory.
//!
//! Rows keep their insertion order via an autoincrement `seq` column; a row
//! index is the row's position in `seq` order, so deleting a row only
//! shifts the indices of rows appended after it, which is exactly what the
//! engine's reverse iteration relies on.
//!
//! # Schema Versioning
//!
//! The database uses SQLite's `user_version` pragma to track schema
//! versions. When the schema changes, increment `SCHEMA_VERSION` and add a
//! migration function in `run_migrations`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::{Cell, CommentLedger, TrackedRow, TrackingTable};
use crate::directory::{AccountDirectory, AccountMapping};

/// Current schema version. Increment when making schema changes.
const SCHEMA_VERSION: i32 = 1;

/// SQLite database holding the tracked-PR table and the account mapping
/// table.
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// All trait methods move the actual query onto a blocking thread via
/// `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database file at the given path.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");

        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if current_version > SCHEMA_VERSION {
            bail!(
                "Database schema version {} is newer than supported version {}. \
                 Please upgrade the application.",
                current_version,
                SCHEMA_VERSION
            );
        }

        if current_version < SCHEMA_VERSION {
            Self::run_migrations(&conn, current_version)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
        if from_version < 1 {
            conn.execute_batch(
                "CREATE TABLE tracked_pull_requests (
                     seq INTEGER PRIMARY KEY AUTOINCREMENT,
                     url TEXT NOT NULL UNIQUE,
                     comment_ledger TEXT NOT NULL DEFAULT '[]',
                     last_fetched_at TEXT,
                     author_account TEXT,
                     reviewer_account TEXT,
                     summary_comment_id INTEGER
                 );
                 CREATE TABLE account_mappings (
                     github_account TEXT PRIMARY KEY,
                     chat_user_id TEXT NOT NULL
                 );",
            )
            .context("Failed to create initial schema")?;
        }
        Ok(())
    }

    /// Insert or replace an account mapping. Exposed for the `add-mapping`
    /// admin subcommand; the engine itself only ever reads mappings.
    pub async fn upsert_mapping(&self, github_account: &str, chat_user_id: &str) -> Result<()> {
        let conn = self.conn.clone();
        let github_account = github_account.to_string();
        let chat_user_id = chat_user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");
            conn.execute(
                "INSERT INTO account_mappings (github_account, chat_user_id)
                 VALUES (?1, ?2)
                 ON CONFLICT(github_account) DO UPDATE SET chat_user_id = ?2",
                params![github_account, chat_user_id],
            )
            .context("Failed to upsert account mapping")?;
            Ok(())
        })
        .await
        .context("spawn_blocking panicked")?
    }

    /// Resolve a row index to its stable `seq` key.
    fn seq_at(conn: &Connection, index: usize) -> Result<i64> {
        conn.query_row(
            "SELECT seq FROM tracked_pull_requests ORDER BY seq LIMIT 1 OFFSET ?1",
            params![index as i64],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to resolve row index")?
        .ok_or_else(|| anyhow!("no tracked row at index {index}"))
    }

    fn read_all_blocking(conn: &Connection) -> Result<Vec<TrackedRow>> {
        let mut statement = conn.prepare(
            "SELECT url, comment_ledger, last_fetched_at, author_account,
                    reviewer_account, summary_comment_id
             FROM tracked_pull_requests ORDER BY seq",
        )?;

        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<i64>>(5)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (url, ledger_json, fetched_at, author, reviewer, summary_id) =
                row.context("Failed to read tracked row")?;

            // A corrupt cell degrades to its default rather than failing
            // the snapshot: the row must stay in the result, because the
            // engine addresses rows by their position in seq order.
            let ledger = match CommentLedger::from_json(&ledger_json) {
                Ok(ledger) => ledger,
                Err(error) => {
                    warn!("Corrupt comment ledger for {url}, treating as empty: {error:#}");
                    CommentLedger::new()
                }
            };

            let last_fetched_at = fetched_at.as_deref().and_then(|raw| {
                match DateTime::parse_from_rfc3339(raw) {
                    Ok(parsed) => Some(parsed.with_timezone(&Utc)),
                    Err(error) => {
                        warn!("Corrupt last_fetched_at for {url}, treating as unset: {error}");
                        None
                    }
                }
            });

            result.push(TrackedRow {
                url,
                ledger,
                last_fetched_at,
                author_account: author.filter(|value| !value.is_empty()),
                reviewer_account: reviewer.filter(|value| !value.is_empty()),
                summary_comment_id: summary_id.map(|id| id as u64),
            });
        }

        Ok(result)
    }
}

#[async_trait]
impl TrackingTable for SqliteStore {
    async fn read_all(&self) -> Result<Vec<TrackedRow>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");
            Self::read_all_blocking(&conn)
        })
        .await
        .context("spawn_blocking panicked")?
    }

    async fn append_url(&self, url: &str) -> Result<()> {
        let conn = self.conn.clone();
        let url = url.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");
            // The UNIQUE constraint on url makes the append idempotent.
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO tracked_pull_requests (url) VALUES (?1)",
                    params![url],
                )
                .context("Failed to append tracked row")?;
            if inserted == 0 {
                warn!("Tracked row for {url} already exists; append skipped");
            }
            Ok(())
        })
        .await
        .context("spawn_blocking panicked")?
    }

    async fn update_cell(&self, index: usize, cell: Cell) -> Result<()> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");
            let seq = Self::seq_at(&conn, index)?;

            match cell {
                Cell::Ledger(ledger) => {
                    conn.execute(
                        "UPDATE tracked_pull_requests SET comment_ledger = ?1 WHERE seq = ?2",
                        params![ledger.to_json()?, seq],
                    )?;
                }
                Cell::LastFetchedAt(at) => {
                    conn.execute(
                        "UPDATE tracked_pull_requests SET last_fetched_at = ?1 WHERE seq = ?2",
                        params![at.to_rfc3339(), seq],
                    )?;
                }
                Cell::Author(author) => {
                    conn.execute(
                        "UPDATE tracked_pull_requests SET author_account = ?1 WHERE seq = ?2",
                        params![author, seq],
                    )?;
                }
                Cell::Reviewer(reviewer) => {
                    conn.execute(
                        "UPDATE tracked_pull_requests SET reviewer_account = ?1 WHERE seq = ?2",
                        params![reviewer, seq],
                    )?;
                }
                Cell::SummaryCommentId(id) => {
                    conn.execute(
                        "UPDATE tracked_pull_requests SET summary_comment_id = ?1 WHERE seq = ?2",
                        params![id as i64, seq],
                    )?;
                }
            }
            Ok(())
        })
        .await
        .context("spawn_blocking panicked")?
    }

    async fn delete_row(&self, index: usize) -> Result<()> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");
            let seq = Self::seq_at(&conn, index)?;
            conn.execute(
                "DELETE FROM tracked_pull_requests WHERE seq = ?1",
                params![seq],
            )
            .context("Failed to delete tracked row")?;
            Ok(())
        })
        .await
        .context("spawn_blocking panicked")?
    }
}

#[async_trait]
impl AccountDirectory for SqliteStore {
    async fn read_all(&self) -> Result<Vec<AccountMapping>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");
            let mut statement = conn.prepare(
                "SELECT github_account, chat_user_id FROM account_mappings ORDER BY github_account",
            )?;

            let mappings = statement
                .query_map([], |row| {
                    Ok(AccountMapping {
                        github_account: row.get(0)?,
                        chat_user_id: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read account mappings")?;

            Ok(mappings)
        })
        .await
        .context("spawn_blocking panicked")?
    }
}
