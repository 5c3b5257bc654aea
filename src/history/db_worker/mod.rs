//! Database worker thread
//!
//! Single-threaded SQLite access via message passing. Every [`SqliteStore`]
//! owns one worker thread and one connection; callers on any thread send a
//! request and block on a reply channel with a timeout.

mod db_impl;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use super::store::{CancelToken, Store};
use super::types::{Cursor, HistoryRecord, NewHistoryRecord, RecordId};
use crate::error::{ResultExt, StoreError, StoreResult};
use db_impl::*;

/// SQLite busy timeout applied to the worker connection
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Request types for the DB worker
pub enum DbRequest {
    /// Insert a new entry
    Insert {
        draft: NewHistoryRecord,
        reply: SyncSender<StoreResult<RecordId>>,
    },
    /// Get total entry count
    Count { reply: SyncSender<StoreResult<u64>> },
    /// Get a page of entries strictly older than the cursor
    FetchPage {
        page_size: usize,
        before_ms: i64,
        reply: SyncSender<StoreResult<Vec<HistoryRecord>>>,
    },
    /// Keyword search over source text and results
    Search {
        text: String,
        cancel: CancelToken,
        reply: SyncSender<StoreResult<Vec<HistoryRecord>>>,
    },
    /// Remove an entry
    Remove {
        id: RecordId,
        reply: SyncSender<StoreResult<()>>,
    },
    /// Clear all history
    Clear { reply: SyncSender<StoreResult<()>> },
    /// Shutdown the worker
    Shutdown,
}

/// [`Store`] over a SQLite database served by a dedicated worker thread
pub struct SqliteStore {
    sender: Sender<DbRequest>,
    request_timeout: Duration,
    worker: Option<JoinHandle<()>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and start its worker.
    pub fn open(path: impl AsRef<Path>, request_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {:?}", parent)
                })?;
            }
        }

        // Open on the caller's thread so schema errors surface here, not in the worker
        let conn = init_connection(&path)?;

        let (tx, rx): (Sender<DbRequest>, Receiver<DbRequest>) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("history-db".to_string())
            .spawn(move || db_worker_loop(conn, rx))
            .context("Failed to spawn history DB worker")?;

        info!(path = %path.display(), "History DB worker started");
        Ok(SqliteStore {
            sender: tx,
            request_timeout,
            worker: Some(worker),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert(&self, draft: NewHistoryRecord) -> StoreResult<RecordId> {
        self.request(|reply| DbRequest::Insert { draft, reply })
    }

    pub fn remove(&self, id: RecordId) -> StoreResult<()> {
        self.request(|reply| DbRequest::Remove { id, reply })
    }

    pub fn clear(&self) -> StoreResult<()> {
        self.request(|reply| DbRequest::Clear { reply })
    }

    fn request<T>(&self, build: impl FnOnce(SyncSender<StoreResult<T>>) -> DbRequest) -> StoreResult<T> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.sender
            .send(build(reply_tx))
            .map_err(|_| StoreError::Unavailable("database worker has stopped".to_string()))?;

        match reply_rx.recv_timeout(self.request_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(StoreError::Timeout(self.request_timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::Unavailable(
                "database worker dropped the request".to_string(),
            )),
        }
    }
}

impl Store for SqliteStore {
    fn count(&self) -> StoreResult<u64> {
        self.request(|reply| DbRequest::Count { reply })
    }

    fn fetch_page(&self, page_size: usize, before: Cursor) -> StoreResult<Vec<HistoryRecord>> {
        let before_ms = before.timestamp().timestamp_millis();
        self.request(|reply| DbRequest::FetchPage {
            page_size,
            before_ms,
            reply,
        })
    }

    fn search(&self, text: &str, cancel: &CancelToken) -> StoreResult<Vec<HistoryRecord>> {
        let text = text.to_string();
        let cancel = cancel.clone();
        self.request(|reply| DbRequest::Search {
            text,
            cancel,
            reply,
        })
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        // Fails only if the worker already exited
        let _ = self.sender.send(DbRequest::Shutdown).warn_on_err();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("History DB worker panicked");
            }
        }
    }
}

fn init_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {:?}", path))?;

    conn.execute_batch(&format!(
        "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout = {};",
        BUSY_TIMEOUT_MS
    ))
    .context("Failed to set database pragmas")?;

    create_schema(&conn)?;
    run_migrations(&conn)?;
    create_indexes(&conn)?;

    debug!(path = %path.display(), "History database initialized");
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT, timestamp INTEGER NOT NULL,
            source_lang TEXT NOT NULL DEFAULT '', target_lang TEXT NOT NULL DEFAULT '',
            source_text TEXT NOT NULL, results TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )
    .context("Failed to create history table")?;
    Ok(())
}

fn run_migrations(conn: &Connection) -> Result<()> {
    add_column_if_missing(conn, "favorite", "INTEGER NOT NULL DEFAULT 0")?;
    Ok(())
}

fn add_column_if_missing(conn: &Connection, name: &str, col_type: &str) -> Result<()> {
    let has: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('history') WHERE name = ?1",
            [name],
            |row| row.get::<_, i32>(0),
        )
        .map(|c| c > 0)
        .unwrap_or(false);

    if !has {
        conn.execute(
            &format!("ALTER TABLE history ADD COLUMN {} {}", name, col_type),
            [],
        )
        .with_context(|| format!("Failed to add {} column", name))?;
        info!(column = name, "Added column to history table");
    }
    Ok(())
}

fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp DESC)",
        [],
    )
    .context("Failed to create timestamp index")?;
    Ok(())
}

fn db_worker_loop(conn: Connection, rx: Receiver<DbRequest>) {
    debug!("History DB worker loop started");
    for request in rx {
        if !handle_request(&conn, request) {
            break;
        }
    }
    debug!("History DB worker loop ended");
}

fn handle_request(conn: &Connection, req: DbRequest) -> bool {
    match req {
        DbRequest::Insert { draft, reply } => {
            let _ = reply.send(insert_impl(conn, draft));
        }
        DbRequest::Count { reply } => {
            let _ = reply.send(count_impl(conn));
        }
        DbRequest::FetchPage {
            page_size,
            before_ms,
            reply,
        } => {
            let _ = reply.send(fetch_page_impl(conn, page_size, before_ms));
        }
        DbRequest::Search {
            text,
            cancel,
            reply,
        } => {
            // Superseded while queued behind other requests
            let result = if cancel.is_cancelled() {
                debug!(query_len = text.len(), "Skipping canceled search");
                Err(StoreError::Canceled)
            } else {
                search_impl(conn, &text)
            };
            let _ = reply.send(result);
        }
        DbRequest::Remove { id, reply } => {
            let _ = reply.send(remove_impl(conn, id));
        }
        DbRequest::Clear { reply } => {
            let _ = reply.send(clear_impl(conn));
        }
        DbRequest::Shutdown => {
            debug!("History DB worker shutdown");
            return false;
        }
    }
    true
}
