// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable chat history.
//!
//! [`HistoryStore`] is the synchronous port; [`SqliteStore`] implements it
//! on an embedded SQLite file. The relay reaches the store through
//! [`Persistence`], which moves every call onto the blocking pool.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chat_history (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id    TEXT NOT NULL,
    receiver_id  TEXT NOT NULL,
    message      TEXT NOT NULL,
    display_name TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_history_sender ON chat_history (sender_id);
CREATE INDEX IF NOT EXISTS idx_chat_history_receiver ON chat_history (receiver_id);
";

const SELECT_COLUMNS: &str =
    "SELECT id, sender_id, receiver_id, message, display_name, created_at FROM chat_history";

/// One stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// A chat message about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Durable store for chat history, addressed by participant identity.
pub trait HistoryStore: Send + Sync {
    /// Store one record, returning its sequence id.
    fn append(&self, record: &NewRecord) -> Result<i64, StoreError>;

    /// Records visible to `identity`, oldest first. The support desk sees all.
    fn history_for(&self, identity: &str) -> Result<Vec<HistoryRecord>, StoreError>;

    /// Remove every record visible to `identity`; returns how many went.
    fn clear(&self, identity: &str) -> Result<usize, StoreError>;

    /// Remove one record by sequence id.
    fn delete_record(&self, id: i64) -> Result<bool, StoreError>;

    /// Every record, oldest first.
    fn all(&self) -> Result<Vec<HistoryRecord>, StoreError>;

    /// Cheap liveness probe.
    fn ping(&self) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    support_id: String,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`. `:memory:` is honored.
    pub fn open(path: &Path, support_id: impl Into<String>) -> Result<Self, StoreError> {
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path)?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )?;
            conn
        };
        Self::with_connection(conn, support_id)
    }

    pub fn open_in_memory(support_id: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, support_id)
    }

    fn with_connection(conn: Connection, support_id: impl Into<String>) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn), support_id: support_id.into() })
    }

    fn query(&self, sql: &str, identity: Option<&str>) -> Result<Vec<HistoryRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = match identity {
            Some(id) => stmt.query_map(params![id], record_from_row)?,
            None => stmt.query_map([], record_from_row)?,
        };
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        message: row.get(3)?,
        display_name: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl HistoryStore for SqliteStore {
    fn append(&self, record: &NewRecord) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO chat_history (sender_id, receiver_id, message, display_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.sender_id,
                record.receiver_id,
                record.message,
                record.display_name,
                Utc::now()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn history_for(&self, identity: &str) -> Result<Vec<HistoryRecord>, StoreError> {
        if identity == self.support_id {
            return self.all();
        }
        self.query(
            &format!("{SELECT_COLUMNS} WHERE sender_id = ?1 OR receiver_id = ?1 ORDER BY id"),
            Some(identity),
        )
    }

    fn clear(&self, identity: &str) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let removed = if identity == self.support_id {
            conn.execute("DELETE FROM chat_history", [])?
        } else {
            conn.execute(
                "DELETE FROM chat_history WHERE sender_id = ?1 OR receiver_id = ?1",
                params![identity],
            )?
        };
        Ok(removed)
    }

    fn delete_record(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM chat_history WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn all(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY id"), None)
    }

    fn ping(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

/// Async front for a [`HistoryStore`].
///
/// Each call runs on `spawn_blocking`; a failure is handed back to the
/// caller and never tears down the connection that asked.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn HistoryStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn HistoryStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn append(&self, record: NewRecord) -> Result<i64, StoreError> {
        self.run(move |s| s.append(&record)).await
    }

    pub async fn history_for(&self, identity: &str) -> Result<Vec<HistoryRecord>, StoreError> {
        let identity = identity.to_owned();
        self.run(move |s| s.history_for(&identity)).await
    }

    pub async fn clear(&self, identity: &str) -> Result<usize, StoreError> {
        let identity = identity.to_owned();
        self.run(move |s| s.clear(&identity)).await
    }

    pub async fn delete_record(&self, id: i64) -> Result<bool, StoreError> {
        self.run(move |s| s.delete_record(id)).await
    }

    pub async fn all(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        self.run(|s| s.all()).await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.run(|s| s.ping()).await
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
