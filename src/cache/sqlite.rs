//! SQLite persistence backend.
//!
//! Table layout:
//!
//! | column       | type    | notes                                    |
//! |--------------|---------|------------------------------------------|
//! | `key`        | TEXT    | primary key                              |
//! | `body`       | BLOB    | encryption envelope                      |
//! | `status`     | INTEGER | HTTP status                              |
//! | `headers`    | TEXT    | JSON `[[name, value], ...]`; non-ASCII values as `{"b64": ...}` |
//! | `expires`    | INTEGER | Unix milliseconds                        |
//! | `created_at` | INTEGER | Unix milliseconds, defaults to insert time |

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::cache::entry::HeaderPair;
use crate::cache::{CacheBackend, CacheEntry};
use crate::error::{CacheError, Result};

/// Default table name.
pub const DEFAULT_TABLE: &str = "cache_entries";

// == Table Name ==
/// A table name that is safe to splice into SQL text.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= 63
}

// == Sqlite Backend ==
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    select_sql: Arc<str>,
    upsert_sql: Arc<str>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

fn store_err(err: rusqlite::Error) -> CacheError {
    CacheError::Store(err.to_string())
}

impl SqliteBackend {
    /// Opens (creating if needed) the database file and table.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(store_err)?;
        Self::from_connection(conn, table)
    }

    pub fn open_in_memory(table: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::from_connection(conn, table)
    }

    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        if !is_valid_table_name(table) {
            return Err(CacheError::Store(format!("invalid table name {table:?}")));
        }

        if let Err(err) = conn.execute_batch("PRAGMA journal_mode = WAL") {
            warn!(error = %err, "could not enable WAL, keeping default journal mode");
        }
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(store_err)?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                key        TEXT PRIMARY KEY,
                body       BLOB NOT NULL,
                status     INTEGER NOT NULL,
                headers    TEXT NOT NULL,
                expires    INTEGER NOT NULL,
                created_at INTEGER NOT NULL
                    DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
            );
            CREATE INDEX IF NOT EXISTS {table}_expires_idx ON {table} (expires);
            "#
        ))
        .map_err(store_err)?;
        debug!(table, "sqlite cache table ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            select_sql: format!(
                "SELECT key, body, status, headers, expires, created_at \
                 FROM {table} WHERE key = ?1 AND expires > ?2"
            )
            .into(),
            upsert_sql: format!(
                "INSERT INTO {table} (key, body, status, headers, expires, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(key) DO UPDATE SET \
                 body = excluded.body, status = excluded.status, headers = excluded.headers, \
                 expires = excluded.expires, created_at = excluded.created_at"
            )
            .into(),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CacheError::Store("sqlite connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| CacheError::Internal(format!("sqlite task failed: {e}")))?
    }
}

// == Row Decoding ==
/// Raw column values, before any shape checks.
struct RawRow {
    key: String,
    body: Vec<u8>,
    status: i64,
    headers: String,
    expires: i64,
    created_at: i64,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            body: row.get(1)?,
            status: row.get(2)?,
            headers: row.get(3)?,
            expires: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry> {
        let status = u16::try_from(self.status)
            .ok()
            .filter(|s| (100..=999).contains(s))
            .ok_or_else(|| CacheError::Decode(format!("status {} out of range", self.status)))?;
        let headers: Vec<HeaderPair> = serde_json::from_str(&self.headers)
            .map_err(|e| CacheError::Decode(format!("headers column: {e}")))?;
        Ok(CacheEntry {
            key: self.key,
            encoded_body: self.body,
            status,
            headers,
            expires_at: from_millis(self.expires)?,
            created_at: from_millis(self.created_at)?,
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| CacheError::Decode(format!("timestamp {ms} out of range")))
}

/// Type mismatches on read are decode failures, everything else is a store failure.
fn read_err(err: rusqlite::Error) -> CacheError {
    match err {
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
            CacheError::Decode(err.to_string())
        }
        other => store_err(other),
    }
}

#[async_trait]
impl CacheBackend for SqliteBackend {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let sql = Arc::clone(&self.select_sql);
        let key = key.to_string();
        let now_ms = now.timestamp_millis();

        let raw = self
            .with_conn(move |conn| {
                conn.query_row(&sql, params![key, now_ms], RawRow::read)
                    .optional()
                    .map_err(read_err)
            })
            .await?;

        raw.map(RawRow::into_entry).transpose()
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        let sql = Arc::clone(&self.upsert_sql);
        let headers = serde_json::to_string(&entry.headers)
            .map_err(|e| CacheError::Internal(format!("headers serialisation: {e}")))?;

        self.with_conn(move |conn| {
            conn.execute(
                &sql,
                params![
                    entry.key,
                    entry.encoded_body,
                    entry.status as i64,
                    headers,
                    entry.expires_at.timestamp_millis(),
                    entry.created_at.timestamp_millis(),
                ],
            )
            .map_err(store_err)?;
            Ok(())
        })
        .await
    }
}
