use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use tracing::{debug, info};

use crate::store::{BucketStore, KeyType, ScanPage, StoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS keys (
        key  TEXT PRIMARY KEY NOT NULL,
        kind TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS set_members (
        key    TEXT NOT NULL,
        member TEXT NOT NULL,
        PRIMARY KEY (key, member)
    );
    CREATE TABLE IF NOT EXISTS string_values (
        key   TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );
";

/// Durable bucket store on a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let start_time = Instant::now();
        info!(action = "open", component = "sqlite_store", path = ?path, "Opening visit database");

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        let store = Self::with_connection(conn)?;

        info!(
            action = "complete",
            component = "sqlite_store",
            duration_ms = start_time.elapsed().as_millis(),
            "Visit database ready"
        );
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create visit database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Stores a plain string under `key`, replacing whatever was there.
    pub fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM set_members WHERE key = ?1", params![key])?;
        tx.execute(
            "INSERT INTO keys (key, kind) VALUES (?1, 'string')
             ON CONFLICT(key) DO UPDATE SET kind = excluded.kind",
            params![key],
        )?;
        tx.execute(
            "INSERT INTO string_values (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

fn kind_of(conn: &Connection, key: &str) -> Result<KeyType, StoreError> {
    let kind: Option<String> = conn
        .query_row("SELECT kind FROM keys WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(match kind.as_deref() {
        Some("set") => KeyType::Set,
        Some(_) => KeyType::String,
        None => KeyType::None,
    })
}

impl BucketStore for SqliteStore {
    fn add_to_bucket(&self, timestamp: u64, urls: &[String]) -> Result<(), StoreError> {
        if urls.is_empty() {
            return Ok(());
        }
        let key = timestamp.to_string();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        match kind_of(&tx, &key)? {
            KeyType::Set => {}
            KeyType::None => {
                tx.execute(
                    "INSERT INTO keys (key, kind) VALUES (?1, 'set')",
                    params![key],
                )?;
            }
            found => return Err(StoreError::WrongType { key, found }),
        }

        {
            let mut insert = tx.prepare_cached(
                "INSERT OR IGNORE INTO set_members (key, member) VALUES (?1, ?2)",
            )?;
            for url in urls {
                insert.execute(params![key, url])?;
            }
        }
        tx.commit()?;

        debug!(action = "add", component = "sqlite_store", key = %key, url_count = urls.len(), "Added links to bucket");
        Ok(())
    }

    fn scan_page(&self, cursor: Option<&str>, count: usize) -> Result<ScanPage, StoreError> {
        let conn = self.lock()?;
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        let keys: Vec<String> = match cursor {
            Some(last) => conn
                .prepare_cached("SELECT key FROM keys WHERE key > ?1 ORDER BY key LIMIT ?2")?
                .query_map(params![last, limit], |row| row.get(0))?
                .collect::<SqliteResult<Vec<String>>>()?,
            None => conn
                .prepare_cached("SELECT key FROM keys ORDER BY key LIMIT ?1")?
                .query_map(params![limit], |row| row.get(0))?
                .collect::<SqliteResult<Vec<String>>>()?,
        };
        let cursor = if keys.len() == count {
            keys.last().cloned()
        } else {
            None
        };
        Ok(ScanPage { keys, cursor })
    }

    fn type_of(&self, key: &str) -> Result<KeyType, StoreError> {
        let conn = self.lock()?;
        kind_of(&conn, key)
    }

    fn members_of(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        let conn = self.lock()?;
        match kind_of(&conn, key)? {
            KeyType::Set => {
                let members = conn
                    .prepare_cached("SELECT member FROM set_members WHERE key = ?1")?
                    .query_map(params![key], |row| row.get(0))?
                    .collect::<SqliteResult<HashSet<String>>>()?;
                Ok(members)
            }
            KeyType::None => Ok(HashSet::new()),
            found => Err(StoreError::WrongType {
                key: key.to_string(),
                found,
            }),
        }
    }
}
