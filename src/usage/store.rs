//! SQLite-backed local usage records
//!
//! The local database is the source of truth for UX-blocking decisions;
//! the backend copy is a best-effort mirror. One row per user per
//! reference-timezone day; a new day is a new row, so prior days become
//! historical without any explicit reset.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::error::StoreError;

pub struct UsageStore {
    conn: Mutex<Connection>,
}

impl UsageStore {
    /// Create or open the usage database at `<config_dir>/wishwell/usage.db`.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(&path)
    }

    /// Open a usage database at an explicit path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ai_usage (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_ai_usage_date
                ON ai_usage(user_id, date DESC);
        "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn default_path() -> Result<PathBuf, StoreError> {
        dirs::config_dir()
            .map(|d| d.join("wishwell").join("usage.db"))
            .ok_or(StoreError::NoConfigDir)
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("usage store mutex was poisoned, recovering inner value");
            poisoned.into_inner()
        })
    }

    /// Count recorded for a user on a given day key. Missing row reads as 0.
    pub fn count_for(&self, user_id: &str, day: &str) -> Result<u32, StoreError> {
        let conn = self.lock_conn();
        let count = conn
            .query_row(
                "SELECT count FROM ai_usage WHERE user_id = ? AND date = ?",
                params![user_id, day],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    /// Increment the counter for a day atomically, returning the new count.
    pub fn increment(&self, user_id: &str, day: &str) -> Result<u32, StoreError> {
        let conn = self.lock_conn();
        conn.execute(
            r#"
            INSERT INTO ai_usage (user_id, date, count)
            VALUES (?1, ?2, 1)
            ON CONFLICT(user_id, date) DO UPDATE SET
                count = count + 1
            "#,
            params![user_id, day],
        )?;
        conn.query_row(
            "SELECT count FROM ai_usage WHERE user_id = ? AND date = ?",
            params![user_id, day],
            |row| row.get(0),
        )
        .map_err(StoreError::from)
    }

    /// Force the counter for a day to an explicit value.
    pub fn set_count(&self, user_id: &str, day: &str, count: u32) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        conn.execute(
            r#"
            INSERT INTO ai_usage (user_id, date, count)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, date) DO UPDATE SET
                count = excluded.count
            "#,
            params![user_id, day, count],
        )?;
        Ok(())
    }
}
