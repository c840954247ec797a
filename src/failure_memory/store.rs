//! SQLite table of recorded failures.
//!
//! One row per `(tool_signature, env_snapshot_hash)`. Every statement runs
//! under a single connection mutex, so an upsert can never lose a concurrent
//! increment.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use thiserror::Error;

use crate::failure_memory::classify::ErrorType;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS failure_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tool_signature TEXT NOT NULL,
    env_snapshot_hash TEXT NOT NULL,
    error_type TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 1,
    created_at REAL NOT NULL,
    updated_at REAL NOT NULL,
    error_message TEXT NOT NULL DEFAULT '',
    tool_name TEXT NOT NULL DEFAULT '',
    evolution_status TEXT NOT NULL DEFAULT 'PENDING',
    UNIQUE (tool_signature, env_snapshot_hash)
);
CREATE INDEX IF NOT EXISTS idx_failure_records_signature ON failure_records (tool_signature);
CREATE INDEX IF NOT EXISTS idx_failure_records_updated ON failure_records (updated_at);
";

const COLUMNS: &str = "id, tool_signature, env_snapshot_hash, error_type, retry_count, \
                       created_at, updated_at, error_message, tool_name, evolution_status";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare store directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionStatus {
    Pending,
    Resolved,
    Ignored,
}

impl EvolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvolutionStatus::Pending => "PENDING",
            EvolutionStatus::Resolved => "RESOLVED",
            EvolutionStatus::Ignored => "IGNORED",
        }
    }
}

impl fmt::Display for EvolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvolutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EvolutionStatus::Pending),
            "RESOLVED" => Ok(EvolutionStatus::Resolved),
            "IGNORED" => Ok(EvolutionStatus::Ignored),
            other => Err(format!("unknown evolution status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub id: i64,
    pub tool_signature: String,
    pub env_snapshot_hash: String,
    pub error_type: ErrorType,
    pub retry_count: u32,
    pub created_at: f64,
    pub updated_at: f64,
    pub error_message: String,
    pub tool_name: String,
    pub evolution_status: EvolutionStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureStats {
    pub total: u64,
    pub hard_errors: u64,
    pub soft_errors: u64,
    pub pending: u64,
    pub resolved: u64,
    pub ignored: u64,
}

/// Fields of one failure to upsert.
#[derive(Debug, Clone, Copy)]
pub struct NewFailure<'a> {
    pub tool_signature: &'a str,
    pub env_snapshot_hash: &'a str,
    pub tool_name: &'a str,
    pub error_type: ErrorType,
    pub error_message: &'a str,
}

pub struct FailureStore {
    conn: Mutex<Connection>,
}

impl FailureStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("failure store mutex poisoned")
    }

    /// Insert a first failure or bump an existing row back to PENDING.
    pub fn upsert_failure(&self, failure: NewFailure<'_>, now: f64) -> Result<FailureRecord, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO failure_records
                 (tool_signature, env_snapshot_hash, error_type, retry_count,
                  created_at, updated_at, error_message, tool_name, evolution_status)
             VALUES (?1, ?2, ?3, 1, ?4, ?4, ?5, ?6, 'PENDING')
             ON CONFLICT (tool_signature, env_snapshot_hash) DO UPDATE SET
                 retry_count = retry_count + 1,
                 updated_at = excluded.updated_at,
                 error_type = excluded.error_type,
                 error_message = excluded.error_message,
                 tool_name = excluded.tool_name,
                 evolution_status = 'PENDING'",
            params![
                failure.tool_signature,
                failure.env_snapshot_hash,
                failure.error_type.as_str(),
                now,
                failure.error_message,
                failure.tool_name,
            ],
        )?;
        let record = conn.query_row(
            &format!(
                "SELECT {} FROM failure_records WHERE tool_signature = ?1 AND env_snapshot_hash = ?2",
                COLUMNS
            ),
            params![failure.tool_signature, failure.env_snapshot_hash],
            record_from_row,
        )?;
        Ok(record)
    }

    /// Set the status of one row. Returns false when no row matched.
    pub fn set_status(
        &self,
        tool_signature: &str,
        env_snapshot_hash: &str,
        status: EvolutionStatus,
        now: f64,
    ) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "UPDATE failure_records SET evolution_status = ?3, updated_at = ?4
             WHERE tool_signature = ?1 AND env_snapshot_hash = ?2",
            params![tool_signature, env_snapshot_hash, status.as_str(), now],
        )?;
        Ok(changed > 0)
    }

    /// Delete rows whose TTL has elapsed since their last update.
    pub fn purge_expired(&self, now: f64, hard_ttl: Duration, soft_ttl: Duration) -> Result<usize, StoreError> {
        let deleted = self.conn().execute(
            "DELETE FROM failure_records
             WHERE (error_type = 'HARD' AND updated_at < ?1)
                OR (error_type = 'SOFT' AND updated_at < ?2)",
            params![now - hard_ttl.as_secs_f64(), now - soft_ttl.as_secs_f64()],
        )?;
        Ok(deleted)
    }

    /// PENDING rows for a signature, worst first.
    pub fn pending_for_signature(&self, tool_signature: &str) -> Result<Vec<FailureRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM failure_records
             WHERE tool_signature = ?1 AND evolution_status = 'PENDING'
             ORDER BY retry_count DESC, updated_at DESC",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![tool_signature], record_from_row)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn get(&self, tool_signature: &str, env_snapshot_hash: &str) -> Result<Option<FailureRecord>, StoreError> {
        let record = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM failure_records WHERE tool_signature = ?1 AND env_snapshot_hash = ?2",
                    COLUMNS
                ),
                params![tool_signature, env_snapshot_hash],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn stats(&self) -> Result<FailureStats, StoreError> {
        let stats = self.conn().query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(error_type = 'HARD'), 0),
                    COALESCE(SUM(error_type = 'SOFT'), 0),
                    COALESCE(SUM(evolution_status = 'PENDING'), 0),
                    COALESCE(SUM(evolution_status = 'RESOLVED'), 0),
                    COALESCE(SUM(evolution_status = 'IGNORED'), 0)
             FROM failure_records",
            [],
            |row| {
                Ok(FailureStats {
                    total: row.get::<_, i64>(0)? as u64,
                    hard_errors: row.get::<_, i64>(1)? as u64,
                    soft_errors: row.get::<_, i64>(2)? as u64,
                    pending: row.get::<_, i64>(3)? as u64,
                    resolved: row.get::<_, i64>(4)? as u64,
                    ignored: row.get::<_, i64>(5)? as u64,
                })
            },
        )?;
        Ok(stats)
    }

    /// Most recently updated rows first.
    pub fn recent(&self, limit: usize) -> Result<Vec<FailureRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM failure_records ORDER BY updated_at DESC, id DESC LIMIT ?1",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], record_from_row)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl fmt::Debug for FailureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureStore").finish_non_exhaustive()
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FailureRecord> {
    Ok(FailureRecord {
        id: row.get(0)?,
        tool_signature: row.get(1)?,
        env_snapshot_hash: row.get(2)?,
        error_type: parse_column(row, 3)?,
        retry_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        error_message: row.get(7)?,
        tool_name: row.get(8)?,
        evolution_status: parse_column(row, 9)?,
    })
}

fn parse_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);
    const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

    fn failure<'a>(env: &'a str, error_type: ErrorType) -> NewFailure<'a> {
        NewFailure {
            tool_signature: "sig",
            env_snapshot_hash: env,
            tool_name: "shell",
            error_type,
            error_message: "boom",
        }
    }

    #[test]
    fn test_repeat_failures_increment_one_row() {
        let store = FailureStore::open_in_memory().unwrap();
        store.upsert_failure(failure("env", ErrorType::Hard), 100.0).unwrap();
        store.upsert_failure(failure("env", ErrorType::Hard), 200.0).unwrap();
        let record = store.upsert_failure(failure("env", ErrorType::Hard), 300.0).unwrap();

        assert_eq!(record.retry_count, 3);
        assert_eq!(record.created_at, 100.0);
        assert_eq!(record.updated_at, 300.0);
        assert_eq!(store.stats().unwrap().total, 1);
    }

    #[test]
    fn test_failure_after_resolve_returns_to_pending() {
        let store = FailureStore::open_in_memory().unwrap();
        store.upsert_failure(failure("env", ErrorType::Hard), 1.0).unwrap();
        assert!(store.set_status("sig", "env", EvolutionStatus::Resolved, 2.0).unwrap());
        assert!(store.pending_for_signature("sig").unwrap().is_empty());

        let record = store.upsert_failure(failure("env", ErrorType::Hard), 3.0).unwrap();
        assert_eq!(record.evolution_status, EvolutionStatus::Pending);
        assert_eq!(record.retry_count, 2);
    }

    #[test]
    fn test_set_status_on_missing_row() {
        let store = FailureStore::open_in_memory().unwrap();
        assert!(!store.set_status("sig", "env", EvolutionStatus::Ignored, 1.0).unwrap());
    }

    #[test]
    fn test_purge_respects_type_ttls() {
        let store = FailureStore::open_in_memory().unwrap();
        store.upsert_failure(failure("soft", ErrorType::Soft), 0.0).unwrap();
        store.upsert_failure(failure("hard", ErrorType::Hard), 0.0).unwrap();

        assert_eq!(store.purge_expired(HOUR.as_secs_f64() - 1.0, WEEK, HOUR).unwrap(), 0);
        assert_eq!(store.purge_expired(HOUR.as_secs_f64() + 1.0, WEEK, HOUR).unwrap(), 1);
        assert!(store.get("sig", "soft").unwrap().is_none());
        assert!(store.get("sig", "hard").unwrap().is_some());
        assert_eq!(store.purge_expired(WEEK.as_secs_f64() + 1.0, WEEK, HOUR).unwrap(), 1);
    }

    #[test]
    fn test_stats_and_recent() {
        let store = FailureStore::open_in_memory().unwrap();
        assert_eq!(store.stats().unwrap(), FailureStats::default());

        store.upsert_failure(failure("a", ErrorType::Hard), 1.0).unwrap();
        store.upsert_failure(failure("b", ErrorType::Soft), 2.0).unwrap();
        store.upsert_failure(failure("c", ErrorType::Soft), 3.0).unwrap();
        store.set_status("sig", "a", EvolutionStatus::Resolved, 4.0).unwrap();
        store.set_status("sig", "b", EvolutionStatus::Ignored, 1.5).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(
            stats,
            FailureStats { total: 3, hard_errors: 1, soft_errors: 2, pending: 1, resolved: 1, ignored: 1 }
        );

        let recent: Vec<String> = store.recent(2).unwrap().into_iter().map(|r| r.env_snapshot_hash).collect();
        assert_eq!(recent, vec!["a", "c"]);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.db");
        let store = FailureStore::open(&path).unwrap();
        store.upsert_failure(failure("env", ErrorType::Soft), 1.0).unwrap();
        drop(store);

        let reopened = FailureStore::open(&path).unwrap();
        assert_eq!(reopened.get("sig", "env").unwrap().map(|r| r.retry_count), Some(1));
    }
}
