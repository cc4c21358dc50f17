//! SQLite schema and connection setup
//!
//! One row per telemetry point. Two B-tree indexes keep both lookups
//! sub-linear:
//! - `idx_telemetry_time` for whole-window scans
//! - `idx_telemetry_signal_time` for per-signal windows and DISTINCT names
//!
//! Instants are stored as microseconds since the Unix epoch.

use crate::storage::engine::{StorageConfig, SyncMode};
use crate::storage::error::StorageResult;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS telemetry (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp_us INTEGER NOT NULL,
        signal_name TEXT NOT NULL CHECK (length(signal_name) > 0),
        value REAL NOT NULL CHECK (abs(value) <= 1.7976931348623157e308),
        recorded_at_us INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_telemetry_time
        ON telemetry(timestamp_us);
    CREATE INDEX IF NOT EXISTS idx_telemetry_signal_time
        ON telemetry(signal_name, timestamp_us);
";

pub(crate) const INSERT_POINT: &str = "INSERT INTO telemetry (timestamp_us, signal_name, value, recorded_at_us)
     VALUES (?1, ?2, ?3, ?4)";

pub(crate) const SELECT_RANGE: &str = "SELECT signal_name, timestamp_us, value
     FROM telemetry
     WHERE timestamp_us BETWEEN ?1 AND ?2
     ORDER BY timestamp_us ASC, id ASC";

pub(crate) const SELECT_SIGNAL_RANGE: &str = "SELECT timestamp_us, value
     FROM telemetry
     WHERE signal_name = ?1 AND timestamp_us BETWEEN ?2 AND ?3
     ORDER BY timestamp_us ASC, id ASC";

pub(crate) const SELECT_SIGNAL_NAMES: &str =
    "SELECT DISTINCT signal_name FROM telemetry ORDER BY signal_name ASC";

pub(crate) const COUNT_POINTS: &str = "SELECT COUNT(*) FROM telemetry";

pub(crate) const COUNT_SIGNALS: &str = "SELECT COUNT(DISTINCT signal_name) FROM telemetry";

/// Open the single writer connection, creating the database and schema if needed
pub(crate) fn open_writer(path: &Path, config: &StorageConfig) -> StorageResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

    // journal_mode returns a row, so it goes through query_row
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(journal_mode = %mode, "SQLite did not switch to WAL mode");
    }

    let synchronous = match config.sync_mode {
        SyncMode::Full => "FULL",
        SyncMode::Normal => "NORMAL",
    };
    conn.execute_batch(&format!(
        "PRAGMA synchronous = {};
         PRAGMA temp_store = MEMORY;
         PRAGMA cache_size = 10000;",
        synchronous
    ))?;

    conn.execute_batch(CREATE_SCHEMA)?;

    Ok(conn)
}

/// Open a read-only connection; the writer must have created the schema first
pub(crate) fn open_reader(path: &Path, config: &StorageConfig) -> StorageResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.execute_batch("PRAGMA cache_size = 10000;")?;

    Ok(conn)
}
