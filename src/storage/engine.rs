//! Telemetry Storage Engine
//!
//! Durable append-only store on top of SQLite in WAL mode:
//! - Write path: batch → writer mutex → one transaction → commit
//! - Read path: reader pool → read transaction → ordered rows
//!
//! Appends are serialised by a single writer connection. Reads go through a
//! small pool of read-only connections and see only committed batches, so a
//! reader never observes half of an append. All SQLite calls run on Tokio's
//! blocking pool.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema;
use crate::storage::types::{SeriesPoint, SignalSeries, TelemetryPoint, TimeRange};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tokio::task;

/// How hard SQLite works to make a commit durable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// fsync on every commit
    Full,
    /// fsync at WAL checkpoints only; a power loss may drop the newest commits
    Normal,
}

/// Configuration for the storage engine
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for the database files
    pub data_dir: PathBuf,
    /// Number of read-only connections in the reader pool
    pub reader_connections: usize,
    /// How long a connection waits on a locked database before failing
    pub busy_timeout_ms: u64,
    /// Commit durability
    pub sync_mode: SyncMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("telemetry_data"),
            reader_connections: 4,
            busy_timeout_ms: 5000,
            sync_mode: SyncMode::Full,
        }
    }
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Get path to the SQLite database file
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("telemetry.db")
    }
}

/// Fixed set of read-only connections handed out round-robin
struct ReaderPool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReaderPool {
    fn open(path: &Path, config: &StorageConfig) -> StorageResult<Self> {
        let connections = (0..config.reader_connections)
            .map(|_| schema::open_reader(path, config).map(Mutex::new))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Take the first idle connection starting at the round-robin cursor,
    /// or wait on the cursor's connection if all are busy
    fn acquire(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        let len = self.connections.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;

        for offset in 0..len {
            match self.connections[(start + offset) % len].try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(e)) => {
                    return Err(StorageError::Lock(format!("Reader connection poisoned: {}", e)))
                }
            }
        }

        self.connections[start]
            .lock()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire reader lock: {}", e)))
    }
}

/// The telemetry storage engine
pub struct StorageEngine {
    config: StorageConfig,
    /// Sole writer; the mutex is the append serialisation point
    writer: Arc<Mutex<Connection>>,
    readers: Arc<ReaderPool>,
}

impl StorageEngine {
    /// Open (or create) the store under `config.data_dir`
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        if config.reader_connections == 0 {
            return Err(StorageError::Config(
                "reader_connections must be at least 1".to_string(),
            ));
        }

        let open_config = config.clone();
        let (writer, readers) = task::spawn_blocking(move || {
            std::fs::create_dir_all(&open_config.data_dir)?;
            let path = open_config.db_path();
            let writer = schema::open_writer(&path, &open_config)?;
            let readers = ReaderPool::open(&path, &open_config)?;
            Ok::<_, StorageError>((writer, readers))
        })
        .await??;

        tracing::info!(
            path = ?config.db_path(),
            readers = config.reader_connections,
            "Storage engine opened"
        );

        Ok(Self {
            config,
            writer: Arc::new(Mutex::new(writer)),
            readers: Arc::new(readers),
        })
    }

    /// Persist all points as one atomic unit
    ///
    /// Either every point becomes visible to readers or, on error, none does.
    pub async fn append(&self, points: Vec<TelemetryPoint>) -> StorageResult<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let writer = Arc::clone(&self.writer);
        let count = task::spawn_blocking(move || {
            let mut conn = writer
                .lock()
                .map_err(|e| StorageError::Lock(format!("Failed to acquire writer lock: {}", e)))?;
            insert_points(&mut conn, &points)
        })
        .await??;

        tracing::debug!(points = count, "Appended telemetry batch");
        Ok(count)
    }

    /// Points with timestamps in `range`, grouped per signal in ascending time order
    ///
    /// With `Some(names)` every requested name is present in the result, with
    /// an empty sequence when it has no points in range. With `None` the result
    /// holds exactly the signals that have points in range.
    pub async fn query_range(
        &self,
        signal_names: Option<&[String]>,
        range: TimeRange,
    ) -> StorageResult<SignalSeries> {
        let names: Option<BTreeSet<String>> = signal_names.map(|n| n.iter().cloned().collect());
        let readers = Arc::clone(&self.readers);

        task::spawn_blocking(move || {
            let mut conn = readers.acquire()?;
            select_range(&mut conn, names.as_ref(), range)
        })
        .await?
    }

    /// Distinct signal names ever persisted, sorted
    pub async fn list_signal_names(&self) -> StorageResult<BTreeSet<String>> {
        let readers = Arc::clone(&self.readers);

        task::spawn_blocking(move || {
            let conn = readers.acquire()?;
            let mut stmt = conn.prepare_cached(schema::SELECT_SIGNAL_NAMES)?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<BTreeSet<_>, _>>()?;
            Ok(names)
        })
        .await?
    }

    /// Total number of stored points
    pub async fn point_count(&self) -> StorageResult<u64> {
        let readers = Arc::clone(&self.readers);

        task::spawn_blocking(move || {
            let conn = readers.acquire()?;
            let count: i64 = conn.query_row(schema::COUNT_POINTS, [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await?
    }

    /// Get storage statistics
    pub async fn stats(&self) -> StorageResult<StorageStats> {
        let readers = Arc::clone(&self.readers);
        let db_path = self.config.db_path();

        task::spawn_blocking(move || {
            let conn = readers.acquire()?;
            let point_count: i64 = conn.query_row(schema::COUNT_POINTS, [], |row| row.get(0))?;
            let signal_count: i64 = conn.query_row(schema::COUNT_SIGNALS, [], |row| row.get(0))?;

            // The WAL file holds commits not yet checkpointed into the main file
            let mut wal_path = db_path.clone().into_os_string();
            wal_path.push("-wal");
            let storage_size_bytes = [db_path, PathBuf::from(wal_path)]
                .iter()
                .filter_map(|p| std::fs::metadata(p).ok())
                .map(|m| m.len())
                .sum();

            Ok(StorageStats {
                point_count: point_count as u64,
                signal_count: signal_count as u64,
                storage_size_bytes,
            })
        })
        .await?
    }

    /// Checkpoint the WAL into the main database file
    pub async fn shutdown(&self) -> StorageResult<()> {
        let writer = Arc::clone(&self.writer);

        task::spawn_blocking(move || {
            let conn = writer
                .lock()
                .map_err(|e| StorageError::Lock(format!("Failed to acquire writer lock: {}", e)))?;
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            Ok::<_, StorageError>(())
        })
        .await??;

        tracing::info!("Storage engine checkpointed");
        Ok(())
    }

    /// Receive stamps of one signal's points, in insertion order
    #[cfg(test)]
    pub(crate) async fn recorded_at(&self, signal_name: &str) -> StorageResult<Vec<DateTime<Utc>>> {
        let readers = Arc::clone(&self.readers);
        let signal_name = signal_name.to_string();

        task::spawn_blocking(move || {
            let conn = readers.acquire()?;
            let mut stmt = conn.prepare(
                "SELECT recorded_at_us FROM telemetry WHERE signal_name = ?1 ORDER BY id",
            )?;
            let micros = stmt
                .query_map(params![signal_name], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            micros.into_iter().map(instant_from_micros).collect()
        })
        .await?
    }
}

fn insert_points(conn: &mut Connection, points: &[TelemetryPoint]) -> StorageResult<usize> {
    // Dropping an uncommitted transaction rolls it back
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(schema::INSERT_POINT)?;
        for point in points {
            stmt.execute(params![
                point.timestamp.timestamp_micros(),
                point.signal_name,
                point.value,
                point.recorded_at.timestamp_micros(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(points.len())
}

fn select_range(
    conn: &mut Connection,
    names: Option<&BTreeSet<String>>,
    range: TimeRange,
) -> StorageResult<SignalSeries> {
    let mut series = SignalSeries::new();

    if let Some(names) = names {
        for name in names {
            series.insert(name.clone(), Vec::new());
        }
    }

    if range.is_empty() {
        return Ok(series);
    }

    // One read transaction so multi-statement reads share a snapshot
    let tx = conn.transaction()?;
    {
        match names {
            Some(names) => {
                let mut stmt = tx.prepare_cached(schema::SELECT_SIGNAL_RANGE)?;
                for name in names {
                    let rows = stmt.query_map(
                        params![name, range.since_micros(), range.until_micros()],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
                    )?;
                    let entry = series.entry(name.clone()).or_default();
                    for row in rows {
                        let (timestamp_us, value) = row?;
                        entry.push(SeriesPoint {
                            timestamp: instant_from_micros(timestamp_us)?,
                            value,
                        });
                    }
                }
            }
            None => {
                let mut stmt = tx.prepare_cached(schema::SELECT_RANGE)?;
                let rows = stmt.query_map(
                    params![range.since_micros(), range.until_micros()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, f64>(2)?,
                        ))
                    },
                )?;
                for row in rows {
                    let (signal_name, timestamp_us, value) = row?;
                    series.entry(signal_name).or_default().push(SeriesPoint {
                        timestamp: instant_from_micros(timestamp_us)?,
                        value,
                    });
                }
            }
        }
    }
    tx.commit()?;

    Ok(series)
}

fn instant_from_micros(micros: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| StorageError::Corruption(format!("timestamp {}us out of range", micros)))
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub point_count: u64,
    pub signal_count: u64,
    pub storage_size_bytes: u64,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Points: {}, Signals: {}, Size: {:.2} MB",
            self.point_count,
            self.signal_count,
            self.storage_size_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}
