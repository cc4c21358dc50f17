//! Telemetry Storage Engine
//!
//! This module provides the durable store for telemetry points:
//!
//! - **types**: Core data structures (TelemetryPoint, SeriesPoint, TimeRange)
//! - **schema**: SQLite table, indexes and connection setup
//! - **engine**: Storage engine with a single writer and a reader pool
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Vec<TelemetryPoint> → writer mutex → BEGIN → INSERT × n → COMMIT
//!
//! Read Path:
//!   TimeRange → reader pool → index range scan → per-signal series
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use telemetry_hub::storage::{StorageConfig, StorageEngine, TelemetryPoint, TimeRange};
//! use chrono::{Duration, Utc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = StorageEngine::new(StorageConfig::new("./data")).await?;
//!
//!     let now = Utc::now();
//!     engine.append(vec![TelemetryPoint::new("sine_wave", 5.5, now, now)]).await?;
//!
//!     let range = TimeRange::lookback(now, Duration::hours(1));
//!     let series = engine.query_range(None, range).await?;
//!     println!("{} signals in the last hour", series.len());
//!
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
mod schema;
pub mod types;

// Re-export commonly used types
pub use engine::{StorageConfig, StorageEngine, StorageStats, SyncMode};
pub use error::{StorageError, StorageResult};
pub use types::{
    format_instant, serialize_instant, SeriesPoint, SignalSeries, TelemetryPoint, TimeRange,
};
