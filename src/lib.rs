//! # Telemetry Hub
//!
//! Collects named numeric signals from producers, stores them durably and
//! fans every accepted batch out to live WebSocket viewers.
//!
//! ## Features
//!
//! - **Durable storage**: SQLite in WAL mode, one transaction per batch
//! - **Windowed history**: every signal in `[now - h, now]`, ascending
//! - **Real-time**: non-blocking fanout with per-subscriber bounded queues
//!
//! ## Modules
//!
//! - [`storage`]: Point store and time-range reads
//! - [`ingest`]: Batch validation and the append-then-broadcast pipeline
//! - [`query`]: Lookback windows resolved against a [`clock::Clock`]
//! - [`websocket`]: Subscriber registry and fanout
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use telemetry_hub::clock::SystemClock;
//! use telemetry_hub::ingest::{Ingestor, SignalBatch};
//! use telemetry_hub::storage::{StorageConfig, StorageEngine};
//! use telemetry_hub::websocket::{ConnectionHub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(StorageEngine::new(StorageConfig::new("./data")).await?);
//!     let hub = Arc::new(ConnectionHub::new(HubConfig::default()));
//!     let ingestor = Ingestor::new(Arc::clone(&storage), hub, Arc::new(SystemClock));
//!
//!     let mut signals = BTreeMap::new();
//!     signals.insert("sine_wave".to_string(), 5.5);
//!     let batch = SignalBatch::new(chrono::Utc::now(), signals)?;
//!
//!     let outcome = ingestor.ingest(&batch).await?;
//!     println!("Stored {} points", outcome.stored);
//!
//!     storage.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod query;
pub mod storage;
pub mod websocket;

// Re-export top-level types for convenience
pub use storage::{
    SeriesPoint, SignalSeries, StorageConfig, StorageEngine, StorageError, StorageResult,
    StorageStats, TelemetryPoint, TimeRange,
};

pub use ingest::{IngestOutcome, Ingestor, SignalBatch, ValidationError};

pub use query::{Lookback, QueryError, QueryExecutor};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use websocket::{ConnectionHub, HubConfig, ServerMessage};

pub use config::{Config, ConfigError};
