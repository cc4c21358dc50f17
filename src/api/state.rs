//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::clock::{Clock, SystemClock};
use crate::ingest::Ingestor;
use crate::query::QueryExecutor;
use crate::storage::StorageEngine;
use crate::websocket::{ConnectionHub, HubConfig};
use std::sync::Arc;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Storage engine for reading/writing telemetry points
    pub storage: Arc<StorageEngine>,
    /// Windowed history reads
    pub executor: Arc<QueryExecutor>,
    /// Append-then-broadcast pipeline
    pub ingestor: Arc<Ingestor>,
    /// WebSocket connection hub for real-time streaming
    pub ws_hub: Arc<ConnectionHub>,
    /// API configuration
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// Create a new AppState on the system clock with default hub limits
    pub fn new(storage: Arc<StorageEngine>, config: ApiConfig) -> Self {
        Self::with_parts(
            storage,
            Arc::new(ConnectionHub::new(HubConfig::default())),
            Arc::new(SystemClock),
            config,
        )
    }

    /// Create AppState from explicitly provided components
    pub fn with_parts(
        storage: Arc<StorageEngine>,
        ws_hub: Arc<ConnectionHub>,
        clock: Arc<dyn Clock>,
        config: ApiConfig,
    ) -> Self {
        let executor = Arc::new(QueryExecutor::new(Arc::clone(&storage), Arc::clone(&clock)));
        let ingestor = Arc::new(Ingestor::new(Arc::clone(&storage), Arc::clone(&ws_hub), clock));

        Self {
            storage,
            executor,
            ingestor,
            ws_hub,
            config: Arc::new(config),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Lookback used by `GET /api/telemetry` when `hours` is absent
    pub default_window_hours: f64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            default_window_hours: 1.0,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
