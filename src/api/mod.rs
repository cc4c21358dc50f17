//! Telemetry Hub REST API
//!
//! HTTP API layer, built with Axum.
//!
//! # Endpoints
//!
//! ## Telemetry
//! - `POST /api/telemetry` - Ingest one batch
//! - `GET /api/telemetry?hours=<n>` - Recent history of every signal
//!
//! ## Signals
//! - `GET /api/signals` - Distinct signal names
//!
//! ## Health
//! - `GET /health` - Liveness check
//!
//! ## WebSocket
//! - `GET /ws` - Real-time streaming connection
//!
//! # Example
//!
//! ```rust,ignore
//! use telemetry_hub::api::{serve, ApiConfig, AppState};
//! use telemetry_hub::storage::{StorageConfig, StorageEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(StorageEngine::new(StorageConfig::new("./data")).await?);
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(storage, config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/telemetry",
            get(routes::telemetry::get_telemetry).post(routes::telemetry::ingest_telemetry),
        )
        .route("/signals", get(routes::signals::list_signals));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(routes::health::health))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server, stopping on Ctrl-C or SIGTERM
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    serve_with_shutdown(state, config, shutdown_signal()).await
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve_with_shutdown<F>(
    state: AppState,
    config: &ApiConfig,
    shutdown: F,
) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Telemetry hub listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Telemetry hub shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
