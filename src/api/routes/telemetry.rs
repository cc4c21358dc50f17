//! Telemetry Routes
//!
//! - POST /api/telemetry - Ingest one batch
//! - GET /api/telemetry?hours=<n> - Recent history of every signal

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use std::sync::Arc;

use crate::api::dto::{HistoryParams, IngestResponse, TelemetryIngestRequest};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::ingest::SignalBatch;
use crate::query::Lookback;
use crate::storage::SignalSeries;

/// POST /api/telemetry
///
/// Validates the batch, persists it atomically and pushes it to live
/// subscribers. Malformed bodies are validation errors like any other.
pub async fn ingest_telemetry(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TelemetryIngestRequest>, JsonRejection>,
) -> ApiResult<Json<IngestResponse>> {
    let Json(req) = payload?;

    let batch = SignalBatch::parse(req.timestamp.as_deref(), req.signals.as_ref())?;
    let outcome = state.ingestor.ingest(&batch).await?;

    tracing::info!(
        signal_count = outcome.stored,
        delivered = outcome.broadcast.delivered,
        dropped = outcome.broadcast.dropped,
        "Telemetry batch accepted"
    );

    Ok(Json(IngestResponse::success()))
}

/// GET /api/telemetry
///
/// Every signal with points in `[now - hours, now]`, each series ascending
/// by timestamp. Signals without points in the window are omitted.
pub async fn get_telemetry(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<Json<SignalSeries>> {
    let Query(params) = params?;

    let hours = params.hours.unwrap_or(state.config.default_window_hours);
    let lookback = Lookback::from_hours(hours)?;

    let series = state.executor.recent(lookback).await?;
    Ok(Json(series))
}
