//! Signal Routes
//!
//! - GET /api/signals - Distinct signal names ever ingested

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /api/signals
///
/// Sorted array of every signal name with at least one stored point.
pub async fn list_signals(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    let names = state.storage.list_signal_names().await?;
    Ok(Json(names.into_iter().collect()))
}
