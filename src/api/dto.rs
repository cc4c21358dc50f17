//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================
// INGEST DTOs
// ============================================

/// Telemetry batch as posted by a producer
///
/// Fields stay loosely typed so that missing or mistyped members are
/// reported as validation errors rather than deserialization failures.
#[derive(Debug, Deserialize)]
pub struct TelemetryIngestRequest {
    /// ISO-8601 sample time
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Signal name to numeric value
    #[serde(default)]
    pub signals: Option<Map<String, Value>>,
}

/// Ingest response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Status: "success"
    pub status: String,
}

impl IngestResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

// ============================================
// QUERY DTOs
// ============================================

/// Query string of `GET /api/telemetry`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// Lookback in hours, fractional allowed
    pub hours: Option<f64>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "healthy"
    pub status: String,
}
