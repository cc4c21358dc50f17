//! WebSocket Message Types
//!
//! Defines all message types exchanged between live viewers and the
//! server. Frames are JSON text tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ingest::SignalBatch;
use crate::storage::serialize_instant;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection acknowledged; the subscriber is now live
    ConnectionResponse {
        /// Always "connected"
        status: String,
    },
    /// A batch was accepted and persisted
    TelemetryUpdate {
        /// Shared timestamp of the batch
        #[serde(serialize_with = "serialize_instant")]
        timestamp: DateTime<Utc>,
        /// Signal values keyed by name
        signals: BTreeMap<String, f64>,
    },
    /// Pong response to ping
    Pong,
    /// Error message
    Error {
        /// Error description
        message: String,
    },
}

impl ServerMessage {
    pub fn connected() -> Self {
        ServerMessage::ConnectionResponse {
            status: "connected".to_string(),
        }
    }

    /// Update carrying an accepted batch's content
    pub fn telemetry_update(batch: &SignalBatch) -> Self {
        ServerMessage::TelemetryUpdate {
            timestamp: batch.timestamp(),
            signals: batch.signals().clone(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
