//! Ingestion pipeline
//!
//! Append first, broadcast second. A batch reaches live subscribers only
//! after its points are committed; if the append fails nothing is pushed.

use std::sync::Arc;

use crate::clock::Clock;
use crate::ingest::batch::SignalBatch;
use crate::storage::{StorageEngine, StorageResult};
use crate::websocket::{BroadcastReport, ConnectionHub, ServerMessage};

/// Result of an accepted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Points persisted
    pub stored: usize,
    /// Fanout result for the batch
    pub broadcast: BroadcastReport,
}

/// Writes batches through storage and hands them to the fanout
pub struct Ingestor {
    storage: Arc<StorageEngine>,
    hub: Arc<ConnectionHub>,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    pub fn new(storage: Arc<StorageEngine>, hub: Arc<ConnectionHub>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            hub,
            clock,
        }
    }

    /// Persist a validated batch atomically, then push it to subscribers
    ///
    /// Only storage failures surface. Fanout problems are logged and the
    /// batch still counts as accepted.
    pub async fn ingest(&self, batch: &SignalBatch) -> StorageResult<IngestOutcome> {
        let stored = self.storage.append(batch.to_points(self.clock.now())).await?;

        let update = ServerMessage::telemetry_update(batch);
        let broadcast = match self.hub.broadcast(&update).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "Broadcast of accepted batch failed");
                BroadcastReport::default()
            }
        };

        tracing::debug!(
            timestamp = %batch.timestamp(),
            stored,
            delivered = broadcast.delivered,
            dropped = broadcast.dropped,
            "Ingested telemetry batch"
        );

        Ok(IngestOutcome { stored, broadcast })
    }
}
