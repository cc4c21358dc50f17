//! Query Executor
//!
//! Turns a lookback into a concrete window against the service clock and
//! reads it from the StorageEngine in one call, so the result is a single
//! committed snapshot.
//!
//! ```text
//! Lookback + Clock::now() → TimeRange → StorageEngine::query_range → SignalSeries
//! ```

use crate::clock::Clock;
use crate::query::error::QueryResult;
use crate::query::window::Lookback;
use crate::storage::{SignalSeries, StorageEngine, TimeRange};
use std::sync::Arc;
use std::time::Instant;

/// Query executor
pub struct QueryExecutor {
    /// Reference to storage engine
    storage: Arc<StorageEngine>,
    /// Source of "now"
    clock: Arc<dyn Clock>,
}

impl QueryExecutor {
    /// Create a new query executor
    pub fn new(storage: Arc<StorageEngine>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// The window a lookback resolves to right now
    pub fn window(&self, lookback: Lookback) -> QueryResult<TimeRange> {
        lookback.window_ending_at(self.clock.now())
    }

    /// History of every signal with points in `[now - lookback, now]`
    pub async fn recent(&self, lookback: Lookback) -> QueryResult<SignalSeries> {
        let started = Instant::now();
        let range = self.window(lookback)?;

        let series = self.storage.query_range(None, range).await?;

        tracing::debug!(
            since = %range.since,
            until = %range.until,
            signals = series.len(),
            points = series.values().map(Vec::len).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Executed history query"
        );

        Ok(series)
    }
}
