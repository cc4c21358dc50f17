//! Telemetry ingestion
//!
//! Validation of producer batches and the append-then-broadcast pipeline.

mod batch;
mod pipeline;

pub use batch::{parse_timestamp, SignalBatch, ValidationError, MAX_SIGNAL_NAME_LEN};
pub use pipeline::{IngestOutcome, Ingestor};
