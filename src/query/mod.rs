//! Telemetry Query Engine
//!
//! Answers "everything from the last N hours":
//!
//! - **Window**: lookback duration parsed from request hours
//! - **Executor**: resolves the window against the clock and reads storage
//!
//! # Example
//!
//! ```rust,ignore
//! use telemetry_hub::query::{Lookback, QueryExecutor};
//!
//! let executor = QueryExecutor::new(storage, clock);
//! let series = executor.recent(Lookback::from_hours(6.0)?).await?;
//! for (signal, points) in &series {
//!     println!("{}: {} points", signal, points.len());
//! }
//! ```

mod error;
mod executor;
mod window;

pub use error::{QueryError, QueryResult};
pub use executor::QueryExecutor;
pub use window::Lookback;
