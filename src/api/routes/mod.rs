//! API Route Handlers
//!
//! Organized by resource type.

pub mod health;
pub mod signals;
pub mod telemetry;
