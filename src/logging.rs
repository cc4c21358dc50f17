//! Tracing setup
//!
//! `RUST_LOG` wins when set. Otherwise the configured level applies to this
//! crate and to `tower_http` request spans, with everything else at `warn`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Filter directives for a configured level
pub fn default_directives(level: &str) -> String {
    format!("warn,telemetry_hub={level},tower_http={level}", level = level.trim())
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.level)))
        .unwrap_or_else(|_| EnvFilter::new(default_directives("info")))
}

/// Install the global subscriber
///
/// Fails if one is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = build_filter(config);

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    }
}
