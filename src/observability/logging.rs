//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Route configuration diagnostics into structured log events
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level configurable via `RUST_LOG`, falling back to a per-binary default

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::distconf::Logger;

/// Install the global subscriber. `default_filter` applies when `RUST_LOG` is unset.
pub fn init(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Logger for the configuration engine: failures at error level, everything
/// else at warn.
pub fn config_logger() -> Logger {
    Logger::new(|key, err, msg| match err {
        Some(err) => tracing::error!(key = %key, error = %err, "{}", msg),
        None => tracing::warn!(key = %key, "{}", msg),
    })
}
