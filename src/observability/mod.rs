//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! distconf Logger(key, error, message)
//!     → logging.rs (tracing event with key/error fields)
//!     → fmt layer (stderr)
//! ```

pub mod logging;
