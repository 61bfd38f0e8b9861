//! Error types for the configuration engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by readers, decoders and the registry.
#[derive(Debug, Error)]
pub enum DistconfError {
    /// A file could not be read.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A present raw value could not be parsed into the target type.
    #[error("invalid {kind} value {value:?}: {reason}")]
    Decode {
        kind: &'static str,
        value: String,
        reason: String,
    },

    /// A key was requested with a type other than the one it was first registered with.
    #[error("key {key:?} registered as {registered}, requested as {requested}")]
    TypeConflict {
        key: String,
        registered: &'static str,
        requested: &'static str,
    },

    /// A source could not answer right now.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The file watcher could not be set up.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl DistconfError {
    pub(crate) fn decode(kind: &'static str, raw: &[u8], reason: impl ToString) -> Self {
        DistconfError::Decode {
            kind,
            value: String::from_utf8_lossy(raw).into_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, DistconfError>;
