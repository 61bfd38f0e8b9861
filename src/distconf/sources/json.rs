//! JSON file source.
//!
//! The document is a flat object of string keys to string values. Values are
//! handed out as raw bytes and decoded by the consuming variable, so
//! `{"MaxRetries": "7"}` feeds an integer key.
//!
//! Until a document has been loaded successfully the source reports itself
//! unavailable, which lets a [`CachedReader`](super::CachedReader) serve its
//! last-known-good values instead.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;

use crate::distconf::error::{DistconfError, Result};
use crate::distconf::reader::{Dynamic, KeyCallback, Reader};

/// Snapshot of a JSON document, reloaded atomically on refresh.
#[derive(Default)]
pub struct JsonConfig {
    vals: ArcSwapOption<HashMap<String, Vec<u8>>>,
    watches: Mutex<HashMap<String, Vec<KeyCallback>>>,
}

impl JsonConfig {
    /// A source with no document loaded yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source loaded from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::new();
        config.refresh_file(path)?;
        Ok(config)
    }

    /// Reload from `path`. On failure the previous snapshot stays in place.
    pub fn refresh_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DistconfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.refresh(BufReader::new(file))?;
        tracing::debug!(path = %path.display(), "JSON config reloaded");
        Ok(())
    }

    /// Reload from any byte stream.
    ///
    /// Every watched key is notified afterwards, changed or not; consumers
    /// drop no-op updates themselves.
    pub fn refresh<R: Read>(&self, input: R) -> Result<()> {
        let contents: HashMap<String, String> = serde_json::from_reader(input)?;
        let snapshot = contents
            .into_iter()
            .map(|(k, v)| (k, v.into_bytes()))
            .collect::<HashMap<_, _>>();
        self.vals.store(Some(Arc::new(snapshot)));

        let watches = self
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (key, callbacks) in watches {
            for callback in callbacks {
                callback(&key);
            }
        }
        Ok(())
    }

    /// Keys present in the current snapshot.
    pub fn keys(&self) -> Vec<String> {
        match &*self.vals.load() {
            Some(vals) => vals.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Whether a document has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.vals.load().is_some()
    }
}

impl Reader for JsonConfig {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match &*self.vals.load() {
            Some(vals) => Ok(vals.get(key).cloned()),
            None => Err(DistconfError::Unavailable(
                "no JSON document loaded".to_string(),
            )),
        }
    }

    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        Some(self)
    }
}

impl Dynamic for JsonConfig {
    fn watch(&self, key: &str, callback: KeyCallback) -> Result<()> {
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push(callback);
        Ok(())
    }
}
