//! Push notifications for sources that can only be polled.
//!
//! [`PollingReader`] remembers the last bytes it returned for every key and,
//! when refreshed, re-reads the watched keys and notifies only those whose
//! bytes changed. Pair it with a [`Refresher`](crate::distconf::Refresher)
//! to keep an environment or command-line source live.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::distconf::error::{DistconfError, Result};
use crate::distconf::reader::{Dynamic, KeyCallback, Reader};
use crate::distconf::refresher::Refreshable;

type FetchErrorHook = Arc<dyn Fn(&str, &DistconfError) + Send + Sync>;

/// Adds change detection and push notification to any [`Reader`].
pub struct PollingReader<R> {
    inner: R,
    last_known: Mutex<HashMap<String, Option<Vec<u8>>>>,
    watched: Mutex<HashMap<String, Vec<KeyCallback>>>,
    on_fetch_error: Option<FetchErrorHook>,
}

impl<R: Reader> PollingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            last_known: Mutex::new(HashMap::new()),
            watched: Mutex::new(HashMap::new()),
            on_fetch_error: None,
        }
    }

    /// Called for every key that fails to read during [`Refreshable::refresh`].
    pub fn on_fetch_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &DistconfError) + Send + Sync + 'static,
    {
        self.on_fetch_error = Some(Arc::new(hook));
        self
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn observe(&self, key: &str, value: &Option<Vec<u8>>) {
        let (changed, callbacks) = {
            let mut last_known = self.last_known.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = last_known.insert(key.to_string(), value.clone()).flatten();
            let callbacks = self
                .watched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned()
                .unwrap_or_default();
            (previous != *value, callbacks)
        };
        if changed {
            for callback in callbacks {
                callback(key);
            }
        }
    }
}

impl<R: Reader> Reader for PollingReader<R> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.inner.get(key)?;
        self.observe(key, &value);
        Ok(value)
    }

    fn close(&self) {
        self.inner.close()
    }

    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        Some(self)
    }
}

impl<R: Reader> Dynamic for PollingReader<R> {
    fn watch(&self, key: &str, callback: KeyCallback) -> Result<()> {
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push(callback);
        Ok(())
    }
}

impl<R: Reader> Refreshable for PollingReader<R> {
    fn refresh(&self) {
        let keys: Vec<String> = self
            .watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        for key in keys {
            if let Err(e) = self.get(&key) {
                match &self.on_fetch_error {
                    Some(hook) => hook(&key, &e),
                    None => tracing::warn!(key = %key, error = %e, "Failed to poll config source"),
                }
            }
        }
    }
}
