//! In-memory source.
//!
//! Usable as a writable override layer, as the backing store of
//! [`CachedReader`](super::CachedReader), or as a test double.

use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::distconf::error::Result;
use crate::distconf::reader::{Dynamic, KeyCallback, Reader, Writer};

/// Thread-safe key/value store that notifies watchers on writes.
#[derive(Default)]
pub struct InMemory {
    vals: DashMap<String, Vec<u8>>,
    watches: DashMap<String, Vec<KeyCallback>>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored key/value pair.
    pub fn list_config(&self) -> HashMap<String, Vec<u8>> {
        self.vals
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Store each pair whose key is not present yet. Existing keys keep their value.
    pub fn store_config(&self, to_store: HashMap<String, Vec<u8>>) {
        let mut inserted = Vec::new();
        for (key, value) in to_store {
            if let Entry::Vacant(slot) = self.vals.entry(key.clone()) {
                slot.insert(value);
                inserted.push(key);
            }
        }
        for key in inserted {
            self.notify(&key);
        }
    }

    fn notify(&self, key: &str) {
        // Clone out so no shard lock is held while callbacks read back.
        let callbacks = self
            .watches
            .get(key)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        for callback in callbacks {
            callback(key);
        }
    }
}

impl Reader for InMemory {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.vals.get(key).map(|r| r.value().clone()))
    }

    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        Some(self)
    }
}

impl Dynamic for InMemory {
    fn watch(&self, key: &str, callback: KeyCallback) -> Result<()> {
        self.watches.entry(key.to_string()).or_default().push(callback);
        Ok(())
    }
}

impl Writer for InMemory {
    fn write(&self, key: &str, value: Option<&[u8]>) -> Result<()> {
        match value {
            Some(v) => {
                self.vals.insert(key.to_string(), v.to_vec());
            }
            None => {
                self.vals.remove(key);
            }
        }
        self.notify(key);
        Ok(())
    }
}
