//! Primary source backed by a last-known-good cache.
//!
//! # Responsibilities
//! - Serve values from the primary source and mirror them into a local cache
//! - Serve the cached value when the primary cannot answer
//! - Export and import the cache as a JSON object for cold starts
//!
//! # Design Decisions
//! - A failing cache never masks anything: only a cache hit turns a primary
//!   error into success
//! - Imports never overwrite keys already cached from the live source

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

use crate::distconf::error::Result;
use crate::distconf::reader::{Dynamic, KeyCallback, Reader, Writer};
use crate::distconf::sources::memory::InMemory;

/// Wraps a push-capable primary source with an [`InMemory`] cache.
pub struct CachedReader<R> {
    cache: InMemory,
    primary: R,
}

impl<R> CachedReader<R>
where
    R: Reader + Dynamic,
{
    pub fn new(primary: R) -> Self {
        Self {
            cache: InMemory::new(),
            primary,
        }
    }

    pub fn primary(&self) -> &R {
        &self.primary
    }

    /// Copy of every cached pair.
    pub fn list_config(&self) -> HashMap<String, Vec<u8>> {
        self.cache.list_config()
    }

    /// Seed the cache; keys already cached are left alone.
    pub fn store_config(&self, to_store: HashMap<String, Vec<u8>>) {
        self.cache.store_config(to_store)
    }

    /// Write the cache as a JSON object of strings.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let as_json: BTreeMap<String, String> = self
            .cache
            .list_config()
            .into_iter()
            .map(|(k, v)| (k, String::from_utf8_lossy(&v).into_owned()))
            .collect();
        serde_json::to_writer(writer, &as_json)?;
        Ok(())
    }

    /// Load a cache previously produced by [`write_to`](Self::write_to).
    /// Returns the number of entries in the stream.
    pub fn read_from<In: Read>(&self, reader: In) -> Result<usize> {
        let as_json: HashMap<String, String> = serde_json::from_reader(reader)?;
        let count = as_json.len();
        self.store_config(
            as_json
                .into_iter()
                .map(|(k, v)| (k, v.into_bytes()))
                .collect(),
        );
        Ok(count)
    }
}

impl<R> Reader for CachedReader<R>
where
    R: Reader + Dynamic,
{
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.primary.get(key) {
            Ok(value) => {
                if let Err(e) = self.cache.write(key, value.as_deref()) {
                    tracing::warn!(key = %key, error = %e, "Failed to update config cache");
                }
                Ok(value)
            }
            Err(err) => match self.cache.get(key) {
                Ok(Some(cached)) => {
                    tracing::debug!(key = %key, error = %err, "Primary source failed, serving cached value");
                    Ok(Some(cached))
                }
                _ => Err(err),
            },
        }
    }

    fn close(&self) {
        self.primary.close()
    }

    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        Some(self)
    }
}

impl<R> Dynamic for CachedReader<R>
where
    R: Reader + Dynamic,
{
    fn watch(&self, key: &str, callback: KeyCallback) -> Result<()> {
        self.primary.watch(key, callback)
    }
}
