//! Process environment source.

use std::fmt;
use std::sync::Arc;

use crate::distconf::error::Result;
use crate::distconf::reader::Reader;

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads `prefix + key` from the environment on every call.
///
/// An empty variable counts as absent.
#[derive(Clone, Default)]
pub struct Env {
    prefix: String,
    lookup: Option<Lookup>,
}

impl Env {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            lookup: None,
        }
    }

    /// Use `lookup` instead of the real process environment.
    pub fn with_lookup<F>(prefix: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            prefix: prefix.into(),
            lookup: Some(Arc::new(lookup)),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.lookup {
            Some(lookup) => lookup(name),
            None => std::env::var(name).ok(),
        }
    }
}

impl Reader for Env {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let name = format!("{}{}", self.prefix, key);
        Ok(self
            .var(&name)
            .filter(|v| !v.is_empty())
            .map(String::into_bytes))
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env").field("prefix", &self.prefix).finish()
    }
}
