//! Source traits and the diagnostic logger.

use std::fmt;
use std::sync::Arc;

use crate::distconf::error::{DistconfError, Result};

/// Callback a dynamic source invokes with the name of a key that may have changed.
pub type KeyCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A source of raw configuration bytes.
pub trait Reader: Send + Sync {
    /// Look up `key`.
    ///
    /// `Ok(None)` means this source does not have the key and the next source
    /// should be asked. `Err` means the source could not answer right now.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Release any resources held by the source.
    fn close(&self) {}

    /// Push capability, if this source supports it.
    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        None
    }
}

/// A source that can notify about changes instead of only being polled.
pub trait Dynamic: Send + Sync {
    /// Invoke `callback` whenever `key` may have changed.
    fn watch(&self, key: &str, callback: KeyCallback) -> Result<()>;
}

/// A source whose values can be modified.
pub trait Writer {
    /// Store `value` under `key`; `None` removes the key.
    fn write(&self, key: &str, value: Option<&[u8]>) -> Result<()>;
}

impl<R: Reader + ?Sized> Reader for Arc<R> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn close(&self) {
        (**self).close()
    }

    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        (**self).as_dynamic()
    }
}

impl<D: Dynamic + ?Sized> Dynamic for Arc<D> {
    fn watch(&self, key: &str, callback: KeyCallback) -> Result<()> {
        (**self).watch(key, callback)
    }
}

/// Sink for every diagnostic the engine produces: `(key, error, message)`.
#[derive(Clone)]
pub struct Logger(Arc<dyn Fn(&str, Option<&DistconfError>, &str) + Send + Sync>);

impl Logger {
    /// Wrap a custom logging callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, Option<&DistconfError>, &str) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Forward diagnostics to `tracing` at warn level.
    pub fn tracing() -> Self {
        Self::new(|key, err, msg| match err {
            Some(err) => tracing::warn!(key = %key, error = %err, "{}", msg),
            None => tracing::warn!(key = %key, "{}", msg),
        })
    }

    /// Drop every diagnostic.
    pub fn discard() -> Self {
        Self::new(|_, _, _| {})
    }

    pub fn log(&self, key: &str, err: Option<&DistconfError>, msg: &str) {
        (self.0)(key, err, msg)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Logger")
    }
}
