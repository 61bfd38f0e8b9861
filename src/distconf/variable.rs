//! Typed, hot-reloadable configuration cells.
//!
//! # Responsibilities
//! - Hold the current decoded value of one key behind a lock-free pointer
//! - Decode raw source bytes with the codec fixed at registration
//! - Notify watchers when the decoded value actually changes
//!
//! # Design Decisions
//! - Reads are a single `ArcSwap` load: they never block and never observe
//!   a half-written value
//! - Writers serialize on a small mutex so the compare-and-notify step sees
//!   a consistent previous value
//! - Watchers are snapshotted and invoked after every lock is released, so
//!   a watcher may freely read or update configuration

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

use crate::distconf::decode::Codec;
use crate::distconf::error::Result;

/// Callback invoked with the new value after a change.
pub type Watcher<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One configuration value of type `T`.
pub struct Variable<T> {
    current: ArcSwap<T>,
    default: Arc<T>,
    codec: Codec<T>,
    update_lock: Mutex<()>,
    watchers: Mutex<Vec<Watcher<T>>>,
}

impl<T> Variable<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Create a variable holding `default` until its first update.
    pub fn new(default: T, codec: Codec<T>) -> Self {
        let default = Arc::new(default);
        Self {
            current: ArcSwap::new(default.clone()),
            default,
            codec,
            update_lock: Mutex::new(()),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Borrow-free access to the current value.
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// The value used when no source has the key or its bytes fail to decode.
    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Register a watcher. Watchers run in registration order and are never removed.
    pub fn watch<F>(&self, watcher: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(watcher));
    }

    /// Replace the value with the decode of `raw`, or the default when `raw`
    /// is `None`.
    ///
    /// A decode failure also installs the default and is returned to the caller.
    pub fn update(&self, raw: Option<&[u8]>) -> Result<()> {
        let (next, result) = match raw {
            None => (self.default.clone(), Ok(())),
            Some(bytes) => match (self.codec.decode)(bytes) {
                Ok(value) => (Arc::new(value), Ok(())),
                Err(e) => (self.default.clone(), Err(e)),
            },
        };

        let changed = {
            let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = self.current.swap(next.clone());
            !(self.codec.eq)(&*previous, &*next)
        };

        if changed {
            self.notify(&next);
        }
        result
    }

    fn notify(&self, value: &T) {
        let watchers: Vec<Watcher<T>> = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for watcher in watchers {
            watcher(value);
        }
    }
}

impl<T> Variable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// The current value.
    pub fn get(&self) -> T {
        T::clone(&self.current.load())
    }
}

impl<T: fmt::Debug> fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("kind", &self.codec.kind)
            .field("current", &**self.current.load())
            .field("default", &*self.default)
            .finish()
    }
}

impl<T> serde::Serialize for Variable<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (self.codec.encode)(&self.current.load()).serialize(serializer)
    }
}

/// Type-erased view the registry keeps for every key.
pub(crate) trait AnyVariable: Send + Sync {
    fn update_raw(&self, raw: Option<&[u8]>) -> Result<()>;
    fn snapshot(&self) -> serde_json::Value;
    fn type_name(&self) -> &'static str;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T> AnyVariable for Variable<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn update_raw(&self, raw: Option<&[u8]>) -> Result<()> {
        self.update(raw)
    }

    fn snapshot(&self) -> serde_json::Value {
        (self.codec.encode)(&self.current.load())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
