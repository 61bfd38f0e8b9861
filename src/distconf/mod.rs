//! Dynamic configuration engine.
//!
//! # Data Flow
//! ```text
//! Distconf::int("MaxRetries", 3)
//!     → first access: walk readers in order, first present value wins
//!     → decode into Variable<i64> (default when absent or invalid)
//!     → dynamic reader on the path? register a key callback on every dynamic reader
//!
//! Source change (push):
//!     JsonConfig::refresh / InMemory::write / PollingReader::refresh
//!     → key callback → registry re-walks all readers for that key
//!     → Variable::update → watchers fire if the decoded value changed
//!
//! Source change (poll):
//!     Refresher tick → Refreshable::refresh → same re-walk per key
//! ```
//!
//! # Design Decisions
//! - One registry object per process, passed by reference; no globals
//! - The registry lock covers map lookup/insert only, never a reader or watcher call
//! - Per-key initialization runs exactly once; concurrent first callers wait for it
//! - Every failure degrades to a default value and a logged diagnostic

pub mod decode;
pub mod error;
pub mod reader;
pub mod refresher;
pub mod sources;
pub mod variable;
pub mod watcher;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use decode::{format_duration, parse_bool, parse_duration, Codec};
pub use error::{DistconfError, Result};
pub use reader::{Dynamic, KeyCallback, Logger, Reader, Writer};
pub use refresher::{ComboRefresher, Refreshable, Refresher};
pub use variable::Variable;
pub use watcher::FileWatcher;

use variable::AnyVariable;

struct Tracker {
    variable: Arc<dyn AnyVariable>,
    initialized: OnceLock<()>,
}

struct Shared {
    readers: Vec<Arc<dyn Reader>>,
    logger: Logger,
    vars: Mutex<HashMap<String, Arc<Tracker>>>,
}

/// Registry of typed configuration keys resolved against an ordered reader chain.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone)]
pub struct Distconf {
    shared: Arc<Shared>,
}

impl Distconf {
    /// Build a registry over `readers`, highest precedence first, logging through `tracing`.
    pub fn new(readers: Vec<Arc<dyn Reader>>) -> Self {
        Self::with_logger(readers, Logger::default())
    }

    pub fn with_logger(readers: Vec<Arc<dyn Reader>>, logger: Logger) -> Self {
        Self {
            shared: Arc::new(Shared {
                readers,
                logger,
                vars: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Integer value for `key`.
    pub fn int(&self, key: &str, default: i64) -> Arc<Variable<i64>> {
        self.handle(key, default, Codec::int())
    }

    /// Float value for `key`.
    pub fn float(&self, key: &str, default: f64) -> Arc<Variable<f64>> {
        self.handle(key, default, Codec::float())
    }

    /// Boolean value for `key`.
    pub fn bool(&self, key: &str, default: bool) -> Arc<Variable<bool>> {
        self.handle(key, default, Codec::bool())
    }

    /// String value for `key`.
    pub fn string(&self, key: &str, default: impl Into<String>) -> Arc<Variable<String>> {
        self.handle(key, default.into(), Codec::string())
    }

    /// Duration value for `key`, written like `1h30m` or `250ms`.
    pub fn duration(&self, key: &str, default: Duration) -> Arc<Variable<Duration>> {
        self.handle(key, default, Codec::duration())
    }

    /// Structured value for `key`, stored in sources as a JSON document.
    pub fn structured<T>(&self, key: &str, default: T) -> Arc<Variable<T>>
    where
        T: DeserializeOwned + Serialize + PartialEq + Send + Sync + 'static,
    {
        self.handle(key, default, Codec::json())
    }

    /// Register `key` with an explicit codec.
    ///
    /// Returns the variable already bound to `key` if there is one. Fails with
    /// [`DistconfError::TypeConflict`] when that variable has a different type.
    pub fn register<T>(&self, key: &str, default: T, codec: Codec<T>) -> Result<Arc<Variable<T>>>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        self.bind(key, Arc::new(Variable::new(default, codec)))
    }

    /// Like [`register`](Self::register), but a type conflict is logged and
    /// answered with a detached variable that only ever holds `default`.
    fn handle<T>(&self, key: &str, default: T, codec: Codec<T>) -> Arc<Variable<T>>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        let fresh = Arc::new(Variable::new(default, codec));
        match self.bind(key, fresh.clone()) {
            Ok(var) => var,
            Err(e) => {
                self.shared
                    .logger
                    .log(key, Some(&e), "Registering key with multiple types");
                fresh
            }
        }
    }

    fn bind<T>(&self, key: &str, fresh: Arc<Variable<T>>) -> Result<Arc<Variable<T>>>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        let tracker = {
            let mut vars = self.shared.vars.lock().unwrap_or_else(PoisonError::into_inner);
            vars.entry(key.to_string())
                .or_insert_with(|| {
                    Arc::new(Tracker {
                        variable: fresh,
                        initialized: OnceLock::new(),
                    })
                })
                .clone()
        };

        tracker
            .initialized
            .get_or_init(|| Shared::initialize(&self.shared, key, tracker.variable.as_ref()));

        let registered = tracker.variable.type_name();
        tracker
            .variable
            .clone()
            .into_any()
            .downcast::<Variable<T>>()
            .map_err(|_| DistconfError::TypeConflict {
                key: key.to_string(),
                registered,
                requested: std::any::type_name::<T>(),
            })
    }

    /// All registered keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.shared
            .vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Current value of every registered key as a JSON object.
    pub fn snapshot(&self) -> serde_json::Value {
        let trackers = self.trackers();
        let map = trackers
            .into_iter()
            .map(|(key, tracker)| (key, tracker.variable.snapshot()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    /// Close every reader. Variables keep their last values.
    pub fn close(&self) {
        for reader in &self.shared.readers {
            reader.close();
        }
    }

    fn trackers(&self) -> Vec<(String, Arc<Tracker>)> {
        self.shared
            .vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, t)| (k.clone(), t.clone()))
            .collect()
    }
}

impl Refreshable for Distconf {
    /// Re-resolve every registered key, for readers that cannot push.
    fn refresh(&self) {
        for (key, tracker) in self.trackers() {
            self.shared.resolve(&key, tracker.variable.as_ref());
        }
    }
}

impl Shared {
    fn initialize(shared: &Arc<Shared>, key: &str, variable: &dyn AnyVariable) {
        if shared.resolve(key, variable) {
            Shared::watch(shared, key);
        }
    }

    /// Feed the first present value in the reader chain into `variable`.
    /// Returns whether a dynamic reader was consulted on the way.
    fn resolve(&self, key: &str, variable: &dyn AnyVariable) -> bool {
        let mut dynamic_on_path = false;
        for reader in &self.readers {
            dynamic_on_path |= reader.as_dynamic().is_some();

            match reader.get(key) {
                Err(e) => {
                    self.logger.log(key, Some(&e), "Unable to read from backing");
                }
                Ok(None) => {}
                Ok(Some(raw)) => {
                    if let Err(e) = variable.update_raw(Some(&raw)) {
                        self.logger.log(key, Some(&e), "Invalid config bytes");
                    }
                    return dynamic_on_path;
                }
            }
        }

        if let Err(e) = variable.update_raw(None) {
            self.logger.log(key, Some(&e), "Unable to reset to default");
        }
        // Without a dynamic reader on the path the value can never change by push.
        dynamic_on_path
    }

    fn watch(shared: &Arc<Shared>, key: &str) {
        for reader in &shared.readers {
            let Some(dynamic) = reader.as_dynamic() else {
                continue;
            };
            let weak: Weak<Shared> = Arc::downgrade(shared);
            let callback: KeyCallback = Arc::new(move |changed: &str| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_backing_change(changed);
                }
            });
            if let Err(e) = dynamic.watch(key, callback) {
                shared.logger.log(key, Some(&e), "Unable to watch for config var");
            }
        }
    }

    fn on_backing_change(&self, key: &str) {
        let tracker = self
            .vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        match tracker {
            Some(tracker) => {
                self.resolve(key, tracker.variable.as_ref());
            }
            None => self
                .logger
                .log(key, None, "Backing callback on variable that doesn't exist"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distconf::sources::{CommandLine, Env, InMemory, JsonConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn capture() -> (Logger, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let l = lines.clone();
        let logger = Logger::new(move |key, err, msg| {
            let err = err.map(|e| e.to_string()).unwrap_or_default();
            l.lock().unwrap().push(format!("{key}|{msg}|{err}"));
        });
        (logger, lines)
    }

    struct Failing;

    impl Reader for Failing {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(DistconfError::Unavailable("backend down".into()))
        }
    }

    #[test]
    fn test_default_when_no_reader_has_key() {
        let conf = Distconf::with_logger(vec![Arc::new(InMemory::new())], Logger::discard());
        assert_eq!(conf.int("MaxRetries", 3).get(), 3);
        assert_eq!(conf.string("Name", "hebe").get(), "hebe");
        assert!(!conf.bool("Debug", false).get());
    }

    #[test]
    fn test_same_key_same_variable() {
        let mem = Arc::new(InMemory::new());
        let conf = Distconf::with_logger(vec![mem.clone()], Logger::discard());
        let a = conf.int("Port", 1);
        let b = conf.int("Port", 2);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.get(), 1);

        mem.write("Port", Some(b"9")).unwrap();
        assert_eq!(a.get(), 9);
        assert_eq!(b.get(), 9);
        assert_eq!(conf.keys(), vec!["Port".to_string()]);
    }

    #[test]
    fn test_type_conflict_returns_degraded_handle() {
        let mem = Arc::new(InMemory::new());
        mem.write("Port", Some(b"8080")).unwrap();
        let (logger, lines) = capture();
        let conf = Distconf::with_logger(vec![mem.clone()], logger);

        let port = conf.int("Port", 1);
        let wrong = conf.string("Port", "fallback");
        assert_eq!(port.get(), 8080);
        assert_eq!(wrong.get(), "fallback");
        assert!(lines.lock().unwrap()[0].starts_with("Port|Registering key with multiple types|"));

        // The degraded handle is detached from the sources.
        mem.write("Port", Some(b"9090")).unwrap();
        assert_eq!(port.get(), 9090);
        assert_eq!(wrong.get(), "fallback");

        let err = conf.register("Port", false, Codec::bool()).unwrap_err();
        assert!(matches!(err, DistconfError::TypeConflict { .. }));
    }

    #[test]
    fn test_structured_types_are_distinct() {
        #[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
        struct A {
            x: i32,
        }
        #[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
        struct B {
            x: i32,
        }

        let conf = Distconf::with_logger(vec![], Logger::discard());
        conf.structured("Shape", A { x: 1 });
        assert!(conf.register("Shape", B { x: 1 }, Codec::json()).is_err());
        assert!(conf.register("Shape", A { x: 2 }, Codec::json()).is_ok());
    }

    #[test]
    fn test_precedence_is_reader_order() {
        let a = Arc::new(InMemory::new());
        let b = Arc::new(InMemory::new());
        a.write("Key", Some(b"from-a")).unwrap();
        b.write("Key", Some(b"from-b")).unwrap();
        b.write("OnlyB", Some(b"b")).unwrap();

        let ab = Distconf::with_logger(vec![a.clone(), b.clone()], Logger::discard());
        let ba = Distconf::with_logger(vec![b.clone(), a.clone()], Logger::discard());
        assert_eq!(ab.string("Key", "").get(), "from-a");
        assert_eq!(ba.string("Key", "").get(), "from-b");
        assert_eq!(ab.string("OnlyB", "").get(), "b");
    }

    #[test]
    fn test_push_rewalks_whole_chain() {
        let high = Arc::new(InMemory::new());
        let low = Arc::new(InMemory::new());
        low.write("Key", Some(b"low")).unwrap();
        let conf = Distconf::with_logger(vec![high.clone(), low.clone()], Logger::discard());
        let var = conf.string("Key", "default");
        assert_eq!(var.get(), "low");

        high.write("Key", Some(b"high")).unwrap();
        assert_eq!(var.get(), "high");

        // A lower source changing does not beat the higher one.
        low.write("Key", Some(b"low2")).unwrap();
        assert_eq!(var.get(), "high");

        high.write("Key", None).unwrap();
        assert_eq!(var.get(), "low2");

        low.write("Key", None).unwrap();
        assert_eq!(var.get(), "default");
    }

    #[test]
    fn test_reader_errors_fall_through_and_are_logged() {
        let mem = Arc::new(InMemory::new());
        mem.write("Key", Some(b"5")).unwrap();
        let (logger, lines) = capture();
        let conf = Distconf::with_logger(vec![Arc::new(Failing), mem], logger);

        assert_eq!(conf.int("Key", 1).get(), 5);
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Key|Unable to read from backing|"));
        assert!(lines[0].contains("backend down"));
    }

    #[test]
    fn test_failed_refreshes_keep_default() {
        let conf = Distconf::with_logger(vec![Arc::new(Failing)], Logger::discard());
        let var = conf.duration("Timeout", Duration::from_secs(5));
        for _ in 0..10 {
            conf.refresh();
        }
        assert_eq!(var.get(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_bytes_log_and_default() {
        let mem = Arc::new(InMemory::new());
        mem.write("Ratio", Some(b"half")).unwrap();
        let (logger, lines) = capture();
        let conf = Distconf::with_logger(vec![mem.clone()], logger);

        let ratio = conf.float("Ratio", 0.5);
        assert_eq!(ratio.get(), 0.5);
        assert!(lines.lock().unwrap()[0].starts_with("Ratio|Invalid config bytes|"));

        mem.write("Ratio", Some(b"0.75")).unwrap();
        assert_eq!(ratio.get(), 0.75);
    }

    #[test]
    fn test_watchers_fire_once_per_change() {
        let json = Arc::new(JsonConfig::new());
        let conf = Distconf::with_logger(vec![json.clone()], Logger::discard());
        let retries = conf.int("MaxRetries", 3);
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        retries.watch(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        json.refresh(r#"{"MaxRetries": "7", "Other": "x"}"#.as_bytes()).unwrap();
        json.refresh(r#"{"MaxRetries": "7"}"#.as_bytes()).unwrap();
        assert_eq!(retries.get(), 7);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_static_chain_refreshed_by_poll() {
        let value = Arc::new(Mutex::new(String::new()));
        let v = value.clone();
        let env = Env::with_lookup("HEBE_", move |name| {
            (name == "HEBE_Port").then(|| v.lock().unwrap().clone())
        });
        let conf = Distconf::with_logger(vec![Arc::new(env)], Logger::discard());
        let port = conf.int("Port", 80);
        assert_eq!(port.get(), 80);

        *value.lock().unwrap() = "8080".to_string();
        assert_eq!(port.get(), 80);
        conf.refresh();
        assert_eq!(port.get(), 8080);
    }

    #[test]
    fn test_env_then_command_line() {
        let env = Env::with_lookup("HEBE_", |_| None);
        let cmd = CommandLine::with_args("HEBE_", ["hebe-bot", "HEBE_Port=8080"]);
        let conf = Distconf::with_logger(vec![Arc::new(env), Arc::new(cmd)], Logger::discard());
        assert_eq!(conf.int("Port", 80).get(), 8080);
    }

    #[test]
    fn test_snapshot_lists_current_values() {
        let mem = Arc::new(InMemory::new());
        mem.write("Interval", Some(b"90s")).unwrap();
        let conf = Distconf::with_logger(vec![mem], Logger::discard());
        conf.duration("Interval", Duration::from_secs(1));
        conf.bool("Debug", true);

        let snap = conf.snapshot();
        assert_eq!(snap["Interval"], "1m30s");
        assert_eq!(snap["Debug"], true);
    }

    #[test]
    fn test_concurrent_first_access_initializes_once() {
        struct CountingReader(AtomicUsize);
        impl Reader for CountingReader {
            fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Ok(Some(b"42".to_vec()))
            }
        }

        let reader = Arc::new(CountingReader(AtomicUsize::new(0)));
        let conf = Distconf::with_logger(vec![reader.clone()], Logger::discard());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let conf = conf.clone();
                std::thread::spawn(move || conf.int("Answer", 0).get())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 42);
        }
        assert_eq!(reader.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_registry_ignores_pushes() {
        let mem = Arc::new(InMemory::new());
        let var = {
            let conf = Distconf::with_logger(vec![mem.clone()], Logger::discard());
            conf.int("Key", 1)
        };
        mem.write("Key", Some(b"2")).unwrap();
        assert_eq!(var.get(), 1);
    }
}
