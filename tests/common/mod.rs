//! Shared helpers for integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hebe_bot::distconf::Variable;

/// Write `doc` to `dir/name` and return the path.
pub fn write_json(dir: &Path, name: &str, doc: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, doc).unwrap();
    path
}

/// Count how many times a variable's watchers fire.
pub fn watch_count<T>(var: &Variable<T>) -> Arc<AtomicUsize>
where
    T: PartialEq + Send + Sync + 'static,
{
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    var.watch(move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    fired
}

/// Poll `check` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
