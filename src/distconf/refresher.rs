//! Periodic refresh of sources that cannot push changes.
//!
//! # Responsibilities
//! - Invoke a [`Refreshable`] target on a hot-reloadable interval
//! - Stop cooperatively when closed, and signal when the loop has ended
//! - Fan a single refresh out to several targets concurrently
//!
//! # Design Decisions
//! - The interval is re-read from its [`Variable`] before every sleep, so a
//!   config change alters the cadence without a restart
//! - Close is observed while sleeping only; a refresh already running is
//!   allowed to finish
//! - Refreshes are blocking calls and run on the blocking thread pool

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::distconf::decode::format_duration;
use crate::distconf::variable::Variable;
use crate::lifecycle::Shutdown;

/// Anything that can re-read its configuration.
pub trait Refreshable: Send + Sync {
    fn refresh(&self);
}

impl<T: Refreshable + ?Sized> Refreshable for Arc<T> {
    fn refresh(&self) {
        (**self).refresh()
    }
}

/// Refreshes several targets at once and returns when all have finished.
#[derive(Clone, Default)]
pub struct ComboRefresher {
    targets: Vec<Arc<dyn Refreshable>>,
}

impl ComboRefresher {
    pub fn new(targets: Vec<Arc<dyn Refreshable>>) -> Self {
        Self { targets }
    }
}

impl Refreshable for ComboRefresher {
    fn refresh(&self) {
        std::thread::scope(|scope| {
            for target in &self.targets {
                scope.spawn(move || target.refresh());
            }
        });
    }
}

/// Runs a [`Refreshable`] every `wait_time` until closed.
pub struct Refresher {
    wait_time: Arc<Variable<Duration>>,
    target: Arc<dyn Refreshable>,
    close: Shutdown,
    done: Shutdown,
}

impl Refresher {
    pub fn new(wait_time: Arc<Variable<Duration>>, target: Arc<dyn Refreshable>) -> Self {
        Self {
            wait_time,
            target,
            close: Shutdown::new(),
            done: Shutdown::new(),
        }
    }

    /// Ask the loop to stop before its next refresh.
    pub fn close(&self) {
        self.close.trigger();
    }

    /// Wait until [`start`](Self::start) has returned.
    pub async fn done(&self) {
        self.done.subscribe().wait().await;
    }

    pub fn is_done(&self) -> bool {
        self.done.is_triggered()
    }

    /// Run the refresh loop on the current task.
    pub async fn start(&self) {
        let mut closed = self.close.subscribe();
        tracing::info!(
            interval = %format_duration(self.wait_time.get()),
            "Config refresher started"
        );

        loop {
            let wait = self.wait_time.get();
            tokio::select! {
                biased;
                _ = closed.wait() => break,
                _ = tokio::time::sleep(wait) => {
                    let target = self.target.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || target.refresh()).await {
                        tracing::error!(error = %e, "Config refresh task failed");
                    }
                }
            }
        }

        tracing::info!("Config refresher stopped");
        self.done.trigger();
    }

    /// Run the loop on a new task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.start().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distconf::decode::Codec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Refreshable for Counting {
        fn refresh(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Slow(Duration);

    impl Refreshable for Slow {
        fn refresh(&self) {
            std::thread::sleep(self.0);
        }
    }

    fn interval(d: Duration) -> Arc<Variable<Duration>> {
        Arc::new(Variable::new(d, Codec::duration()))
    }

    #[test]
    fn test_combo_runs_targets_concurrently() {
        let targets: Vec<Arc<dyn Refreshable>> = (0..3)
            .map(|_| Arc::new(Slow(Duration::from_millis(200))) as Arc<dyn Refreshable>)
            .collect();
        let combo = ComboRefresher::new(targets);
        let started = Instant::now();
        combo.refresh();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(550), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_refreshes_until_closed() {
        let counting = Arc::new(Counting::default());
        let refresher = Arc::new(Refresher::new(
            interval(Duration::from_millis(10)),
            counting.clone(),
        ));
        let handle = refresher.clone().spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        refresher.close();
        refresher.done().await;
        handle.await.unwrap();

        assert!(refresher.is_done());
        assert!(counting.0.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_close_interrupts_long_sleep() {
        let counting = Arc::new(Counting::default());
        let refresher = Arc::new(Refresher::new(
            interval(Duration::from_secs(3600)),
            counting.clone(),
        ));
        let handle = refresher.clone().spawn();

        tokio::time::sleep(Duration::from_millis(20)).await;
        refresher.close();
        tokio::time::timeout(Duration::from_secs(1), refresher.done())
            .await
            .expect("refresher did not stop");
        handle.await.unwrap();
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_before_start() {
        let refresher = Refresher::new(
            interval(Duration::from_millis(1)),
            Arc::new(Counting::default()),
        );
        refresher.close();
        tokio::time::timeout(Duration::from_secs(1), refresher.start())
            .await
            .unwrap();
        assert!(refresher.is_done());
    }

    #[tokio::test]
    async fn test_interval_is_hot_reloadable() {
        let counting = Arc::new(Counting::default());
        let wait = interval(Duration::from_secs(3600));
        let refresher = Arc::new(Refresher::new(wait.clone(), counting.clone()));

        // Shorten the cadence before the loop picks up its first interval.
        wait.update(Some(b"5ms")).unwrap();
        let handle = refresher.clone().spawn();
        tokio::time::sleep(Duration::from_millis(100)).await;
        refresher.close();
        handle.await.unwrap();

        assert!(counting.0.load(Ordering::SeqCst) >= 2);
    }
}
