//! Layered cleanup
//!
//! Three tiers of teardown handlers:
//!
//! - **runtime**: scheduled timers and short-lived work; cleared on pause
//! - **discussion**: listeners and the agent set of the active discussion
//! - **service**: listeners that live as long as the manager
//!
//! Tearing down a tier also tears down every tier below it. Every drain
//! empties its registry, so repeated teardown is harmless.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tracing::debug;

type CleanupFn = Box<dyn FnOnce() + Send>;

/// Handlers to run when a tier is torn down
pub struct CleanupRegistry {
    name: &'static str,
    handlers: Mutex<Vec<CleanupFn>>,
}

impl CleanupRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CleanupFn>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, handler: impl FnOnce() + Send + 'static) {
        self.lock().push(Box::new(handler));
    }

    /// Abort `task` on teardown
    pub fn add_task(&self, task: JoinHandle<()>) {
        self.add(move || task.abort());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run and forget every handler. Returns how many ran.
    pub fn drain(&self) -> usize {
        // handlers may register new ones; run them outside the lock
        let handlers = std::mem::take(&mut *self.lock());
        let count = handlers.len();
        for handler in handlers {
            handler();
        }
        debug!(tier = self.name, count, "Cleanup handlers ran");
        count
    }
}

/// Delayed work that can be cancelled wholesale
#[derive(Default)]
pub struct TimerSet {
    tasks: Mutex<JoinSet<()>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` after `delay` unless cleared first.
    pub fn schedule<F>(&self, delay: Duration, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        // forget finished timers
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
    }

    pub fn pending(&self) -> usize {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    pub fn clear_all(&self) {
        self.lock().abort_all();
    }
}

/// The three cleanup tiers of a discussion manager
pub struct CleanupTiers {
    pub timers: TimerSet,
    pub runtime: CleanupRegistry,
    pub discussion: CleanupRegistry,
    pub service: CleanupRegistry,
}

impl Default for CleanupTiers {
    fn default() -> Self {
        Self {
            timers: TimerSet::new(),
            runtime: CleanupRegistry::new("runtime"),
            discussion: CleanupRegistry::new("discussion"),
            service: CleanupRegistry::new("service"),
        }
    }
}

impl CleanupTiers {
    pub fn cleanup_runtime(&self) {
        self.timers.clear_all();
        self.runtime.drain();
    }

    pub fn cleanup_discussion(&self) {
        self.discussion.drain();
        self.cleanup_runtime();
    }

    pub fn cleanup_service(&self) {
        self.service.drain();
        self.cleanup_discussion();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(registry: &CleanupRegistry, hits: &Arc<AtomicUsize>) {
        let hits = Arc::clone(hits);
        registry.add(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }

    #[test]
    fn test_drain_runs_once() {
        let registry = CleanupRegistry::new("test");
        let hits = Arc::new(AtomicUsize::new(0));
        counter(&registry, &hits);
        counter(&registry, &hits);

        assert_eq!(registry.drain(), 2);
        assert_eq!(registry.drain(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tiers_cascade_downward() {
        let tiers = CleanupTiers::default();
        let runtime = Arc::new(AtomicUsize::new(0));
        let discussion = Arc::new(AtomicUsize::new(0));
        let service = Arc::new(AtomicUsize::new(0));

        counter(&tiers.runtime, &runtime);
        counter(&tiers.discussion, &discussion);
        counter(&tiers.service, &service);

        tiers.cleanup_discussion();
        assert_eq!(runtime.load(Ordering::SeqCst), 1);
        assert_eq!(discussion.load(Ordering::SeqCst), 1);
        assert_eq!(service.load(Ordering::SeqCst), 0);

        tiers.cleanup_service();
        assert_eq!(service.load(Ordering::SeqCst), 1);
        // drained tiers stay empty
        assert_eq!(runtime.load(Ordering::SeqCst), 1);
        assert!(tiers.runtime.is_empty() && tiers.discussion.is_empty() && tiers.service.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_timers_never_fire() {
        let tiers = CleanupTiers::default();
        let fired = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&fired);
        tiers.timers.schedule(Duration::from_millis(100), async move {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(tiers.timers.pending(), 1);
        tiers.cleanup_runtime();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let timers = TimerSet::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&fired);
        timers.schedule(Duration::from_millis(100), async move {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test]
    async fn test_add_task_aborts_on_drain() {
        let registry = CleanupRegistry::new("test");
        let task = tokio::spawn(std::future::pending::<()>());
        let abort = task.abort_handle();
        registry.add_task(task);

        registry.drain();
        tokio::task::yield_now().await;
        assert!(abort.is_finished());
    }
}
