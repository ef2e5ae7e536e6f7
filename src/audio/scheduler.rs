//! Auto-stop scheduling
//!
//! A single cancellable deferred task. Every `arm` and `cancel` bumps a
//! generation counter; the deferred action receives the generation it was
//! armed with so the caller can check, under its own lock, that it was not
//! superseded in the meantime.

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub struct AutoStopScheduler {
    runtime: Handle,
    generation: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl AutoStopScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            generation: AtomicU64::new(0),
            pending: Mutex::new(None),
        }
    }

    /// Replace any armed action with a new one firing after `duration`.
    ///
    /// `None` or a zero duration only cancels. Returns the generation of the
    /// new timer when one was armed.
    pub fn arm<F>(&self, duration: Option<Duration>, action: F) -> Option<u64>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let duration = duration.filter(|d| !d.is_zero())?;
        debug!("Auto-stop armed for {:?}", duration);
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            action(generation);
        }));
        Some(generation)
    }

    /// Drop the pending action, if any. Idempotent.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = pending.take() {
            previous.abort();
            debug!("Auto-stop cancelled");
        }
    }

    /// Whether `generation` is still the most recently armed timer
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Whether a timer is armed and has not fired yet
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AutoStopScheduler {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(task) = pending.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::time::{sleep, Instant};

    fn counting(
        scheduler: &AutoStopScheduler,
        secs: u64,
        fired: &Arc<Mutex<Vec<Duration>>>,
        start: Instant,
    ) -> Option<u64> {
        let fired = fired.clone();
        scheduler.arm(Some(Duration::from_secs(secs)), move |_| {
            fired.lock().unwrap().push(start.elapsed());
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_keeps_only_latest() {
        let scheduler = AutoStopScheduler::new(Handle::current());
        let fired = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        counting(&scheduler, 5, &fired, start);
        counting(&scheduler, 2, &fired, start);

        sleep(Duration::from_secs(10)).await;

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert!(fired[0] >= Duration::from_secs(2) && fired[0] < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let scheduler = AutoStopScheduler::new(Handle::current());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler.arm(Some(Duration::from_secs(1)), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.is_armed());

        scheduler.cancel();
        scheduler.cancel();
        sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_durations_only_cancel() {
        let scheduler = AutoStopScheduler::new(Handle::current());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler.arm(Some(Duration::from_secs(1)), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(scheduler.arm(None, |_| {}), None);
        assert_eq!(scheduler.arm(Some(Duration::ZERO), |_| {}), None);
        sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_goes_stale() {
        let scheduler = AutoStopScheduler::new(Handle::current());
        let first = scheduler.arm(Some(Duration::from_secs(1)), |_| {}).unwrap();
        assert!(scheduler.is_current(first));

        let second = scheduler.arm(Some(Duration::from_secs(1)), |_| {}).unwrap();
        assert!(!scheduler.is_current(first));
        assert!(scheduler.is_current(second));

        scheduler.cancel();
        assert!(!scheduler.is_current(second));
    }
}
