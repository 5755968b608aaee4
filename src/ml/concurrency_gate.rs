//! Admission control for outbound embedding requests.
//!
//! At most `max_concurrent` tasks run at once; later callers wait in strict
//! arrival order. Backed by a tokio `Semaphore`, whose waiters are served FIFO.

use crate::error::{ApiError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

pub struct ConcurrencyGate {
    max_concurrent: usize,
    permits: Arc<Semaphore>,
    active: AtomicUsize,
    waiting: AtomicUsize,
}

/// Decrements a counter when dropped, so the count is restored even if the
/// task fails or the caller is cancelled.
struct CountGuard<'a>(&'a AtomicUsize);

impl<'a> CountGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyGate {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            active: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Run `task` once a slot is free and return its result.
    ///
    /// The slot is released when the task finishes, whether it succeeded or
    /// failed, and the longest-waiting caller is admitted next.
    pub async fn run<F, Fut, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = {
            let _queued = CountGuard::enter(&self.waiting);
            if self.permits.available_permits() == 0 {
                debug!(
                    "Concurrency gate full ({} active), queueing request",
                    self.active()
                );
            }
            self.permits
                .acquire()
                .await
                .map_err(|e| ApiError::InternalError(format!("Concurrency gate closed: {}", e)))?
        };

        let result = {
            let _running = CountGuard::enter(&self.active);
            task().await
        };
        drop(permit);
        result
    }

    /// Number of tasks currently running.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of callers waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    async fn settle_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..1_000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    struct Harness {
        gate: Arc<ConcurrencyGate>,
        started: Arc<Mutex<Vec<usize>>>,
        peak: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(max: usize) -> Self {
            Self {
                gate: Arc::new(ConcurrencyGate::new(max)),
                started: Arc::new(Mutex::new(Vec::new())),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Spawn a task that records its start and then blocks until released.
        /// Returns once the task is either running or queued.
        async fn submit(
            &self,
            id: usize,
            fail: bool,
        ) -> (oneshot::Sender<()>, JoinHandle<Result<usize>>) {
            let (release, wait) = oneshot::channel::<()>();
            let gate = self.gate.clone();
            let started = self.started.clone();
            let peak = self.peak.clone();
            let before = self.gate.active() + self.gate.waiting();

            let handle = tokio::spawn(async move {
                let inner_gate = gate.clone();
                gate.run(|| async move {
                    started.lock().unwrap().push(id);
                    peak.fetch_max(inner_gate.active(), Ordering::SeqCst);
                    let _ = wait.await;
                    if fail {
                        Err(ApiError::InternalError(format!("task {} failed", id)))
                    } else {
                        Ok(id)
                    }
                })
                .await
            });

            let gate = self.gate.clone();
            settle_until(|| gate.active() + gate.waiting() > before).await;
            (release, handle)
        }

        fn started(&self) -> Vec<usize> {
            self.started.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_admits_up_to_limit_then_queues_in_arrival_order() {
        let harness = Harness::new(2);

        let mut tasks = Vec::new();
        for id in 0..4 {
            tasks.push(harness.submit(id, false).await);
        }

        assert_eq!(harness.started(), vec![0, 1]);
        assert_eq!(harness.gate.active(), 2);
        assert_eq!(harness.gate.waiting(), 2);

        let mut tasks = tasks.into_iter();
        let (release0, handle0) = tasks.next().unwrap();
        let (release1, handle1) = tasks.next().unwrap();
        let (release2, handle2) = tasks.next().unwrap();
        let (release3, handle3) = tasks.next().unwrap();

        release1.send(()).unwrap();
        assert_eq!(handle1.await.unwrap().unwrap(), 1);
        settle_until(|| harness.started().len() == 3).await;
        assert_eq!(harness.started(), vec![0, 1, 2]);

        release0.send(()).unwrap();
        assert_eq!(handle0.await.unwrap().unwrap(), 0);
        settle_until(|| harness.started().len() == 4).await;
        assert_eq!(harness.started(), vec![0, 1, 2, 3]);

        release2.send(()).unwrap();
        release3.send(()).unwrap();
        assert_eq!(handle2.await.unwrap().unwrap(), 2);
        assert_eq!(handle3.await.unwrap().unwrap(), 3);

        assert_eq!(harness.peak.load(Ordering::SeqCst), 2);
        assert_eq!(harness.gate.active(), 0);
        assert_eq!(harness.gate.waiting(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_releases_its_slot() {
        let harness = Harness::new(1);

        let (release_failing, failing) = harness.submit(0, true).await;
        let (release_next, next) = harness.submit(1, false).await;
        assert_eq!(harness.started(), vec![0]);

        release_failing.send(()).unwrap();
        assert!(failing.await.unwrap().is_err());

        settle_until(|| harness.started().len() == 2).await;
        release_next.send(()).unwrap();
        assert_eq!(next.await.unwrap().unwrap(), 1);
        assert_eq!(harness.gate.active(), 0);
    }

    #[tokio::test]
    async fn test_zero_limit_is_raised_to_one() {
        let gate = ConcurrencyGate::new(0);

        let value = gate.run(|| async { Ok::<_, ApiError>(7) }).await.unwrap();

        assert_eq!(gate.max_concurrent(), 1);
        assert_eq!(value, 7);
    }
}
