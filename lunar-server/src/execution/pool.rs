//! Worker pool
//!
//! Bounded pool of blocking workers built on the tokio runtime. A semaphore
//! admits at most `size` tasks at a time; each admitted task runs on a
//! blocking thread so a busy script never stalls the async executor.

use lunar_lua::CancelToken;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// State shared between a task and its handle
#[derive(Debug)]
struct TaskShared {
    state: AtomicU8,
    token: CancelToken,
}

impl TaskShared {
    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Cancellable reference to a submitted task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    /// Requests cancellation of the task
    ///
    /// Succeeds at most once, and only while the task is queued or running.
    /// A queued task is never started. A running task has its cancel token
    /// fired when `may_interrupt` is set.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        if self.shared.transition(QUEUED, CANCELLED) {
            return true;
        }

        if self.shared.transition(RUNNING, CANCELLED) {
            if may_interrupt {
                self.shared.token.cancel();
            }
            return true;
        }

        false
    }

    /// Returns true once the task has finished or was cancelled
    pub fn is_done(&self) -> bool {
        matches!(self.shared.state.load(Ordering::Acquire), DONE | CANCELLED)
    }
}

/// Bounded pool executing submitted tasks on blocking threads
#[derive(Debug, Clone)]
pub struct WorkerPool {
    runtime: Handle,
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a pool admitting at most `size` concurrent tasks
    pub fn new(runtime: Handle, size: usize) -> Self {
        let size = size.max(1);
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Schedules a task and returns its handle immediately
    ///
    /// The task receives the token that [`TaskHandle::cancel`] fires.
    pub fn submit<F>(&self, task: F) -> TaskHandle
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let shared = Arc::new(TaskShared {
            state: AtomicU8::new(QUEUED),
            token: CancelToken::new(),
        });
        let handle = TaskHandle {
            shared: Arc::clone(&shared),
        };
        let permits = Arc::clone(&self.permits);

        self.runtime.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!("Worker pool closed, dropping task");
                return;
            };

            if !shared.transition(QUEUED, RUNNING) {
                debug!("Task cancelled before it started");
                return;
            }

            let token = shared.token.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || task(token)).await {
                warn!("Worker task panicked: {}", e);
            }

            shared.transition(RUNNING, DONE);
            // Permit is released when dropped
        });

        handle
    }
}

/// Number of workers matching the hardware concurrency
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn spin_until_cancelled(token: CancelToken) {
        while !token.is_cancelled() {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_task_runs_to_completion() {
        let pool = WorkerPool::new(Handle::current(), 2);
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        let handle = pool.submit(move |_| flag.store(true, Ordering::SeqCst));

        wait_until(|| handle.is_done()).await;
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(handle.shared.state.load(Ordering::Acquire), DONE);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_queued_task_never_runs() {
        let pool = WorkerPool::new(Handle::current(), 1);
        let blocker = pool.submit(spin_until_cancelled);
        wait_until(|| blocker.shared.state.load(Ordering::Acquire) == RUNNING).await;

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let queued = pool.submit(move |_| flag.store(true, Ordering::SeqCst));

        assert!(!queued.is_done());
        assert!(queued.cancel(false));
        assert!(queued.is_done());
        assert!(!queued.cancel(true));

        assert!(blocker.cancel(true));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_running_task_fires_token() {
        let pool = WorkerPool::new(Handle::current(), 1);
        let finished = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&finished);
        let handle = pool.submit(move |token| {
            spin_until_cancelled(token);
            flag.store(true, Ordering::SeqCst);
        });

        wait_until(|| handle.shared.state.load(Ordering::Acquire) == RUNNING).await;
        assert!(handle.cancel(true));
        assert!(!handle.cancel(true));

        wait_until(|| finished.load(Ordering::SeqCst)).await;
        assert_eq!(handle.shared.state.load(Ordering::Acquire), CANCELLED);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_finished_task_fails() {
        let pool = WorkerPool::new(Handle::current(), 1);
        let handle = pool.submit(|_| {});

        wait_until(|| handle.is_done()).await;
        assert!(!handle.cancel(true));
        assert_eq!(handle.shared.state.load(Ordering::Acquire), DONE);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pool_bounds_concurrency() {
        let pool = WorkerPool::new(Handle::current(), 2);
        let active = Arc::new(AtomicU8::new(0));
        let peak = Arc::new(AtomicU8::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                pool.submit(move |_| {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        wait_until(|| handles.iter().all(TaskHandle::is_done)).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let pool = WorkerPool::new(runtime.handle().clone(), 0);
        assert_eq!(pool.size(), 1);
    }
}
