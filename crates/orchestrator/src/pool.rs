//! A bounded pool of async workers with caller-runs back-pressure.

use crate::error::PoolError;
use configuration::WorkerPoolSettings;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::task::TaskTracker;

type Task = BoxFuture<'static, ()>;

/// Runs submitted jobs on a bounded set of tokio tasks.
///
/// Sizing follows the classic thread-pool rules:
///
/// 1. Fewer than `core_workers` live workers: a new worker starts with the job.
/// 2. Otherwise the job is queued, up to `queue_capacity`.
/// 3. Queue full and fewer than `max_workers`: a burst worker starts with the job.
/// 4. Otherwise the job runs on the submitting task itself.
///
/// Workers idle for longer than `keep_alive` exit. The pool is constructed once
/// at startup and shared by reference.
pub struct WorkerPool {
    settings: WorkerPoolSettings,
    shared: Arc<Shared>,
    tracker: TaskTracker,
}

struct Shared {
    state: Mutex<PoolState>,
    queue: tokio::sync::Mutex<mpsc::Receiver<Task>>,
}

struct PoolState {
    workers: usize,
    // `None` once shutdown has started.
    sender: Option<mpsc::Sender<Task>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        // The lock is never held across a job, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkerPool {
    pub fn new(settings: WorkerPoolSettings) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        Self {
            settings,
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    workers: 0,
                    sender: Some(sender),
                }),
                queue: tokio::sync::Mutex::new(receiver),
            }),
            tracker: TaskTracker::new(),
        }
    }

    pub fn settings(&self) -> &WorkerPoolSettings {
        &self.settings
    }

    /// Number of live workers, idle ones included.
    pub fn worker_count(&self) -> usize {
        self.shared.state().workers
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared
            .state()
            .sender
            .as_ref()
            .map_or(0, |sender| sender.max_capacity() - sender.capacity())
    }

    /// Hands a job to the pool.
    ///
    /// Returns as soon as the job is owned by a worker or the queue. When the pool
    /// is saturated the job runs to completion before this returns.
    pub async fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let job: Task = Box::pin(job);
        let overflow = {
            let mut state = self.shared.state();
            let Some(sender) = state.sender.clone() else {
                return Err(PoolError::Closed);
            };

            if state.workers < self.settings.core_workers {
                state.workers += 1;
                self.spawn_worker(Some(job));
                return Ok(());
            }

            match sender.try_send(job) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Closed(_)) => return Err(PoolError::Closed),
                Err(TrySendError::Full(job)) if state.workers < self.settings.max_workers => {
                    state.workers += 1;
                    tracing::debug!(workers = state.workers, "Queue full, starting a burst worker.");
                    self.spawn_worker(Some(job));
                    return Ok(());
                }
                Err(TrySendError::Full(job)) => job,
            }
        };

        tracing::warn!(
            max_workers = self.settings.max_workers,
            queue_capacity = self.settings.queue_capacity,
            "Worker pool saturated; running the job on the submitting task."
        );
        run_guarded(overflow).await;
        Ok(())
    }

    /// Stops accepting jobs and waits up to `grace` for queued and running jobs
    /// to finish. Returns `true` if everything drained in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.shared.state().sender = None;
        self.tracker.close();

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("Worker pool drained.");
                true
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs_f64(),
                    workers = self.worker_count(),
                    "Worker pool did not drain within the grace period."
                );
                false
            }
        }
    }

    fn spawn_worker(&self, first: Option<Task>) {
        let shared = Arc::clone(&self.shared);
        let keep_alive = self.settings.keep_alive;
        self.tracker.spawn(worker_loop(shared, keep_alive, first));
    }
}

async fn worker_loop(shared: Arc<Shared>, keep_alive: Duration, first: Option<Task>) {
    if let Some(job) = first {
        run_guarded(job).await;
    }

    loop {
        let next = tokio::time::timeout(keep_alive, async { shared.queue.lock().await.recv().await }).await;
        match next {
            Ok(Some(job)) => run_guarded(job).await,
            // Shutdown and the queue is drained.
            Ok(None) => break,
            Err(_) => {
                // Idle. Retire unless a job slipped into the queue in the meantime.
                let raced = {
                    let mut state = shared.state();
                    let raced = shared.queue.try_lock().ok().and_then(|mut queue| queue.try_recv().ok());
                    if raced.is_none() {
                        state.workers -= 1;
                    }
                    raced
                };
                match raced {
                    Some(job) => run_guarded(job).await,
                    None => return,
                }
            }
        }
    }

    shared.state().workers -= 1;
}

/// Runs a job, containing any panic so the worker survives it.
async fn run_guarded(job: Task) {
    if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
        tracing::error!(panic = panic_message(&*panic), "A pooled job panicked.");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
