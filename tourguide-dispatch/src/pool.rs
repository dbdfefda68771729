//! Fixed-size worker pool with a bounded queue and an explicit overflow
//! policy.
//!
//! Jobs are queued on a bounded MPMC channel and every worker holds its own
//! receiver. When the queue is full and no worker is idle,
//! [`OverflowPolicy`] decides what `submit` does: run the job on the
//! submitting thread, reject it, or wait until a deadline.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How long `submit` waits for an idle worker to reach its receive call.
const HANDOFF_WAIT: Duration = Duration::from_millis(50);

/// What `submit` does when the work queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Run the job synchronously on the submitting thread.
    #[default]
    CallerRuns,
    /// Refuse the job with [`SubmitError::QueueFull`].
    Reject,
    /// Wait for queue space until the timeout elapses, then refuse the job.
    BlockWithTimeout(Duration),
}

/// Sizing and overflow behaviour of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Jobs that may wait in the queue before the overflow policy applies.
    ///
    /// Zero means jobs are only handed directly to idle workers.
    pub queue_capacity: usize,
    /// Behaviour when the queue is full.
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl PoolConfig {
    /// Small pool for latency-bound location polling.
    #[must_use]
    pub const fn polling() -> Self {
        Self {
            workers: 12,
            queue_capacity: 200,
            overflow: OverflowPolicy::CallerRuns,
        }
    }

    /// Large pool with a deep queue for reward attribution.
    #[must_use]
    pub const fn rewards() -> Self {
        Self {
            workers: 128,
            queue_capacity: 20_000,
            overflow: OverflowPolicy::CallerRuns,
        }
    }

    /// Replace the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Replace the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Replace the overflow policy.
    #[must_use]
    pub const fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}

/// Errors raised while building a [`WorkerPool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// The configuration asked for zero workers.
    #[error("pool {name} must have at least one worker")]
    NoWorkers {
        /// Pool name.
        name: String,
    },
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker {index} of pool {name}: {source}")]
    Spawn {
        /// Pool name.
        name: String,
        /// Index of the worker that failed to start.
        index: usize,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by [`WorkerPool::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The pool no longer accepts work.
    #[error("pool {name} has been shut down")]
    ShutDown {
        /// Pool name.
        name: String,
    },
    /// The queue stayed full and the overflow policy refused the job.
    #[error("pool {name} queue is full")]
    QueueFull {
        /// Pool name.
        name: String,
    },
}

/// Outcome of [`WorkerPool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Workers that drained the queue and exited within the grace period.
    pub completed: usize,
    /// Workers still running when the grace period elapsed; left detached.
    pub abandoned: usize,
}

impl ShutdownReport {
    /// Whether every worker exited within the grace period.
    #[must_use]
    pub const fn is_graceful(&self) -> bool {
        self.abandoned == 0
    }
}

/// Fixed-size pool of named worker threads.
///
/// `new` returns once every worker is running, so a fresh pool accepts
/// work even with a zero-capacity queue.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use tourguide_dispatch::{PoolConfig, WorkerPool};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = WorkerPool::new("example", PoolConfig::polling().with_workers(2))?;
/// let counter = Arc::new(AtomicUsize::new(0));
/// for _ in 0..10 {
///     let seen = Arc::clone(&counter);
///     pool.submit(move || {
///         seen.fetch_add(1, Ordering::SeqCst);
///     })?;
/// }
/// let report = pool.shutdown(Duration::from_secs(5));
/// assert!(report.is_graceful());
/// assert_eq!(counter.load(Ordering::SeqCst), 10);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    overflow: OverflowPolicy,
    sender: Mutex<Option<Sender<Job>>>,
    idle: Arc<AtomicUsize>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    exited: Receiver<()>,
}

impl WorkerPool {
    /// Start a pool named `name` with the given configuration.
    ///
    /// # Errors
    /// Returns [`PoolError::NoWorkers`] for an empty pool and
    /// [`PoolError::Spawn`] when a worker thread cannot be started.
    pub fn new(name: impl Into<String>, config: PoolConfig) -> Result<Self, PoolError> {
        let pool_name: String = name.into();
        if config.workers == 0 {
            return Err(PoolError::NoWorkers { name: pool_name });
        }

        let (sender, queue) = crossbeam_channel::bounded::<Job>(config.queue_capacity);
        let (exit_tx, exit_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(config.workers);
        let idle = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let worker = Worker {
                queue: queue.clone(),
                idle: Arc::clone(&idle),
                ready: ready_tx.clone(),
                exit: exit_tx.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("{pool_name}-{index}"))
                .spawn(move || worker.run())
                .map_err(|source| PoolError::Spawn {
                    name: pool_name.clone(),
                    index,
                    source,
                })?;
            workers.push(handle);
        }
        drop(ready_tx);
        for _ in 0..config.workers {
            if ready_rx.recv().is_err() {
                break;
            }
        }
        debug!(
            "started pool {pool_name} with {} workers and queue capacity {}",
            config.workers, config.queue_capacity
        );

        Ok(Self {
            name: pool_name,
            overflow: config.overflow,
            sender: Mutex::new(Some(sender)),
            idle,
            workers: Mutex::new(workers),
            exited: exit_rx,
        })
    }

    /// Pool name, used as the worker thread name prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `job` for execution.
    ///
    /// A full queue with an idle worker hands the job to that worker. The
    /// overflow policy applies only when the queue is full and every worker
    /// is busy. Under [`OverflowPolicy::CallerRuns`] the job may have
    /// finished by the time this returns.
    ///
    /// # Errors
    /// Returns [`SubmitError::ShutDown`] after [`WorkerPool::shutdown`] and
    /// [`SubmitError::QueueFull`] when the overflow policy refuses the job.
    pub fn submit<F>(&self, job: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = lock(&self.sender).clone() else {
            return Err(self.shut_down());
        };
        match sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(self.shut_down()),
            Err(TrySendError::Full(pending)) => self.hand_off(&sender, pending),
        }
    }

    /// Stop accepting work, let workers drain the queue and wait up to
    /// `grace` for them to exit.
    ///
    /// Workers still busy after `grace` are detached; threads cannot be
    /// killed, so their jobs keep running in the background.
    #[must_use]
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        drop(lock(&self.sender).take());
        let handles = std::mem::take(&mut *lock(&self.workers));
        let total = handles.len();
        let deadline = Instant::now().checked_add(grace);

        let mut exited = 0;
        while exited < total {
            let remaining =
                deadline.map_or(grace, |at| at.saturating_duration_since(Instant::now()));
            match self.exited.recv_timeout(remaining) {
                Ok(()) => exited += 1,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut report = ShutdownReport::default();
        for handle in handles {
            if exited == total || handle.is_finished() {
                if handle.join().is_err() {
                    warn!("worker of pool {} terminated abnormally", self.name);
                }
                report.completed += 1;
            } else {
                report.abandoned += 1;
            }
        }
        if report.is_graceful() {
            debug!("pool {} shut down with {} workers", self.name, report.completed);
        } else {
            warn!(
                "pool {} abandoned {} workers after a {grace:?} grace period",
                self.name, report.abandoned
            );
        }
        report
    }

    fn hand_off(&self, sender: &Sender<Job>, job: Job) -> Result<(), SubmitError> {
        // An idle worker may still be on its way back to `recv`.
        if self.idle.load(Ordering::SeqCst) == 0 {
            return self.overflow(sender, job);
        }
        match sender.send_timeout(job, HANDOFF_WAIT) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Disconnected(_)) => Err(self.shut_down()),
            Err(SendTimeoutError::Timeout(pending)) => self.overflow(sender, pending),
        }
    }

    fn overflow(&self, sender: &Sender<Job>, job: Job) -> Result<(), SubmitError> {
        match self.overflow {
            OverflowPolicy::CallerRuns => {
                run_job(job);
                Ok(())
            }
            OverflowPolicy::Reject => Err(self.queue_full()),
            OverflowPolicy::BlockWithTimeout(timeout) => match sender.send_timeout(job, timeout) {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Disconnected(_)) => Err(self.shut_down()),
                Err(SendTimeoutError::Timeout(_)) => Err(self.queue_full()),
            },
        }
    }

    fn shut_down(&self) -> SubmitError {
        SubmitError::ShutDown {
            name: self.name.clone(),
        }
    }

    fn queue_full(&self) -> SubmitError {
        SubmitError::QueueFull {
            name: self.name.clone(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets idle workers exit on their own.
        drop(lock(&self.sender).take());
    }
}

/// State moved onto each worker thread.
struct Worker {
    queue: Receiver<Job>,
    idle: Arc<AtomicUsize>,
    ready: Sender<()>,
    exit: Sender<()>,
}

impl Worker {
    fn run(self) {
        self.idle.fetch_add(1, Ordering::SeqCst);
        if self.ready.send(()).is_err() {
            debug!("pool stopped waiting for worker start-up");
        }
        while let Ok(job) = self.queue.recv() {
            self.idle.fetch_sub(1, Ordering::SeqCst);
            run_job(job);
            self.idle.fetch_add(1, Ordering::SeqCst);
        }
        if self.exit.send(()).is_err() {
            debug!("worker exited after shutdown stopped waiting");
        }
    }
}

fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        warn!("worker job panicked; the worker keeps running");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
