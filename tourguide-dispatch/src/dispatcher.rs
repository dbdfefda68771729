//! Fan-out of per-tourist tracking and attribution onto worker pools.
//!
//! Every batch snapshots the reward configuration once, submits one task
//! per tourist and joins on every submitted task before returning. The
//! fail-fast entry points then surface the first failure; the isolated
//! entry point hands back each task's outcome.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;
use tourguide_core::{
    AttractionCatalog, AttributionError, AttributionOutcome, CollaboratorError, LocationSample,
    LocationSource, PointsResolver, RewardConfig, RewardEngine, Tourist, TouristId,
};

use crate::pool::{PoolConfig, PoolError, ShutdownReport, SubmitError, WorkerPool};

/// Pool sizing for a [`RewardDispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Pool used by [`RewardDispatcher::track_all`].
    pub polling: PoolConfig,
    /// Pool used by the attribution batches.
    pub rewards: PoolConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            polling: PoolConfig::polling(),
            rewards: PoolConfig::rewards(),
        }
    }
}

/// Why a single tourist's task failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The location source could not produce a sample.
    #[error("location poll failed for {tourist}: {source}")]
    Location {
        /// Tourist being polled.
        tourist: TouristId,
        /// Collaborator failure.
        #[source]
        source: CollaboratorError,
    },
    /// Attribution failed after any location poll succeeded.
    #[error(transparent)]
    Attribution(#[from] AttributionError),
    /// The task panicked; the message is the panic payload when printable.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload.
        message: String,
    },
    /// The pool refused the task.
    #[error("task was not accepted: {0}")]
    Rejected(#[source] SubmitError),
}

/// Terminal state of one tourist's task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    /// Tourist the task ran for.
    pub tourist: TouristId,
    /// Attribution result or the reason the task failed.
    pub result: Result<AttributionOutcome, TaskError>,
}

/// Every task outcome of one batch, in completion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// One entry per tourist in the batch.
    pub outcomes: Vec<TaskOutcome>,
    /// Wall-clock time from first submission to the last task finishing.
    pub elapsed: Duration,
}

impl BatchReport {
    /// Number of tasks that finished without error.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Failed tasks with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (TouristId, &TaskError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (o.tourist, err)))
    }

    /// Total rewards credited across the batch.
    #[must_use]
    pub fn credited(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|outcome| outcome.credited.len())
            .sum()
    }

    /// Whether every task succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Turn the report into an error when any task failed.
    ///
    /// # Errors
    /// Returns [`DispatchError::TaskFailed`] carrying the first failure in
    /// completion order.
    pub fn into_result(self) -> Result<Self, DispatchError> {
        let total = self.outcomes.len();
        let failed = total - self.succeeded();
        let first = self
            .outcomes
            .iter()
            .find_map(|o| o.result.as_ref().err().map(|err| (o.tourist, err.clone())));
        first.map_or(Ok(self), |(tourist, source)| {
            Err(DispatchError::TaskFailed {
                tourist,
                source,
                failed,
                total,
            })
        })
    }
}

/// Errors surfaced by the fail-fast batch operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// At least one task failed. Every other task still ran to completion.
    #[error("{failed} of {total} tasks failed; first failure for {tourist}: {source}")]
    TaskFailed {
        /// Tourist of the first failed task.
        tourist: TouristId,
        /// First failure.
        #[source]
        source: TaskError,
        /// Number of failed tasks.
        failed: usize,
        /// Number of tasks in the batch.
        total: usize,
    },
}

/// Shutdown results for both pools of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatcherShutdown {
    /// Polling pool result.
    pub polling: ShutdownReport,
    /// Reward pool result.
    pub rewards: ShutdownReport,
}

impl DispatcherShutdown {
    /// Whether both pools exited within their grace period.
    #[must_use]
    pub const fn is_graceful(&self) -> bool {
        self.polling.is_graceful() && self.rewards.is_graceful()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    TrackAndAttribute,
    AttributeOnly,
}

/// Runs tracking and attribution for many tourists concurrently.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use geo::Coord;
/// use tourguide_core::test_support::{
///     MemoryCatalog, ScriptedLocationSource, TablePointsResolver, attraction,
/// };
/// use tourguide_core::{RewardConfig, RewardEngine, Tourist, TouristId};
/// use tourguide_dispatch::{DispatchConfig, PoolConfig, RewardDispatcher};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = RewardEngine::new(
///     MemoryCatalog::new([attraction(1, "Museum", 0.0, 0.0)]),
///     TablePointsResolver::uniform(10),
/// );
/// let source = ScriptedLocationSource::fixed(Coord { x: 0.0, y: 0.0 });
/// let config = DispatchConfig {
///     polling: PoolConfig::polling().with_workers(2),
///     rewards: PoolConfig::rewards().with_workers(2).with_queue_capacity(16),
/// };
/// let dispatcher = RewardDispatcher::new(Arc::new(engine), Arc::new(source), config)?;
///
/// let tourists: Vec<_> = (1..=4)
///     .map(|id| Arc::new(Tourist::new(TouristId(id), format!("user{id}"))))
///     .collect();
/// let report = dispatcher.dispatch_all(&tourists, &RewardConfig::default())?;
/// assert_eq!(report.credited(), 4);
/// assert!(dispatcher.shutdown(std::time::Duration::from_secs(5)).is_graceful());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RewardDispatcher<C, R, L> {
    engine: Arc<RewardEngine<C, R>>,
    locations: Arc<L>,
    polling: WorkerPool,
    rewards: WorkerPool,
}

impl<C, R, L> RewardDispatcher<C, R, L>
where
    C: AttractionCatalog + 'static,
    R: PointsResolver + 'static,
    L: LocationSource + 'static,
{
    /// Start both worker pools.
    ///
    /// # Errors
    /// Returns [`PoolError`] when either pool cannot be started.
    pub fn new(
        engine: Arc<RewardEngine<C, R>>,
        locations: Arc<L>,
        config: DispatchConfig,
    ) -> Result<Self, PoolError> {
        Ok(Self {
            engine,
            locations,
            polling: WorkerPool::new("tourguide-poll", config.polling)?,
            rewards: WorkerPool::new("tourguide-reward", config.rewards)?,
        })
    }

    /// The shared reward engine.
    #[must_use]
    pub fn engine(&self) -> &RewardEngine<C, R> {
        &self.engine
    }

    /// The shared location source.
    #[must_use]
    pub fn locations(&self) -> &L {
        &self.locations
    }

    /// Poll, record and attribute one tourist on the calling thread.
    ///
    /// # Errors
    /// Returns [`TaskError::Location`] when polling fails, leaving the
    /// history untouched, or [`TaskError::Attribution`] when the resolver
    /// fails after the sample was recorded.
    pub fn track(
        &self,
        tourist: &Tourist,
        config: &RewardConfig,
    ) -> Result<LocationSample, TaskError> {
        let sample = poll(&*self.locations, tourist)?;
        self.engine.attribute(tourist, config)?;
        Ok(sample)
    }

    /// Poll and attribute every tourist on the reward pool.
    ///
    /// Waits for every submitted task before returning, even when one fails.
    ///
    /// # Errors
    /// Returns [`DispatchError::TaskFailed`] when any task failed.
    pub fn dispatch_all(
        &self,
        tourists: &[Arc<Tourist>],
        config: &RewardConfig,
    ) -> Result<BatchReport, DispatchError> {
        self.run_batch(&self.rewards, tourists, *config, Step::TrackAndAttribute)
            .into_result()
    }

    /// Like [`RewardDispatcher::dispatch_all`] but reports each task's result
    /// instead of failing the batch.
    #[must_use]
    pub fn dispatch_all_isolated(
        &self,
        tourists: &[Arc<Tourist>],
        config: &RewardConfig,
    ) -> BatchReport {
        self.run_batch(&self.rewards, tourists, *config, Step::TrackAndAttribute)
    }

    /// Attribute every tourist's existing history on the reward pool.
    ///
    /// # Errors
    /// Returns [`DispatchError::TaskFailed`] when any task failed.
    pub fn attribute_all(
        &self,
        tourists: &[Arc<Tourist>],
        config: &RewardConfig,
    ) -> Result<BatchReport, DispatchError> {
        self.run_batch(&self.rewards, tourists, *config, Step::AttributeOnly)
            .into_result()
    }

    /// Poll and attribute every tourist on the polling pool.
    ///
    /// # Errors
    /// Returns [`DispatchError::TaskFailed`] when any task failed.
    pub fn track_all(
        &self,
        tourists: &[Arc<Tourist>],
        config: &RewardConfig,
    ) -> Result<BatchReport, DispatchError> {
        self.run_batch(&self.polling, tourists, *config, Step::TrackAndAttribute)
            .into_result()
    }

    /// Shut down the polling pool, then the reward pool, each with `grace`.
    #[must_use]
    pub fn shutdown(&self, grace: Duration) -> DispatcherShutdown {
        DispatcherShutdown {
            polling: self.polling.shutdown(grace),
            rewards: self.rewards.shutdown(grace),
        }
    }

    fn run_batch(
        &self,
        pool: &WorkerPool,
        tourists: &[Arc<Tourist>],
        config: RewardConfig,
        step: Step,
    ) -> BatchReport {
        let started = Instant::now();
        let (tx, rx) = crossbeam_channel::unbounded::<TaskOutcome>();
        let mut outcomes = Vec::with_capacity(tourists.len());

        for tourist in tourists {
            let id = tourist.id();
            let task_tx = tx.clone();
            let subject = Arc::clone(tourist);
            let engine = Arc::clone(&self.engine);
            let locations = Arc::clone(&self.locations);
            let job = move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_step(step, &engine, &*locations, &subject, &config)
                }))
                .unwrap_or_else(|payload| {
                    Err(TaskError::Panicked {
                        message: panic_message(payload.as_ref()),
                    })
                });
                if task_tx.send(TaskOutcome { tourist: id, result }).is_err() {
                    debug!("batch stopped listening before {id} finished");
                }
            };
            if let Err(err) = pool.submit(job) {
                outcomes.push(TaskOutcome {
                    tourist: id,
                    result: Err(TaskError::Rejected(err)),
                });
            }
        }
        drop(tx);
        outcomes.extend(rx.iter());

        let report = BatchReport {
            outcomes,
            elapsed: started.elapsed(),
        };
        for (tourist, err) in report.failures() {
            warn!("task for {tourist} on pool {} failed: {err}", pool.name());
        }
        info!(
            "pool {} finished {} tasks ({} failed, {} rewards credited) in {:?}",
            pool.name(),
            report.outcomes.len(),
            report.outcomes.len() - report.succeeded(),
            report.credited(),
            report.elapsed
        );
        report
    }
}

fn poll<L>(locations: &L, tourist: &Tourist) -> Result<LocationSample, TaskError>
where
    L: LocationSource + ?Sized,
{
    let sample = locations
        .current_location(tourist.id())
        .map_err(|source| TaskError::Location {
            tourist: tourist.id(),
            source,
        })?;
    debug!("recorded location for {}", tourist.id());
    tourist.record_visit(sample.clone());
    Ok(sample)
}

fn run_step<C, R, L>(
    step: Step,
    engine: &RewardEngine<C, R>,
    locations: &L,
    tourist: &Tourist,
    config: &RewardConfig,
) -> Result<AttributionOutcome, TaskError>
where
    C: AttractionCatalog,
    R: PointsResolver,
    L: LocationSource + ?Sized,
{
    if step == Step::TrackAndAttribute {
        poll(locations, tourist)?;
    }
    Ok(engine.attribute(tourist, config)?)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
