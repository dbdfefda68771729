//! The `TourGuide` service: tourist registry, reward configuration and the
//! dispatcher behind one handle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{error, info};
use thiserror::Error;
use tourguide_core::{
    AttractionCatalog, AttributionError, LocationSample, LocationSource, NearbyAttraction,
    PointsResolver, RewardConfig, RewardConfigError, RewardEngine, RewardRecord, Tourist,
};

use crate::dispatcher::{
    BatchReport, DispatchConfig, DispatchError, DispatcherShutdown, RewardDispatcher, TaskError,
};
use crate::pool::PoolError;
use crate::tracker::{PeriodicTracker, TickControl};

const TRACKER_THREAD_NAME: &str = "tourguide-tracker";

/// Errors raised by [`TourGuide`] operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No tourist is registered under the user name.
    #[error("unknown tourist {user_name}")]
    UnknownTourist {
        /// Requested user name.
        user_name: String,
    },
    /// The reward buffer was rejected.
    #[error(transparent)]
    Config(#[from] RewardConfigError),
    /// A single tracking call failed.
    #[error(transparent)]
    Task(#[from] TaskError),
    /// A query failed to resolve reward points.
    #[error(transparent)]
    Attribution(#[from] AttributionError),
    /// A batch finished with at least one failed task.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// The worker pools could not be started.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// The tracking thread could not be started.
    #[error("failed to start the tracker: {0}")]
    Tracker(#[source] std::io::Error),
    /// Tracking is already running.
    #[error("tracking is already running")]
    AlreadyTracking,
}

/// Tourist registry plus the reward engine, location source and worker
/// pools that serve it.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use tourguide_core::test_support::{
///     MemoryCatalog, ScriptedLocationSource, TablePointsResolver, attraction,
/// };
/// use tourguide_core::{RewardEngine, Tourist, TouristId};
/// use tourguide_dispatch::{DispatchConfig, PoolConfig, TourGuide};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = RewardEngine::new(
///     MemoryCatalog::new([attraction(1, "Museum", 0.0, 0.0)]),
///     TablePointsResolver::uniform(25),
/// );
/// let pools = DispatchConfig {
///     polling: PoolConfig::polling().with_workers(1),
///     rewards: PoolConfig::rewards().with_workers(1).with_queue_capacity(4),
/// };
/// let guide = TourGuide::new(
///     engine,
///     ScriptedLocationSource::fixed(Coord { x: 0.0, y: 0.0 }),
///     pools,
/// )?;
/// guide.add_tourist(Tourist::new(TouristId(1), "ada"));
///
/// guide.track_location("ada")?;
/// assert_eq!(guide.total_reward_points("ada")?, 25);
/// assert!(guide.shutdown(std::time::Duration::from_secs(5)).is_graceful());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TourGuide<C, R, L> {
    dispatcher: RewardDispatcher<C, R, L>,
    tourists: RwLock<BTreeMap<String, Arc<Tourist>>>,
    reward_config: RwLock<RewardConfig>,
    tracker: Mutex<Option<PeriodicTracker>>,
}

impl<C, R, L> TourGuide<C, R, L>
where
    C: AttractionCatalog + 'static,
    R: PointsResolver + 'static,
    L: LocationSource + 'static,
{
    /// Build the service and start its worker pools.
    ///
    /// # Errors
    /// Returns [`ServiceError::Pool`] when a pool cannot be started.
    pub fn new(
        engine: RewardEngine<C, R>,
        locations: L,
        pools: DispatchConfig,
    ) -> Result<Self, ServiceError> {
        let dispatcher = RewardDispatcher::new(Arc::new(engine), Arc::new(locations), pools)?;
        Ok(Self {
            dispatcher,
            tourists: RwLock::new(BTreeMap::new()),
            reward_config: RwLock::new(RewardConfig::default()),
            tracker: Mutex::new(None),
        })
    }

    /// Replace the initial reward configuration.
    #[must_use]
    pub fn with_reward_config(self, config: RewardConfig) -> Self {
        *write(&self.reward_config) = config;
        self
    }

    /// The dispatcher serving this service.
    #[must_use]
    pub const fn dispatcher(&self) -> &RewardDispatcher<C, R, L> {
        &self.dispatcher
    }

    /// Register `tourist` unless its user name is taken.
    ///
    /// Returns the registered tourist, which is the existing one when the
    /// name was already present.
    pub fn add_tourist(&self, tourist: Tourist) -> Arc<Tourist> {
        let mut registry = write(&self.tourists);
        Arc::clone(
            registry
                .entry(tourist.user_name().to_owned())
                .or_insert_with(|| Arc::new(tourist)),
        )
    }

    /// Look up a tourist by user name.
    ///
    /// # Errors
    /// Returns [`ServiceError::UnknownTourist`] when nobody is registered
    /// under `user_name`.
    pub fn tourist(&self, user_name: &str) -> Result<Arc<Tourist>, ServiceError> {
        read(&self.tourists)
            .get(user_name)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownTourist {
                user_name: user_name.to_owned(),
            })
    }

    /// Every registered tourist, ordered by user name.
    #[must_use]
    pub fn all_tourists(&self) -> Vec<Arc<Tourist>> {
        read(&self.tourists).values().cloned().collect()
    }

    /// Poll the tourist's position, record it and attribute rewards.
    ///
    /// # Errors
    /// Returns [`ServiceError::UnknownTourist`] or the [`TaskError`] of the
    /// poll or attribution step.
    pub fn track_location(&self, user_name: &str) -> Result<LocationSample, ServiceError> {
        let tourist = self.tourist(user_name)?;
        let config = self.reward_config();
        Ok(self.dispatcher.track(&tourist, &config)?)
    }

    /// The tourist's latest recorded position, tracking a fresh one when the
    /// history is empty.
    ///
    /// # Errors
    /// As for [`TourGuide::track_location`].
    pub fn user_location(&self, user_name: &str) -> Result<LocationSample, ServiceError> {
        self.tourist(user_name)?
            .last_visit()
            .map_or_else(|| self.track_location(user_name), Ok)
    }

    /// Snapshot of the tourist's reward ledger.
    ///
    /// # Errors
    /// Returns [`ServiceError::UnknownTourist`] for an unregistered name.
    pub fn rewards(&self, user_name: &str) -> Result<Vec<RewardRecord>, ServiceError> {
        Ok(self.tourist(user_name)?.rewards())
    }

    /// Sum of the tourist's reward points.
    ///
    /// # Errors
    /// Returns [`ServiceError::UnknownTourist`] for an unregistered name.
    pub fn total_reward_points(&self, user_name: &str) -> Result<u64, ServiceError> {
        Ok(self.tourist(user_name)?.total_reward_points())
    }

    /// The `limit` attractions nearest the tourist's current position.
    ///
    /// A non-positive `limit` selects the default of five.
    ///
    /// # Errors
    /// Returns [`ServiceError::UnknownTourist`], a tracking failure when a
    /// fresh position had to be polled, or a points resolution failure.
    pub fn nearby_attractions(
        &self,
        user_name: &str,
        limit: i64,
    ) -> Result<Vec<NearbyAttraction>, ServiceError> {
        let sample = self.user_location(user_name)?;
        Ok(self
            .dispatcher
            .engine()
            .nearest(sample.tourist_id, sample.location, limit)?)
    }

    /// Current reward configuration.
    #[must_use]
    pub fn reward_config(&self) -> RewardConfig {
        *read(&self.reward_config)
    }

    /// Change the reward buffer used by subsequent batches.
    ///
    /// # Errors
    /// Returns [`ServiceError::Config`] for a negative or non-finite value.
    pub fn set_reward_buffer(&self, miles: f64) -> Result<(), ServiceError> {
        write(&self.reward_config).set_reward_buffer(miles)?;
        info!("reward buffer set to {miles} miles");
        Ok(())
    }

    /// Restore the default reward buffer.
    pub fn reset_reward_buffer(&self) {
        write(&self.reward_config).reset_reward_buffer();
        info!("reward buffer reset to the default");
    }

    /// Poll and attribute every registered tourist.
    ///
    /// # Errors
    /// Returns [`ServiceError::Dispatch`] when any task failed. Every other
    /// tourist was still processed.
    pub fn dispatch_all(&self) -> Result<BatchReport, ServiceError> {
        let config = self.reward_config();
        Ok(self.dispatcher.dispatch_all(&self.all_tourists(), &config)?)
    }

    /// Poll and attribute every registered tourist, reporting each result.
    #[must_use]
    pub fn dispatch_all_isolated(&self) -> BatchReport {
        let config = self.reward_config();
        self.dispatcher
            .dispatch_all_isolated(&self.all_tourists(), &config)
    }

    /// Attribute every registered tourist's existing history.
    ///
    /// # Errors
    /// Returns [`ServiceError::Dispatch`] when any task failed.
    pub fn attribute_all(&self) -> Result<BatchReport, ServiceError> {
        let config = self.reward_config();
        Ok(self.dispatcher.attribute_all(&self.all_tourists(), &config)?)
    }

    /// Start tracking every registered tourist once per `interval`.
    ///
    /// The tracker holds a weak reference and stops once the last strong
    /// reference to the service is dropped.
    ///
    /// # Errors
    /// Returns [`ServiceError::AlreadyTracking`] when a tracker is running,
    /// or [`ServiceError::Tracker`] when its thread cannot be spawned.
    pub fn start_tracking(self: &Arc<Self>, interval: Duration) -> Result<(), ServiceError> {
        let mut slot = lock(&self.tracker);
        if slot.is_some() {
            return Err(ServiceError::AlreadyTracking);
        }
        let service = Arc::downgrade(self);
        let tracker = PeriodicTracker::start(TRACKER_THREAD_NAME, interval, move || {
            let Some(guide) = service.upgrade() else {
                return TickControl::Stop;
            };
            guide.tracking_tick();
            TickControl::Continue
        })
        .map_err(ServiceError::Tracker)?;
        *slot = Some(tracker);
        info!("tracking started with interval {interval:?}");
        Ok(())
    }

    /// Whether a tracker is running.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        lock(&self.tracker).is_some()
    }

    /// Stop the tracker, waiting for a tick in progress to finish.
    pub fn stop_tracking(&self) {
        let tracker = lock(&self.tracker).take();
        if let Some(running) = tracker {
            running.stop();
            info!("tracking stopped");
        }
    }

    /// Stop the tracker, then shut down both pools with `grace` each.
    #[must_use]
    pub fn shutdown(&self, grace: Duration) -> DispatcherShutdown {
        self.stop_tracking();
        self.dispatcher.shutdown(grace)
    }

    fn tracking_tick(&self) {
        match self.dispatch_all() {
            Ok(report) => info!(
                "tracked {} tourists in {:?}",
                report.outcomes.len(),
                report.elapsed
            ),
            Err(err) => error!("tracking tick failed: {err}"),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
