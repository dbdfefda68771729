//! Concurrent dispatch for the TourGuide engine.
//!
//! This crate runs [`tourguide_core::RewardEngine`] across many tourists at
//! once. It provides:
//!
//! - [`WorkerPool`]: fixed worker threads over a bounded queue with an
//!   explicit [`OverflowPolicy`].
//! - [`RewardDispatcher`]: one task per tourist, joined before returning,
//!   with fail-fast and per-task result entry points.
//! - [`PeriodicTracker`]: a named background thread ticking on an interval.
//! - [`TourGuide`]: the service facade owning the tourist registry, the
//!   reward configuration and both pools.

#![forbid(unsafe_code)]

mod dispatcher;
mod pool;
mod service;
mod tracker;

pub use dispatcher::{
    BatchReport, DispatchConfig, DispatchError, DispatcherShutdown, RewardDispatcher, TaskError,
    TaskOutcome,
};
pub use pool::{OverflowPolicy, PoolConfig, PoolError, ShutdownReport, SubmitError, WorkerPool};
pub use service::{ServiceError, TourGuide};
pub use tracker::{PeriodicTracker, TickControl};
