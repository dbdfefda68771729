//! Facade crate for the TourGuide reward engine.
//!
//! This crate re-exports the core domain types and exposes the concurrent
//! dispatcher and tracking service behind the `dispatch` feature.

#![forbid(unsafe_code)]

pub use tourguide_core::{
    Attraction, AttractionCatalog, AttractionId, AttributionError, AttributionOutcome,
    CollaboratorError, DEFAULT_NEAREST_LIMIT, DEFAULT_REWARD_BUFFER_MILES, LocationSample,
    LocationSource, NearbyAttraction, PointsResolver, RewardConfig, RewardConfigError,
    RewardEngine, RewardRecord, Tourist, TouristId, TouristSnapshot, TripPreferences,
    nearest_attractions,
};

#[cfg(feature = "dispatch")]
pub use tourguide_dispatch::{
    BatchReport, DispatchConfig, DispatchError, OverflowPolicy, PoolConfig, RewardDispatcher,
    ServiceError, TaskError, TourGuide,
};
