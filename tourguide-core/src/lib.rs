//! Core domain types and algorithms for the TourGuide engine.
//!
//! The crate models tourists moving between fixed attractions and provides
//! the two read/write paths that need real algorithmic care:
//!
//! - [`RewardEngine::attribute`] scans a tourist's location history against
//!   the attraction catalog and credits at most one reward per attraction,
//!   earliest qualifying sample first.
//! - [`nearest_attractions`] selects the closest attractions to a location
//!   with a bounded max-heap.
//!
//! Collaborators that live outside the engine (the attraction catalog, the
//! location source and the points resolver) are expressed as traits so the
//! dispatch layer and tests can plug in their own implementations.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod attraction;
mod attribution;
mod collaborators;
mod config;
mod nearest;
pub mod proximity;
mod tourist;

pub mod test_support;

pub use attraction::{Attraction, AttractionId};
pub use attribution::{AttributionError, AttributionOutcome, RewardEngine};
pub use collaborators::{AttractionCatalog, CollaboratorError, LocationSource, PointsResolver};
pub use config::{DEFAULT_REWARD_BUFFER_MILES, RewardConfig, RewardConfigError};
pub use nearest::{DEFAULT_NEAREST_LIMIT, NearbyAttraction, nearest_attractions};
pub use proximity::{STATUTE_MILES_PER_NAUTICAL_MILE, VISIBILITY_RANGE_MILES};
pub use tourist::{
    LocationSample, RewardRecord, Tourist, TouristId, TouristSnapshot, TripPreferences,
};
