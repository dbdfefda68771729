//! Tracked tourists, their location history and their reward ledger.
//!
//! A [`Tourist`] is shared between the tracking workers and read-only
//! queries, so its history and ledger sit behind interior locks. Both are
//! append-only: samples and rewards are never reordered or removed.

use std::collections::HashSet;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::{Attraction, AttractionId};

/// Stable identity of a [`Tourist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TouristId(pub u64);

impl fmt::Display for TouristId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tourist#{}", self.0)
    }
}

/// A single polled position of a tourist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Tourist the sample belongs to.
    pub tourist_id: TouristId,
    /// Position in WGS84 (`x = longitude`, `y = latitude`).
    pub location: Coord<f64>,
    /// When the position was observed.
    pub visited_at: DateTime<Utc>,
}

impl LocationSample {
    /// Construct a sample observed at `visited_at`.
    #[must_use]
    pub const fn new(tourist_id: TouristId, location: Coord<f64>, visited_at: DateTime<Utc>) -> Self {
        Self {
            tourist_id,
            location,
            visited_at,
        }
    }

    /// Construct a sample observed now.
    #[must_use]
    pub fn now(tourist_id: TouristId, location: Coord<f64>) -> Self {
        Self::new(tourist_id, location, Utc::now())
    }
}

/// A reward credited to a tourist for visiting an attraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    /// The sample that triggered the reward.
    pub sample: LocationSample,
    /// The rewarded attraction.
    pub attraction: Attraction,
    /// Points granted by the points resolver.
    pub points: u32,
}

impl RewardRecord {
    /// Construct a reward record.
    #[must_use]
    pub const fn new(sample: LocationSample, attraction: Attraction, points: u32) -> Self {
        Self {
            sample,
            attraction,
            points,
        }
    }
}

/// Trip preferences forwarded to pricing collaborators.
///
/// The engine stores them but never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripPreferences {
    /// Adults travelling.
    pub number_of_adults: u32,
    /// Children travelling.
    pub number_of_children: u32,
    /// Trip length in days.
    pub trip_duration_days: u32,
}

impl Default for TripPreferences {
    fn default() -> Self {
        Self {
            number_of_adults: 1,
            number_of_children: 0,
            trip_duration_days: 1,
        }
    }
}

/// A tracked tourist.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use tourguide_core::{LocationSample, Tourist, TouristId};
///
/// let tourist = Tourist::new(TouristId(1), "internalUser1");
/// tourist.record_visit(LocationSample::now(TouristId(1), Coord { x: 0.0, y: 0.0 }));
///
/// assert_eq!(tourist.history().len(), 1);
/// assert!(tourist.rewards().is_empty());
/// ```
#[derive(Debug)]
pub struct Tourist {
    id: TouristId,
    user_name: String,
    phone_number: String,
    email: String,
    preferences: TripPreferences,
    history: RwLock<Vec<LocationSample>>,
    rewards: RwLock<Vec<RewardRecord>>,
}

impl Tourist {
    /// Construct a tourist with an empty history and ledger.
    pub fn new(id: TouristId, user_name: impl Into<String>) -> Self {
        Self {
            id,
            user_name: user_name.into(),
            phone_number: String::new(),
            email: String::new(),
            preferences: TripPreferences::default(),
            history: RwLock::new(Vec::new()),
            rewards: RwLock::new(Vec::new()),
        }
    }

    /// Attach contact details.
    #[must_use]
    pub fn with_contact(mut self, phone_number: impl Into<String>, email: impl Into<String>) -> Self {
        self.phone_number = phone_number.into();
        self.email = email.into();
        self
    }

    /// Attach trip preferences.
    #[must_use]
    pub fn with_preferences(mut self, preferences: TripPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Seed the history with previously observed samples, oldest first.
    #[must_use]
    pub fn with_history<I>(self, samples: I) -> Self
    where
        I: IntoIterator<Item = LocationSample>,
    {
        self.write_history().extend(samples);
        self
    }

    /// Identity of the tourist.
    #[must_use]
    pub const fn id(&self) -> TouristId {
        self.id
    }

    /// Unique user name.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Contact phone number.
    #[must_use]
    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    /// Contact email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Trip preferences.
    #[must_use]
    pub const fn preferences(&self) -> TripPreferences {
        self.preferences
    }

    /// Append a polled sample to the history.
    pub fn record_visit(&self, sample: LocationSample) {
        self.write_history().push(sample);
    }

    /// Snapshot of the history in insertion order.
    #[must_use]
    pub fn history(&self) -> Vec<LocationSample> {
        self.read_history().clone()
    }

    /// The most recently appended sample.
    #[must_use]
    pub fn last_visit(&self) -> Option<LocationSample> {
        self.read_history().last().cloned()
    }

    /// Snapshot of the reward ledger in credit order.
    #[must_use]
    pub fn rewards(&self) -> Vec<RewardRecord> {
        self.read_rewards().clone()
    }

    /// Whether a reward already exists for `attraction`.
    #[must_use]
    pub fn has_reward_for(&self, attraction: AttractionId) -> bool {
        self.read_rewards()
            .iter()
            .any(|record| record.attraction.id == attraction)
    }

    /// Identities of every attraction already rewarded.
    #[must_use]
    pub fn rewarded_attractions(&self) -> HashSet<AttractionId> {
        self.read_rewards()
            .iter()
            .map(|record| record.attraction.id)
            .collect()
    }

    /// Append a reward unless one already exists for the same attraction.
    ///
    /// Returns `true` when the record was added.
    pub fn add_reward(&self, record: RewardRecord) -> bool {
        let mut rewards = self.write_rewards();
        if rewards
            .iter()
            .any(|existing| existing.attraction.id == record.attraction.id)
        {
            return false;
        }
        rewards.push(record);
        true
    }

    /// Sum of all credited points.
    #[must_use]
    pub fn total_reward_points(&self) -> u64 {
        self.read_rewards()
            .iter()
            .map(|record| u64::from(record.points))
            .sum()
    }

    /// Serialisable copy of the tourist's current state.
    #[must_use]
    pub fn snapshot(&self) -> TouristSnapshot {
        TouristSnapshot {
            id: self.id,
            user_name: self.user_name.clone(),
            history: self.history(),
            rewards: self.rewards(),
        }
    }

    // Each mutation is a single push, so a poisoned lock never guards a
    // half-written vector.
    fn read_history(&self) -> RwLockReadGuard<'_, Vec<LocationSample>> {
        self.history.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_history(&self) -> RwLockWriteGuard<'_, Vec<LocationSample>> {
        self.history.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_rewards(&self) -> RwLockReadGuard<'_, Vec<RewardRecord>> {
        self.rewards.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_rewards(&self) -> RwLockWriteGuard<'_, Vec<RewardRecord>> {
        self.rewards.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time copy of a [`Tourist`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouristSnapshot {
    /// Identity of the tourist.
    pub id: TouristId,
    /// Unique user name.
    pub user_name: String,
    /// Location history, oldest first.
    pub history: Vec<LocationSample>,
    /// Reward ledger in credit order.
    pub rewards: Vec<RewardRecord>,
}
