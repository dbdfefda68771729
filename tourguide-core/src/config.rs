//! Reward attribution configuration.
//!
//! The reward buffer is an explicit value handed to every attribution call
//! rather than process-wide state, so a batch always observes one
//! consistent threshold.

use geo::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Attraction, proximity};

/// Reward buffer applied when none is configured, in statute miles.
pub const DEFAULT_REWARD_BUFFER_MILES: f64 = 10.0;

/// Errors returned when constructing or updating a [`RewardConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RewardConfigError {
    /// The buffer was negative, NaN or infinite.
    #[error("reward buffer must be a finite, non-negative number of miles (got {miles})")]
    InvalidBuffer {
        /// Rejected value.
        miles: f64,
    },
}

/// Thresholds used by the attribution engine.
///
/// # Examples
/// ```
/// use tourguide_core::{DEFAULT_REWARD_BUFFER_MILES, RewardConfig};
///
/// # fn main() -> Result<(), tourguide_core::RewardConfigError> {
/// let mut config = RewardConfig::default();
/// config.set_reward_buffer(25.0)?;
/// assert_eq!(config.reward_buffer_miles(), 25.0);
///
/// config.reset_reward_buffer();
/// assert_eq!(config.reward_buffer_miles(), DEFAULT_REWARD_BUFFER_MILES);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRewardConfig", into = "RawRewardConfig")]
pub struct RewardConfig {
    reward_buffer_miles: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            reward_buffer_miles: DEFAULT_REWARD_BUFFER_MILES,
        }
    }
}

impl RewardConfig {
    /// Construct a configuration with the given reward buffer.
    ///
    /// # Errors
    /// Returns [`RewardConfigError::InvalidBuffer`] for negative or
    /// non-finite values.
    pub fn new(reward_buffer_miles: f64) -> Result<Self, RewardConfigError> {
        validate(reward_buffer_miles)?;
        Ok(Self {
            reward_buffer_miles,
        })
    }

    /// Current reward buffer in statute miles.
    #[must_use]
    pub const fn reward_buffer_miles(&self) -> f64 {
        self.reward_buffer_miles
    }

    /// Replace the reward buffer.
    ///
    /// # Errors
    /// Returns [`RewardConfigError::InvalidBuffer`] and leaves the current
    /// value untouched when `miles` is negative or non-finite.
    pub fn set_reward_buffer(&mut self, miles: f64) -> Result<(), RewardConfigError> {
        validate(miles)?;
        self.reward_buffer_miles = miles;
        Ok(())
    }

    /// Restore [`DEFAULT_REWARD_BUFFER_MILES`].
    pub const fn reset_reward_buffer(&mut self) {
        self.reward_buffer_miles = DEFAULT_REWARD_BUFFER_MILES;
    }

    /// Whether a visit at `location` qualifies for a reward at `attraction`.
    #[must_use]
    pub fn qualifies(&self, attraction: &Attraction, location: Coord<f64>) -> bool {
        proximity::is_within(attraction, location, self.reward_buffer_miles)
    }
}

fn validate(miles: f64) -> Result<(), RewardConfigError> {
    if miles.is_finite() && miles >= 0.0 {
        Ok(())
    } else {
        Err(RewardConfigError::InvalidBuffer { miles })
    }
}

#[derive(Serialize, Deserialize)]
struct RawRewardConfig {
    #[serde(default = "default_buffer")]
    reward_buffer_miles: f64,
}

const fn default_buffer() -> f64 {
    DEFAULT_REWARD_BUFFER_MILES
}

impl TryFrom<RawRewardConfig> for RewardConfig {
    type Error = RewardConfigError;

    fn try_from(raw: RawRewardConfig) -> Result<Self, Self::Error> {
        Self::new(raw.reward_buffer_miles)
    }
}

impl From<RewardConfig> for RawRewardConfig {
    fn from(config: RewardConfig) -> Self {
        Self {
            reward_buffer_miles: config.reward_buffer_miles,
        }
    }
}
