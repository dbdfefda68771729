//! Fixed points of interest that tourists can be rewarded for visiting.

use std::fmt;

use geo::Coord;
use serde::{Deserialize, Serialize};

/// Stable identity of an [`Attraction`].
///
/// Rewards are deduplicated on this identity, never on the display name,
/// so two attractions sharing a name remain distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttractionId(pub u64);

impl fmt::Display for AttractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attraction#{}", self.0)
    }
}

/// A point of interest in the catalog.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use tourguide_core::{Attraction, AttractionId};
///
/// let attraction = Attraction::new(
///     AttractionId(1),
///     "Disneyland",
///     Coord { x: -117.922_008, y: 33.817_595 },
/// )
/// .with_address("Anaheim", "CA");
///
/// assert_eq!(attraction.name, "Disneyland");
/// assert_eq!(attraction.latitude(), 33.817_595);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attraction {
    /// Unique identifier.
    pub id: AttractionId,
    /// Display name.
    pub name: String,
    /// City the attraction is located in.
    #[serde(default)]
    pub city: String,
    /// State or region the attraction is located in.
    #[serde(default)]
    pub state: String,
    /// Geospatial position.
    pub location: Coord<f64>,
}

impl Attraction {
    /// Construct an attraction without address details.
    pub fn new(id: AttractionId, name: impl Into<String>, location: Coord<f64>) -> Self {
        Self {
            id,
            name: name.into(),
            city: String::new(),
            state: String::new(),
            location,
        }
    }

    /// Attach a city and state to the attraction.
    #[must_use]
    pub fn with_address(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.city = city.into();
        self.state = state.into();
        self
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.location.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.location.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn axis_accessors_follow_wgs84_order() {
        let attraction = Attraction::new(AttractionId(3), "Pier", Coord { x: -122.4, y: 37.8 });
        assert_eq!(attraction.longitude(), -122.4);
        assert_eq!(attraction.latitude(), 37.8);
    }

    #[rstest]
    fn identity_displays_with_prefix() {
        assert_eq!(AttractionId(42).to_string(), "attraction#42");
    }

    #[rstest]
    fn address_fields_default_when_missing_from_json() {
        let json = r#"{"id":7,"name":"Museum","location":{"x":1.0,"y":2.0}}"#;
        let attraction: Attraction = serde_json::from_str(json).expect("decode attraction");
        assert_eq!(attraction.id, AttractionId(7));
        assert!(attraction.city.is_empty());
        assert!(attraction.state.is_empty());
    }
}
