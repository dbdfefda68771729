//! Great-circle distances between attractions and tourist positions.
//!
//! Distances are computed with the spherical law of cosines. The central
//! angle is first expressed in nautical miles (one minute of arc per
//! nautical mile) and then converted to statute miles.

use geo::Coord;

use crate::Attraction;

/// Conversion factor from nautical to statute miles.
pub const STATUTE_MILES_PER_NAUTICAL_MILE: f64 = 1.150_779_45;

/// Fixed range used to decide whether a position is "at" an attraction.
///
/// Independent of any [`RewardConfig`](crate::RewardConfig).
pub const VISIBILITY_RANGE_MILES: f64 = 200.0;

const NAUTICAL_MILES_PER_DEGREE: f64 = 60.0;

/// Great-circle distance between two WGS84 coordinates in statute miles.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use tourguide_core::proximity::distance_between;
///
/// let origin = Coord { x: 0.0, y: 0.0 };
/// let one_degree_north = Coord { x: 0.0, y: 1.0 };
/// let miles = distance_between(origin, one_degree_north);
/// assert!((miles - 69.046_767).abs() < 1e-3);
/// ```
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "spherical trigonometry requires floating-point maths"
)]
pub fn distance_between(from: Coord<f64>, to: Coord<f64>) -> f64 {
    let lat1 = from.y.to_radians();
    let lon1 = from.x.to_radians();
    let lat2 = to.y.to_radians();
    let lon2 = to.x.to_radians();

    // Rounding can push the cosine fractionally outside [-1, 1] for
    // coincident or antipodal points, which would make `acos` return NaN.
    let cosine = (lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lon1 - lon2).cos())
        .clamp(-1.0, 1.0);
    let nautical_miles = NAUTICAL_MILES_PER_DEGREE * cosine.acos().to_degrees();
    STATUTE_MILES_PER_NAUTICAL_MILE * nautical_miles
}

/// Distance from `attraction` to `location` in statute miles.
#[must_use]
pub fn distance(attraction: &Attraction, location: Coord<f64>) -> f64 {
    distance_between(attraction.location, location)
}

/// Whether `location` lies within `threshold_miles` of `attraction`.
///
/// The boundary is inclusive.
#[must_use]
pub fn is_within(attraction: &Attraction, location: Coord<f64>, threshold_miles: f64) -> bool {
    distance(attraction, location) <= threshold_miles
}

/// Whether `location` lies within [`VISIBILITY_RANGE_MILES`] of `attraction`.
#[must_use]
pub fn is_within_visibility_range(attraction: &Attraction, location: Coord<f64>) -> bool {
    is_within(attraction, location, VISIBILITY_RANGE_MILES)
}

/// Latitude delta, in degrees, covering `miles` along a meridian.
///
/// Useful for placing positions at a known distance from an attraction.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "converting miles to degrees of arc divides by a constant"
)]
pub fn degrees_for_miles(miles: f64) -> f64 {
    miles / (STATUTE_MILES_PER_NAUTICAL_MILE * NAUTICAL_MILES_PER_DEGREE)
}
