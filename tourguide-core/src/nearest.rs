//! Bounded top-K selection of the attractions nearest to a location.
//!
//! A max-heap of capacity `k` keeps the best candidates seen so far with
//! the farthest at its head. Each new attraction replaces the head only
//! when strictly closer, giving `O(n log k)` time and `O(k)` memory.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::{
    Attraction, AttractionCatalog, AttributionError, PointsResolver, TouristId, proximity,
};

/// Result count used when the caller asks for zero or fewer attractions.
pub const DEFAULT_NEAREST_LIMIT: usize = 5;

/// One row of a nearest-attraction query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyAttraction {
    /// The attraction.
    pub attraction: Attraction,
    /// Distance from the query location in statute miles.
    pub distance_miles: f64,
    /// Points the querying tourist would earn there.
    pub reward_points: u32,
}

/// Heap entry ordered by distance, then by catalog position.
///
/// Ordering on the catalog position makes the head the latest-inserted of
/// several equally distant candidates, so ties keep the earlier entry.
#[derive(Debug)]
struct Candidate {
    distance_miles: f64,
    position: usize,
    attraction: Attraction,
    reward_points: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_miles
            .total_cmp(&other.distance_miles)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl From<Candidate> for NearbyAttraction {
    fn from(candidate: Candidate) -> Self {
        Self {
            attraction: candidate.attraction,
            distance_miles: candidate.distance_miles,
            reward_points: candidate.reward_points,
        }
    }
}

/// The `limit` attractions nearest to `location`, closest first.
///
/// Returns `min(limit, catalog size)` rows. A `limit` of zero or less is
/// treated as [`DEFAULT_NEAREST_LIMIT`]. Points are resolved for every
/// catalog entry as it is scored.
///
/// # Errors
/// Returns [`AttributionError::Points`] when the resolver fails.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use tourguide_core::test_support::{MemoryCatalog, TablePointsResolver, attraction};
/// use tourguide_core::{TouristId, nearest_attractions};
///
/// let catalog = MemoryCatalog::new([
///     attraction(1, "Far", 0.0, 3.0),
///     attraction(2, "Near", 0.0, 1.0),
///     attraction(3, "Middle", 0.0, 2.0),
/// ]);
/// let resolver = TablePointsResolver::uniform(10);
///
/// let nearest = nearest_attractions(&catalog, &resolver, TouristId(1), Coord { x: 0.0, y: 0.0 }, 2)?;
/// let names: Vec<_> = nearest.iter().map(|row| row.attraction.name.as_str()).collect();
/// assert_eq!(names, ["Near", "Middle"]);
/// # Ok::<(), tourguide_core::AttributionError>(())
/// ```
pub fn nearest_attractions<C, R>(
    catalog: &C,
    resolver: &R,
    tourist: TouristId,
    location: Coord<f64>,
    limit: i64,
) -> Result<Vec<NearbyAttraction>, AttributionError>
where
    C: AttractionCatalog + ?Sized,
    R: PointsResolver + ?Sized,
{
    let capacity = effective_limit(limit);
    let attractions = catalog.attractions();
    let mut heap: BinaryHeap<Candidate> =
        BinaryHeap::with_capacity(capacity.min(attractions.len()));

    for (position, attraction) in attractions.into_iter().enumerate() {
        let distance_miles = proximity::distance(&attraction, location);
        let reward_points =
            resolver
                .points(attraction.id, tourist)
                .map_err(|source| AttributionError::Points {
                    attraction: attraction.id,
                    tourist,
                    source,
                })?;
        let candidate = Candidate {
            distance_miles,
            position,
            attraction,
            reward_points,
        };
        offer(&mut heap, candidate, capacity);
    }

    let mut ordered = heap.into_vec();
    ordered.sort_unstable();
    Ok(ordered.into_iter().map(NearbyAttraction::from).collect())
}

fn offer(heap: &mut BinaryHeap<Candidate>, candidate: Candidate, capacity: usize) {
    if heap.len() < capacity {
        heap.push(candidate);
        return;
    }
    if let Some(mut worst) = heap.peek_mut()
        && candidate.distance_miles.total_cmp(&worst.distance_miles) == Ordering::Less
    {
        *worst = candidate;
    }
}

fn effective_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_NEAREST_LIMIT
    } else {
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}
