//! Reward attribution for a single tourist.
//!
//! [`RewardEngine::attribute`] snapshots the tourist's history and the
//! catalog, then walks samples oldest first and attractions in catalog
//! order. The first sample within the reward buffer of an attraction earns
//! the reward; no later sample or later call revisits that attraction.

use std::collections::HashSet;

use geo::Coord;
use log::debug;
use thiserror::Error;

use crate::{
    Attraction, AttractionCatalog, AttractionId, CollaboratorError, NearbyAttraction,
    PointsResolver, RewardConfig, RewardRecord, Tourist, TouristId, nearest_attractions,
    proximity,
};

/// Errors raised while attributing rewards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributionError {
    /// The points resolver failed for a newly qualifying attraction.
    ///
    /// Rewards credited earlier in the same call are kept.
    #[error("failed to resolve points for {attraction} and {tourist}: {source}")]
    Points {
        /// Attraction being rewarded.
        attraction: AttractionId,
        /// Tourist being rewarded.
        tourist: TouristId,
        /// Resolver failure.
        #[source]
        source: CollaboratorError,
    },
}

/// Result of one [`RewardEngine::attribute`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributionOutcome {
    /// Number of history samples in the snapshot that was scanned.
    pub samples_scanned: usize,
    /// Rewards credited by this call, in credit order.
    pub credited: Vec<RewardRecord>,
}

/// Attributes rewards to tourists against a shared attraction catalog.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use tourguide_core::test_support::{MemoryCatalog, TablePointsResolver, attraction};
/// use tourguide_core::{LocationSample, RewardConfig, RewardEngine, Tourist, TouristId};
///
/// let catalog = MemoryCatalog::new([attraction(1, "Museum", 0.0, 0.0)]);
/// let engine = RewardEngine::new(catalog, TablePointsResolver::uniform(50));
/// let tourist = Tourist::new(TouristId(1), "ada");
/// tourist.record_visit(LocationSample::now(TouristId(1), Coord { x: 0.0, y: 0.01 }));
///
/// let outcome = engine.attribute(&tourist, &RewardConfig::default())?;
/// assert_eq!(outcome.credited.len(), 1);
/// assert_eq!(tourist.total_reward_points(), 50);
/// # Ok::<(), tourguide_core::AttributionError>(())
/// ```
#[derive(Debug)]
pub struct RewardEngine<C, R> {
    catalog: C,
    resolver: R,
}

impl<C, R> RewardEngine<C, R>
where
    C: AttractionCatalog,
    R: PointsResolver,
{
    /// Construct an engine over a catalog and points resolver.
    pub const fn new(catalog: C, resolver: R) -> Self {
        Self { catalog, resolver }
    }

    /// The attraction catalog.
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    /// The points resolver.
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Credit `tourist` with at most one reward per attraction.
    ///
    /// Repeated calls are idempotent: attractions already present in the
    /// ledger are skipped before any distance is computed.
    ///
    /// # Errors
    /// Returns [`AttributionError::Points`] as soon as the resolver fails.
    /// Rewards credited before the failure remain in the ledger.
    pub fn attribute(
        &self,
        tourist: &Tourist,
        config: &RewardConfig,
    ) -> Result<AttributionOutcome, AttributionError> {
        let history = tourist.history();
        let attractions = self.catalog.attractions();
        let mut rewarded: HashSet<AttractionId> = tourist.rewarded_attractions();
        let mut credited = Vec::new();

        for sample in &history {
            for attraction in &attractions {
                if rewarded.contains(&attraction.id) || !config.qualifies(attraction, sample.location)
                {
                    continue;
                }
                let points = self.points_for(attraction, tourist.id())?;
                let record = RewardRecord::new(sample.clone(), attraction.clone(), points);
                if tourist.add_reward(record.clone()) {
                    debug!(
                        "credited {} with {points} points at {}",
                        tourist.id(),
                        attraction.id
                    );
                    credited.push(record);
                }
                rewarded.insert(attraction.id);
            }
        }

        Ok(AttributionOutcome {
            samples_scanned: history.len(),
            credited,
        })
    }

    /// Resolve the points `tourist` would earn at `attraction`.
    ///
    /// # Errors
    /// Returns [`AttributionError::Points`] when the resolver fails.
    pub fn points_for(
        &self,
        attraction: &Attraction,
        tourist: TouristId,
    ) -> Result<u32, AttributionError> {
        self.resolver
            .points(attraction.id, tourist)
            .map_err(|source| AttributionError::Points {
                attraction: attraction.id,
                tourist,
                source,
            })
    }

    /// Whether `location` is within the fixed visibility range of `attraction`.
    #[must_use]
    pub fn is_within_visibility_range(&self, attraction: &Attraction, location: Coord<f64>) -> bool {
        proximity::is_within_visibility_range(attraction, location)
    }

    /// The `limit` attractions nearest to `location`, closest first.
    ///
    /// See [`nearest_attractions`].
    ///
    /// # Errors
    /// Returns [`AttributionError::Points`] when the resolver fails.
    pub fn nearest(
        &self,
        tourist: TouristId,
        location: Coord<f64>,
        limit: i64,
    ) -> Result<Vec<NearbyAttraction>, AttributionError> {
        nearest_attractions(&self.catalog, &self.resolver, tourist, location, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocationSample;
    use crate::proximity::degrees_for_miles;
    use crate::test_support::{
        FailingPointsResolver, MemoryCatalog, TablePointsResolver, attraction,
    };
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    const TOURIST: TouristId = TouristId(1);

    fn sample_north_of_origin(miles: f64) -> LocationSample {
        LocationSample::now(
            TOURIST,
            Coord {
                x: 0.0,
                y: degrees_for_miles(miles),
            },
        )
    }

    #[fixture]
    fn engine() -> RewardEngine<MemoryCatalog, TablePointsResolver> {
        let catalog = MemoryCatalog::new([
            attraction(1, "Origin", 0.0, 0.0),
            attraction(2, "Far Away", 90.0, 0.0),
        ]);
        let resolver = TablePointsResolver::uniform(100).with_points(AttractionId(1), 42);
        RewardEngine::new(catalog, resolver)
    }

    #[rstest]
    fn credits_attraction_within_buffer(engine: RewardEngine<MemoryCatalog, TablePointsResolver>) {
        let tourist = Tourist::new(TOURIST, "ada").with_history([sample_north_of_origin(4.0)]);

        let outcome = engine
            .attribute(&tourist, &RewardConfig::default())
            .expect("attribution succeeds");

        assert_eq!(outcome.samples_scanned, 1);
        let rewards = tourist.rewards();
        assert_eq!(rewards.len(), 1);
        let reward = rewards.first().expect("one reward");
        assert_eq!(reward.attraction.id, AttractionId(1));
        assert_eq!(reward.points, 42);
    }

    #[rstest]
    fn ignores_attractions_outside_buffer(
        engine: RewardEngine<MemoryCatalog, TablePointsResolver>,
    ) {
        let tourist = Tourist::new(TOURIST, "ada").with_history([sample_north_of_origin(11.0)]);

        let outcome = engine
            .attribute(&tourist, &RewardConfig::default())
            .expect("attribution succeeds");

        assert!(outcome.credited.is_empty());
        assert!(tourist.rewards().is_empty());
        assert_eq!(engine.resolver().calls(), 0);
    }

    #[rstest]
    fn earliest_qualifying_sample_wins(engine: RewardEngine<MemoryCatalog, TablePointsResolver>) {
        let tourist = Tourist::new(TOURIST, "ada").with_history([
            sample_north_of_origin(50.0),
            sample_north_of_origin(3.0),
            sample_north_of_origin(1.0),
        ]);
        let second = tourist.history().get(1).cloned().expect("second sample");

        engine
            .attribute(&tourist, &RewardConfig::default())
            .expect("attribution succeeds");

        let rewards = tourist.rewards();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards.first().map(|r| &r.sample), Some(&second));
    }

    #[rstest]
    fn repeated_calls_are_idempotent(engine: RewardEngine<MemoryCatalog, TablePointsResolver>) {
        let tourist = Tourist::new(TOURIST, "ada").with_history([sample_north_of_origin(2.0)]);
        let config = RewardConfig::default();

        engine.attribute(&tourist, &config).expect("first call");
        tourist.record_visit(sample_north_of_origin(0.5));
        let outcome = engine.attribute(&tourist, &config).expect("second call");

        assert!(outcome.credited.is_empty());
        assert_eq!(tourist.rewards().len(), 1);
        assert_eq!(engine.resolver().calls(), 1);
    }

    #[rstest]
    fn wider_buffer_reaches_distant_attraction(
        engine: RewardEngine<MemoryCatalog, TablePointsResolver>,
    ) {
        let tourist = Tourist::new(TOURIST, "ada").with_history([sample_north_of_origin(30.0)]);
        let config = RewardConfig::new(31.0).expect("valid buffer");

        engine.attribute(&tourist, &config).expect("attribution succeeds");

        assert!(tourist.has_reward_for(AttractionId(1)));
        assert!(!tourist.has_reward_for(AttractionId(2)));
    }

    #[rstest]
    fn resolver_failure_propagates_without_rollback() {
        let catalog = MemoryCatalog::new([
            attraction(1, "First", 0.0, 0.0),
            attraction(2, "Second", 0.0, 0.0),
        ]);
        let resolver = FailingPointsResolver::for_attractions([AttractionId(2)], 10);
        let engine = RewardEngine::new(catalog, resolver);
        let tourist = Tourist::new(TOURIST, "ada").with_history([sample_north_of_origin(0.0)]);

        let err = engine
            .attribute(&tourist, &RewardConfig::default())
            .expect_err("resolver failure should surface");

        assert!(matches!(
            err,
            AttributionError::Points { attraction, .. } if attraction == AttractionId(2)
        ));
        assert!(tourist.has_reward_for(AttractionId(1)));
        assert!(!tourist.has_reward_for(AttractionId(2)));
    }

    /// Resolver that moves the tourist while points are being resolved.
    struct MovingResolver {
        tourist: Arc<Tourist>,
        next_visit: LocationSample,
    }

    impl PointsResolver for MovingResolver {
        fn points(
            &self,
            _attraction: AttractionId,
            _tourist: TouristId,
        ) -> Result<u32, CollaboratorError> {
            self.tourist.record_visit(self.next_visit.clone());
            Ok(5)
        }
    }

    #[rstest]
    fn visits_recorded_mid_call_wait_for_the_next_call() {
        let pier = sample_north_of_origin(40.0);
        let catalog = MemoryCatalog::new([
            attraction(1, "Origin", 0.0, 0.0),
            attraction(2, "Pier", pier.location.x, pier.location.y),
        ]);
        let tourist =
            Arc::new(Tourist::new(TOURIST, "ada").with_history([sample_north_of_origin(1.0)]));
        let engine = RewardEngine::new(
            catalog,
            MovingResolver {
                tourist: Arc::clone(&tourist),
                next_visit: pier,
            },
        );
        let config = RewardConfig::default();

        let first = engine.attribute(&tourist, &config).expect("first call");
        assert_eq!(first.samples_scanned, 1);
        assert_eq!(tourist.history().len(), 2);
        assert!(tourist.has_reward_for(AttractionId(1)));
        assert!(!tourist.has_reward_for(AttractionId(2)));

        let second = engine.attribute(&tourist, &config).expect("second call");
        assert_eq!(second.samples_scanned, 2);
        assert!(tourist.has_reward_for(AttractionId(2)));
    }

    #[rstest]
    fn empty_history_credits_nothing(engine: RewardEngine<MemoryCatalog, TablePointsResolver>) {
        let tourist = Tourist::new(TOURIST, "ada");
        let outcome = engine
            .attribute(&tourist, &RewardConfig::default())
            .expect("attribution succeeds");
        assert_eq!(outcome, AttributionOutcome::default());
    }

    #[rstest]
    fn visibility_range_ignores_reward_buffer(
        engine: RewardEngine<MemoryCatalog, TablePointsResolver>,
    ) {
        let origin = attraction(1, "Origin", 0.0, 0.0);
        let location = sample_north_of_origin(150.0).location;
        assert!(engine.is_within_visibility_range(&origin, location));
        assert!(!RewardConfig::default().qualifies(&origin, location));
    }
}
