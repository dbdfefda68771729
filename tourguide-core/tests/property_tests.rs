//! Property-based checks for attribution and nearest-attraction selection.

use std::collections::HashSet;

use geo::Coord;
use proptest::prelude::*;
use tourguide_core::proximity::distance;
use tourguide_core::test_support::{MemoryCatalog, TablePointsResolver, attraction};
use tourguide_core::{
    Attraction, AttractionCatalog, LocationSample, RewardConfig, RewardEngine, Tourist, TouristId,
    nearest_attractions,
};

const TOURIST: TouristId = TouristId(1);

fn coordinate() -> impl Strategy<Value = Coord<f64>> {
    (-1.0_f64..1.0, -1.0_f64..1.0).prop_map(|(x, y)| Coord { x, y })
}

fn catalog_strategy() -> impl Strategy<Value = Vec<Attraction>> {
    prop::collection::vec(coordinate(), 0..24).prop_map(|coords| {
        coords
            .into_iter()
            .zip(1_u64..)
            .map(|(coord, id)| attraction(id, &format!("A{id}"), coord.x, coord.y))
            .collect()
    })
}

proptest! {
    #[test]
    fn nearest_matches_exhaustive_sort(
        attractions in catalog_strategy(),
        location in coordinate(),
        limit in -3_i64..30,
    ) {
        let catalog = MemoryCatalog::new(attractions.clone());
        let resolver = TablePointsResolver::uniform(1);
        let rows = nearest_attractions(&catalog, &resolver, TOURIST, location, limit)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;

        let k = if limit <= 0 { 5 } else { usize::try_from(limit).unwrap_or(usize::MAX) };
        prop_assert_eq!(rows.len(), k.min(attractions.len()));

        let mut expected: Vec<f64> = attractions
            .iter()
            .map(|a| distance(a, location))
            .collect();
        expected.sort_by(f64::total_cmp);
        expected.truncate(rows.len());
        let actual: Vec<f64> = rows.iter().map(|row| row.distance_miles).collect();
        prop_assert_eq!(actual.clone(), expected);
        prop_assert!(actual.windows(2).all(|pair| matches!(pair, [a, b] if a <= b)));
    }

    #[test]
    fn repeated_attribution_credits_each_attraction_at_most_once(
        attractions in catalog_strategy(),
        visits in prop::collection::vec(coordinate(), 0..8),
        rounds in 1_usize..4,
    ) {
        let engine = RewardEngine::new(
            MemoryCatalog::new(attractions),
            TablePointsResolver::uniform(3),
        );
        let config = RewardConfig::new(25.0).map_err(|err| TestCaseError::fail(err.to_string()))?;
        let tourist = Tourist::new(TOURIST, "prop")
            .with_history(visits.iter().map(|&c| LocationSample::now(TOURIST, c)));

        for _ in 0..rounds {
            engine
                .attribute(&tourist, &config)
                .map_err(|err| TestCaseError::fail(err.to_string()))?;
        }

        let rewards = tourist.rewards();
        let unique: HashSet<_> = rewards.iter().map(|r| r.attraction.id).collect();
        prop_assert_eq!(unique.len(), rewards.len());

        let history = tourist.history();
        for candidate in engine.catalog().attractions() {
            let first_qualifying = history
                .iter()
                .find(|sample| config.qualifies(&candidate, sample.location));
            let credited = rewards.iter().find(|r| r.attraction.id == candidate.id);
            prop_assert_eq!(credited.map(|r| &r.sample), first_qualifying);
        }
    }
}
