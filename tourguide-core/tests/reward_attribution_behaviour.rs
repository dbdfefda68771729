//! Behavioural tests for crediting rewards from a tourist's history.

use std::cell::RefCell;

use geo::Coord;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tourguide_core::proximity::degrees_for_miles;
use tourguide_core::test_support::{MemoryCatalog, TablePointsResolver, attraction};
use tourguide_core::{
    AttractionId, LocationSample, RewardConfig, RewardEngine, RewardRecord, Tourist, TouristId,
};

const MUSEUM: AttractionId = AttractionId(1);
const MUSEUM_POINTS: u32 = 321;
const TOURIST: TouristId = TouristId(7);

/// Scenario state shared between steps.
struct AttributionWorld {
    engine: RefCell<Option<RewardEngine<MemoryCatalog, TablePointsResolver>>>,
    tourist: RefCell<Option<Tourist>>,
    config: RefCell<RewardConfig>,
}

impl AttributionWorld {
    fn new() -> Self {
        Self {
            engine: RefCell::new(None),
            tourist: RefCell::new(None),
            config: RefCell::new(RewardConfig::default()),
        }
    }

    fn rewards(&self) -> Vec<RewardRecord> {
        self.tourist
            .borrow()
            .as_ref()
            .map(Tourist::rewards)
            .unwrap_or_else(|| panic!("tourist must be initialised"))
    }

    fn attribute(&self) {
        let engine_slot = self.engine.borrow();
        let tourist_slot = self.tourist.borrow();
        let (Some(engine), Some(tourist)) = (engine_slot.as_ref(), tourist_slot.as_ref()) else {
            panic!("engine and tourist must be initialised");
        };
        let config = *self.config.borrow();
        if let Err(err) = engine.attribute(tourist, &config) {
            panic!("attribution should succeed, got {err}");
        }
    }
}

fn visit(miles: f64) -> LocationSample {
    LocationSample::now(
        TOURIST,
        Coord {
            x: 0.0,
            y: degrees_for_miles(miles),
        },
    )
}

#[fixture]
fn world() -> AttributionWorld {
    AttributionWorld::new()
}

#[given("a catalog with a museum at the origin and a distant lighthouse")]
fn catalog_with_museum(#[from(world)] world: &AttributionWorld) {
    let catalog = MemoryCatalog::new([
        attraction(MUSEUM.0, "Museum", 0.0, 0.0),
        attraction(2, "Lighthouse", 45.0, 10.0),
    ]);
    let resolver = TablePointsResolver::uniform(1).with_points(MUSEUM, MUSEUM_POINTS);
    *world.engine.borrow_mut() = Some(RewardEngine::new(catalog, resolver));
}

#[given("a tourist whose only visit is 4 miles from the museum")]
fn tourist_four_miles_away(#[from(world)] world: &AttributionWorld) {
    *world.tourist.borrow_mut() = Some(Tourist::new(TOURIST, "ada").with_history([visit(4.0)]));
}

#[given("a tourist whose only visit is 40 miles from the museum")]
fn tourist_forty_miles_away(#[from(world)] world: &AttributionWorld) {
    *world.tourist.borrow_mut() = Some(Tourist::new(TOURIST, "ada").with_history([visit(40.0)]));
}

#[given("a tourist who visits 50, 3 and then 1 miles from the museum")]
fn tourist_with_three_visits(#[from(world)] world: &AttributionWorld) {
    *world.tourist.borrow_mut() = Some(
        Tourist::new(TOURIST, "ada").with_history([visit(50.0), visit(3.0), visit(1.0)]),
    );
}

#[given("the reward buffer is widened to 50 miles")]
fn widen_buffer(#[from(world)] world: &AttributionWorld) {
    if let Err(err) = world.config.borrow_mut().set_reward_buffer(50.0) {
        panic!("50 miles is a valid buffer: {err}");
    }
}

#[when("rewards are attributed")]
fn attribute_once(#[from(world)] world: &AttributionWorld) {
    world.attribute();
}

#[when("rewards are attributed twice")]
fn attribute_twice(#[from(world)] world: &AttributionWorld) {
    world.attribute();
    world.attribute();
}

#[then("the tourist holds exactly one reward for the museum")]
fn exactly_one_museum_reward(#[from(world)] world: &AttributionWorld) {
    let rewards = world.rewards();
    assert_eq!(rewards.len(), 1, "expected a single reward");
    let Some(reward) = rewards.first() else {
        panic!("one reward present");
    };
    assert_eq!(reward.attraction.id, MUSEUM);
}

#[then("the reward is worth the points resolved for the museum")]
fn reward_has_resolved_points(#[from(world)] world: &AttributionWorld) {
    let points: Vec<u32> = world.rewards().iter().map(|r| r.points).collect();
    assert_eq!(points, vec![MUSEUM_POINTS]);
}

#[then("the reward was triggered by the second visit")]
fn triggered_by_second_visit(#[from(world)] world: &AttributionWorld) {
    let second = world
        .tourist
        .borrow()
        .as_ref()
        .and_then(|tourist| tourist.history().get(1).cloned())
        .unwrap_or_else(|| panic!("second visit present"));
    let rewards = world.rewards();
    assert_eq!(rewards.first().map(|r| &r.sample), Some(&second));
}

#[then("the tourist holds no rewards")]
fn no_rewards(#[from(world)] world: &AttributionWorld) {
    assert!(world.rewards().is_empty(), "expected no rewards");
}

#[scenario(path = "tests/features/reward_attribution.feature", index = 0)]
fn single_reward_for_nearby_visit(world: AttributionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/reward_attribution.feature", index = 1)]
fn earliest_visit_wins(world: AttributionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/reward_attribution.feature", index = 2)]
fn distant_visits_earn_nothing(world: AttributionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/reward_attribution.feature", index = 3)]
fn wider_buffer_reaches_distant_visits(world: AttributionWorld) {
    let _ = world;
}
