//! JSON scenario files standing in for the external catalog, location and
//! points services.
//!
//! A scenario lists the attraction catalog, the tourists with their visit
//! histories, the reward points table and the positions the location
//! source will report next.

use std::collections::{HashMap, VecDeque};
use std::io::BufReader;
use std::sync::{Mutex, PoisonError};

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};
use tourguide_core::{
    Attraction, AttractionCatalog, AttractionId, CollaboratorError, LocationSample,
    LocationSource, PointsResolver, RewardEngine, Tourist, TouristId, TripPreferences,
};
use tourguide_dispatch::{DispatchConfig, TourGuide};

use crate::CliError;
use crate::fs::open_utf8_file;

/// The engine type every command runs against.
pub(crate) type ScenarioGuide = TourGuide<ScenarioCatalog, ScenarioPoints, ScenarioLocations>;

/// Top-level scenario document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub(crate) struct Scenario {
    /// Attraction catalog in catalog order.
    #[serde(default)]
    pub(crate) attractions: Vec<Attraction>,
    /// Registered tourists.
    #[serde(default)]
    pub(crate) tourists: Vec<ScenarioTourist>,
    /// Reward points table.
    #[serde(default)]
    pub(crate) points: PointsTable,
}

/// One tourist and the positions the location source reports for them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct ScenarioTourist {
    pub(crate) id: TouristId,
    pub(crate) user_name: String,
    #[serde(default)]
    pub(crate) phone_number: String,
    #[serde(default)]
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) preferences: TripPreferences,
    #[serde(default)]
    pub(crate) history: Vec<ScenarioVisit>,
    /// Positions returned by successive location polls, oldest first.
    #[serde(default)]
    pub(crate) next_locations: Vec<Coord<f64>>,
}

/// A recorded visit. Missing timestamps default to load time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct ScenarioVisit {
    pub(crate) location: Coord<f64>,
    #[serde(default)]
    pub(crate) visited_at: Option<DateTime<Utc>>,
}

/// Points awarded per attraction with a fallback for unlisted ones.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub(crate) struct PointsTable {
    #[serde(default)]
    pub(crate) default_points: u32,
    #[serde(default)]
    pub(crate) overrides: Vec<PointsOverride>,
}

/// Points for a single attraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct PointsOverride {
    pub(crate) attraction: AttractionId,
    pub(crate) points: u32,
}

/// Catalog backed by the scenario's attraction list.
#[derive(Debug, Clone)]
pub(crate) struct ScenarioCatalog(Vec<Attraction>);

impl AttractionCatalog for ScenarioCatalog {
    fn attractions(&self) -> Vec<Attraction> {
        self.0.clone()
    }
}

/// Resolver backed by the scenario's points table.
#[derive(Debug, Clone)]
pub(crate) struct ScenarioPoints {
    table: HashMap<AttractionId, u32>,
    default_points: u32,
}

impl PointsResolver for ScenarioPoints {
    fn points(
        &self,
        attraction: AttractionId,
        _tourist: TouristId,
    ) -> Result<u32, CollaboratorError> {
        Ok(self
            .table
            .get(&attraction)
            .copied()
            .unwrap_or(self.default_points))
    }
}

/// Location source replaying each tourist's `next_locations`.
#[derive(Debug)]
pub(crate) struct ScenarioLocations {
    queued: Mutex<HashMap<TouristId, VecDeque<Coord<f64>>>>,
}

impl LocationSource for ScenarioLocations {
    fn current_location(&self, tourist: TouristId) -> Result<LocationSample, CollaboratorError> {
        let next = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&tourist)
            .and_then(VecDeque::pop_front);
        next.map(|location| LocationSample::now(tourist, location))
            .ok_or_else(|| CollaboratorError::Unavailable {
                collaborator: "scenario location source",
                reason: format!("no scripted location left for {tourist}"),
            })
    }
}

impl Scenario {
    /// Build a service over this scenario and register its tourists.
    pub(crate) fn into_guide(
        self,
        path: &Utf8Path,
        pools: DispatchConfig,
    ) -> Result<ScenarioGuide, CliError> {
        let catalog = ScenarioCatalog(self.attractions);
        let points = ScenarioPoints {
            table: self
                .points
                .overrides
                .iter()
                .map(|entry| (entry.attraction, entry.points))
                .collect(),
            default_points: self.points.default_points,
        };
        let mut queued = HashMap::new();
        let mut tourists = Vec::with_capacity(self.tourists.len());
        for entry in self.tourists {
            let id = entry.id;
            queued.insert(id, entry.next_locations.into_iter().collect());
            let history = entry.history.into_iter().map(|visit| {
                LocationSample::new(id, visit.location, visit.visited_at.unwrap_or_else(Utc::now))
            });
            tourists.push(
                Tourist::new(id, entry.user_name)
                    .with_contact(entry.phone_number, entry.email)
                    .with_preferences(entry.preferences)
                    .with_history(history),
            );
        }
        let locations = ScenarioLocations {
            queued: Mutex::new(queued),
        };

        let guide = TourGuide::new(RewardEngine::new(catalog, points), locations, pools)?;
        for tourist in tourists {
            if guide.tourist(tourist.user_name()).is_ok() {
                return Err(CliError::DuplicateTourist {
                    path: path.to_path_buf(),
                    user_name: tourist.user_name().to_owned(),
                });
            }
            guide.add_tourist(tourist);
        }
        Ok(guide)
    }
}

/// Loads a JSON-encoded [`Scenario`] from disk.
pub(crate) fn load_scenario(path: &Utf8Path) -> Result<Scenario, CliError> {
    let file = open_utf8_file(path).map_err(|source| CliError::OpenScenario {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|source| CliError::ParseScenario {
        path: path.to_path_buf(),
        source,
    })
}
