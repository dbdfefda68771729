//! Test helpers for writing scenario files into temporary workspaces.

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use std::fs;
use tempfile::TempDir;
use tourguide_core::proximity::degrees_for_miles;
use tourguide_core::test_support::attraction;
use tourguide_core::{AttractionId, TouristId, TripPreferences};

use crate::scenario::{PointsOverride, PointsTable, Scenario, ScenarioTourist, ScenarioVisit};

pub(super) const MUSEUM: AttractionId = AttractionId(1);
pub(super) const PIER: AttractionId = AttractionId(2);
pub(super) const SUMMIT: AttractionId = AttractionId(3);

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write test file");
}

pub(super) fn origin() -> Coord<f64> {
    Coord { x: 0.0, y: 0.0 }
}

pub(super) fn pier_location() -> Coord<f64> {
    Coord {
        x: 0.0,
        y: degrees_for_miles(5.0),
    }
}

pub(super) fn summit_location() -> Coord<f64> {
    Coord { x: 10.0, y: 10.0 }
}

/// Museum at the origin, a pier five miles north and a distant summit.
///
/// `ada` has visited the museum and will next be seen at the summit;
/// `grace` has no history and will next be seen at the pier. Only `ada`
/// carries contact details and non-default trip preferences.
pub(super) fn sample_scenario() -> Scenario {
    let pier = pier_location();
    let summit = summit_location();
    Scenario {
        attractions: vec![
            attraction(MUSEUM.0, "Museum", 0.0, 0.0),
            attraction(PIER.0, "Pier", pier.x, pier.y),
            attraction(SUMMIT.0, "Summit", summit.x, summit.y),
        ],
        tourists: vec![
            ScenarioTourist {
                id: TouristId(1),
                user_name: "ada".to_owned(),
                phone_number: "000".to_owned(),
                email: "ada@tourguide.test".to_owned(),
                preferences: TripPreferences {
                    number_of_adults: 2,
                    number_of_children: 1,
                    trip_duration_days: 3,
                },
                history: vec![ScenarioVisit {
                    location: origin(),
                    visited_at: None,
                }],
                next_locations: vec![summit],
            },
            ScenarioTourist {
                id: TouristId(2),
                user_name: "grace".to_owned(),
                phone_number: String::new(),
                email: String::new(),
                preferences: TripPreferences::default(),
                history: Vec::new(),
                next_locations: vec![pier],
            },
        ],
        points: PointsTable {
            default_points: 10,
            overrides: vec![PointsOverride {
                attraction: MUSEUM,
                points: 100,
            }],
        },
    }
}

/// A temporary directory holding `scenario.json`.
#[derive(Debug)]
pub(super) struct ScenarioFile {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl ScenarioFile {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self {
            _dir: dir,
            path: root.join("scenario.json"),
        }
    }

    pub(super) fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub(super) fn write(&self, scenario: &Scenario) {
        let payload = serde_json::to_string_pretty(scenario).expect("serialise scenario");
        write_utf8(&self.path, payload.as_bytes());
    }
}
