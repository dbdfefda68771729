//! In-memory collaborators used by unit, behaviour and doc tests.
//!
//! None of these types talk to a real service. They are deterministic so
//! scenarios can assert exact rewards and call counts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use geo::Coord;

use crate::{
    Attraction, AttractionCatalog, AttractionId, CollaboratorError, LocationSample,
    LocationSource, PointsResolver, TouristId,
};

/// Build an attraction at (`longitude`, `latitude`).
#[must_use]
pub fn attraction(id: u64, name: &str, longitude: f64, latitude: f64) -> Attraction {
    Attraction::new(
        AttractionId(id),
        name,
        Coord {
            x: longitude,
            y: latitude,
        },
    )
}

/// Catalog backed by a vector, returned in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    attractions: Vec<Attraction>,
}

impl MemoryCatalog {
    /// Create a catalog from a collection of attractions.
    pub fn new<I>(attractions: I) -> Self
    where
        I: IntoIterator<Item = Attraction>,
    {
        Self {
            attractions: attractions.into_iter().collect(),
        }
    }
}

impl AttractionCatalog for MemoryCatalog {
    fn attractions(&self) -> Vec<Attraction> {
        self.attractions.clone()
    }
}

/// Resolver returning points from a table with a uniform fallback.
///
/// Every call is counted, including calls for unknown attractions.
#[derive(Debug, Default)]
pub struct TablePointsResolver {
    table: HashMap<AttractionId, u32>,
    fallback: u32,
    calls: AtomicUsize,
}

impl TablePointsResolver {
    /// Resolver that returns `points` for every attraction.
    #[must_use]
    pub fn uniform(points: u32) -> Self {
        Self {
            table: HashMap::new(),
            fallback: points,
            calls: AtomicUsize::new(0),
        }
    }

    /// Override the points for one attraction.
    #[must_use]
    pub fn with_points(mut self, attraction: AttractionId, points: u32) -> Self {
        self.table.insert(attraction, points);
        self
    }

    /// Number of resolutions served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PointsResolver for TablePointsResolver {
    fn points(
        &self,
        attraction: AttractionId,
        _tourist: TouristId,
    ) -> Result<u32, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.get(&attraction).copied().unwrap_or(self.fallback))
    }
}

/// Resolver that fails for selected attractions or tourists.
#[derive(Debug, Default)]
pub struct FailingPointsResolver {
    attractions: HashSet<AttractionId>,
    tourists: HashSet<TouristId>,
    points: u32,
}

impl FailingPointsResolver {
    /// Fail whenever one of `attractions` is resolved.
    pub fn for_attractions<I>(attractions: I, points: u32) -> Self
    where
        I: IntoIterator<Item = AttractionId>,
    {
        Self {
            attractions: attractions.into_iter().collect(),
            tourists: HashSet::new(),
            points,
        }
    }

    /// Fail whenever points are resolved for one of `tourists`.
    pub fn for_tourists<I>(tourists: I, points: u32) -> Self
    where
        I: IntoIterator<Item = TouristId>,
    {
        Self {
            attractions: HashSet::new(),
            tourists: tourists.into_iter().collect(),
            points,
        }
    }
}

impl PointsResolver for FailingPointsResolver {
    fn points(
        &self,
        attraction: AttractionId,
        tourist: TouristId,
    ) -> Result<u32, CollaboratorError> {
        if self.attractions.contains(&attraction) || self.tourists.contains(&tourist) {
            return Err(CollaboratorError::Unavailable {
                collaborator: "points resolver",
                reason: format!("scripted failure for {attraction} and {tourist}"),
            });
        }
        Ok(self.points)
    }
}

/// Location source replaying scripted positions per tourist.
///
/// Queued positions are returned first; once a tourist's queue is empty
/// the fallback position is returned. Tourists marked as failing always
/// yield an error.
#[derive(Debug, Default)]
pub struct ScriptedLocationSource {
    queued: Mutex<HashMap<TouristId, VecDeque<Coord<f64>>>>,
    fallback: Option<Coord<f64>>,
    failing: HashSet<TouristId>,
    calls: AtomicUsize,
}

impl ScriptedLocationSource {
    /// Source that returns `location` for every tourist.
    #[must_use]
    pub fn fixed(location: Coord<f64>) -> Self {
        Self {
            fallback: Some(location),
            ..Self::default()
        }
    }

    /// Queue a position for `tourist`.
    #[must_use]
    pub fn then(self, tourist: TouristId, location: Coord<f64>) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tourist)
            .or_default()
            .push_back(location);
        self
    }

    /// Make every poll for `tourist` fail.
    #[must_use]
    pub fn failing_for(mut self, tourist: TouristId) -> Self {
        self.failing.insert(tourist);
        self
    }

    /// Number of polls served so far, failures included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocationSource for ScriptedLocationSource {
    fn current_location(&self, tourist: TouristId) -> Result<LocationSample, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&tourist) {
            return Err(CollaboratorError::Unavailable {
                collaborator: "location source",
                reason: format!("scripted failure for {tourist}"),
            });
        }
        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&tourist)
            .and_then(VecDeque::pop_front);
        queued
            .or(self.fallback)
            .map(|location| LocationSample::now(tourist, location))
            .ok_or(CollaboratorError::Timeout {
                collaborator: "location source",
            })
    }
}
