//! Boundaries to the services the engine consumes but does not own.
//!
//! The catalog is assumed cheap and stable for the duration of one batch.
//! The location source and points resolver may be slow and may fail; the
//! engine never retries them and propagates their errors unchanged.

use std::sync::Arc;

use thiserror::Error;

use crate::{Attraction, AttractionId, LocationSample, TouristId};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The collaborator could not serve the request.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        /// Name of the failing collaborator.
        collaborator: &'static str,
        /// Human-readable cause.
        reason: String,
    },
    /// The collaborator did not answer in time.
    #[error("{collaborator} timed out")]
    Timeout {
        /// Name of the failing collaborator.
        collaborator: &'static str,
    },
}

/// Read-only source of every known attraction.
///
/// # Examples
///
/// ```rust
/// use geo::Coord;
/// use tourguide_core::{Attraction, AttractionCatalog, AttractionId};
///
/// struct SingleAttraction(Attraction);
///
/// impl AttractionCatalog for SingleAttraction {
///     fn attractions(&self) -> Vec<Attraction> {
///         vec![self.0.clone()]
///     }
/// }
///
/// let catalog = SingleAttraction(Attraction::new(
///     AttractionId(1),
///     "Museum",
///     Coord { x: 0.0, y: 0.0 },
/// ));
/// assert_eq!(catalog.attractions().len(), 1);
/// ```
pub trait AttractionCatalog: Send + Sync {
    /// Snapshot of the catalog in a stable order.
    fn attractions(&self) -> Vec<Attraction>;
}

/// Source of a tourist's current position.
pub trait LocationSource: Send + Sync {
    /// Poll the current location of `tourist`.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when the position cannot be obtained.
    fn current_location(&self, tourist: TouristId) -> Result<LocationSample, CollaboratorError>;
}

/// Resolver of the points a tourist earns at an attraction.
///
/// Results are not cached; every call reaches the collaborator.
pub trait PointsResolver: Send + Sync {
    /// Points earned by `tourist` for visiting `attraction`.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when the resolver fails.
    fn points(&self, attraction: AttractionId, tourist: TouristId)
    -> Result<u32, CollaboratorError>;
}

impl<T: AttractionCatalog + ?Sized> AttractionCatalog for Arc<T> {
    fn attractions(&self) -> Vec<Attraction> {
        (**self).attractions()
    }
}

impl<T: LocationSource + ?Sized> LocationSource for Arc<T> {
    fn current_location(&self, tourist: TouristId) -> Result<LocationSample, CollaboratorError> {
        (**self).current_location(tourist)
    }
}

impl<T: PointsResolver + ?Sized> PointsResolver for Arc<T> {
    fn points(
        &self,
        attraction: AttractionId,
        tourist: TouristId,
    ) -> Result<u32, CollaboratorError> {
        (**self).points(attraction, tourist)
    }
}
