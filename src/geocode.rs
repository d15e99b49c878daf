//! Geocoder contract.
//!
//! Consumed by the address-resolution feature, not by the tree engine:
//! the registry never calls out to a geocoder on its own. Implementations
//! wrap external services and translate free-text addresses into
//! coordinates, optionally scoped to known ancestor locations.

use crate::node::{Level, LocationId};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors a geocoder implementation may surface.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Address did not match any known location
    #[error("address not found: {0}")]
    NotFound(String),

    /// Address matched several locations and hints did not disambiguate
    #[error("ambiguous address: {0}")]
    Ambiguous(String),

    /// Underlying service failure
    #[error("geocoder backend error: {0}")]
    Backend(String),
}

/// A geocoded coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocodedPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Pluggable address resolver.
pub trait Geocoder {
    /// Resolve an address to a coordinate, scoped by optional ancestor
    /// location ids (country, district, ...) to narrow the search.
    fn geocode(
        &self,
        address: &str,
        ancestor_hints: &[LocationId],
    ) -> std::result::Result<GeocodedPoint, GeocodeError>;

    /// Resolve a coordinate back to the hierarchy locations covering it,
    /// one per level.
    fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
    ) -> std::result::Result<BTreeMap<Level, LocationId>, GeocodeError>;
}
