//! Spherical geometry helpers.
//!
//! Free functions shared by the maintenance engine and the query
//! primitives: great-circle distance, bearing, radius-to-bounds
//! conversion and map-friendly bounds for point sets.

use crate::node::BoundingBox;
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.01;

/// Great-circle distance formula.
///
/// - **Cosines**: spherical law of cosines, accurate down to around a
///   metre and computationally cheap; the default.
/// - **Haversine**: numerically better conditioned for very small
///   distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFormula {
    #[default]
    Cosines,
    Haversine,
}

/// Shortest distance in km over the sphere between two lat/lon pairs.
///
/// # Examples
///
/// ```rust
/// use gazetteer::spatial::{DistanceFormula, great_circle_distance_km};
///
/// let d = great_circle_distance_km(40.7128, -74.0060, 34.0522, -118.2437,
///                                  DistanceFormula::Cosines);
/// assert!(d > 3_900.0 && d < 4_000.0);
/// ```
pub fn great_circle_distance_km(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
    formula: DistanceFormula,
) -> f64 {
    match formula {
        DistanceFormula::Cosines => {
            let lat1 = lat1.to_radians();
            let lat2 = lat2.to_radians();
            let delta_lon = (lon2 - lon1).to_radians();
            let cos_angle = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * delta_lon.cos();
            // Identical points can land a hair above 1.0.
            cos_angle.clamp(-1.0, 1.0).acos() * EARTH_RADIUS_KM
        }
        DistanceFormula::Haversine => {
            Haversine.distance(Point::new(lon1, lat1), Point::new(lon2, lat2)) / 1000.0
        }
    }
}

/// Initial compass bearing in degrees from a start to an end coordinate.
pub fn bearing(lat_start: f64, lon_start: f64, lat_end: f64, lon_end: f64) -> f64 {
    let lat1 = lat_start.to_radians();
    let lat2 = lat_end.to_radians();
    let delta_lon = (lon_end - lon_start).to_radians();
    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Bounding box covering a radius (in km) around a lat/lon coordinate.
///
/// Near the poles or across the antimeridian the longitude delta is
/// undefined, so the box degrades to the full longitude band there.
pub fn bounds_from_radius(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    const MIN_LAT: f64 = -PI / 2.0;
    const MAX_LAT: f64 = PI / 2.0;
    const MIN_LON: f64 = -PI;
    const MAX_LON: f64 = PI;

    let r = radius_km / EARTH_RADIUS_KM;
    let rad_lat = lat.to_radians();
    let rad_lon = lon.to_radians();

    let mut lat_min = rad_lat - r;
    let mut lat_max = rad_lat + r;
    let lon_min;
    let lon_max;

    if lat_min > MIN_LAT && lat_max < MAX_LAT {
        let delta_lon = (r.sin() / rad_lat.cos()).asin();
        let mut west = rad_lon - delta_lon;
        if west < MIN_LON {
            west += 2.0 * PI;
        }
        let mut east = rad_lon + delta_lon;
        if east > MAX_LON {
            east -= 2.0 * PI;
        }
        lon_min = west;
        lon_max = east;
    } else {
        // A pole is inside the radius: clamp latitude and span all
        // longitudes.
        lat_min = lat_min.max(MIN_LAT);
        lat_max = lat_max.min(MAX_LAT);
        lon_min = MIN_LON;
        lon_max = MAX_LON;
    }

    BoundingBox {
        lon_min: lon_min.to_degrees(),
        lat_min: lat_min.to_degrees(),
        lon_max: lon_max.to_degrees(),
        lat_max: lat_max.to_degrees(),
    }
}

/// Bounds of a set of point coordinates, suitable for setting map extents.
///
/// Ensures a minimum box size (so a single point still shows some
/// surrounding area) and insets the box outward so the outermost points
/// are not flush with the border. Returns `None` when no usable
/// coordinates were supplied.
pub fn feature_bounds<I>(points: I, bbox_min_size: f64, bbox_inset: f64) -> Option<BoundingBox>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut lon_min = 180.0_f64;
    let mut lat_min = 90.0_f64;
    let mut lon_max = -180.0_f64;
    let mut lat_max = -90.0_f64;
    let mut any = false;

    for (lat, lon) in points {
        if !lat.is_finite() || !lon.is_finite() {
            continue;
        }
        any = true;
        lon_min = lon_min.min(lon);
        lat_min = lat_min.min(lat);
        lon_max = lon_max.max(lon);
        lat_max = lat_max.max(lat);
    }
    if !any {
        return None;
    }

    let delta_lon = (bbox_min_size - (lon_max - lon_min)) / 2.0;
    if delta_lon > 0.0 {
        lon_min -= delta_lon;
        lon_max += delta_lon;
    }
    let delta_lat = (bbox_min_size - (lat_max - lat_min)) / 2.0;
    if delta_lat > 0.0 {
        lat_min -= delta_lat;
        lat_max += delta_lat;
    }

    Some(BoundingBox {
        lon_min: lon_min - bbox_inset,
        lat_min: lat_min - bbox_inset,
        lon_max: lon_max + bbox_inset,
        lat_max: lat_max + bbox_inset,
    })
}
