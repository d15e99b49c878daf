//! Polygon and line simplification.
//!
//! Douglas–Peucker-class vertex reduction followed by fixed-precision
//! coordinate rounding, serialized back to WKT or compact GeoJSON.
//! Heavy boundaries (national coastlines routinely carry tens of
//! thousands of vertices) are shrunk like this before being shipped to
//! map clients.

use crate::error::Result;
use crate::export::{to_geojson_string, to_wkt_string};
use crate::geometry::parse_geometry;
use crate::node::GeometryKind;
use geo::{Geometry, MapCoords, Simplify, SimplifyVwPreserve, coord};
use serde::{Deserialize, Serialize};

/// Serialization format for simplified geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryFormat {
    #[default]
    Wkt,
    GeoJson,
}

/// Options controlling a simplification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifyOptions {
    /// Reduction tolerance; 0 keeps every vertex.
    pub tolerance: f64,
    /// Guarantee no self-intersections are introduced. Disable for a
    /// faster plain Douglas–Peucker pass.
    pub preserve_topology: bool,
    /// Decimal digits kept per coordinate.
    pub precision: usize,
    pub format: GeometryFormat,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            preserve_topology: true,
            precision: 6,
            format: GeometryFormat::Wkt,
        }
    }
}

impl SimplifyOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_preserve_topology(mut self, preserve: bool) -> Self {
        self.preserve_topology = preserve;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_format(mut self, format: GeometryFormat) -> Self {
        self.format = format;
        self
    }
}

/// Simplify a geometry given as WKT or GeoJSON text.
///
/// Vertex reduction applies to lines and polygons (multi-variants per
/// member); rounding applies to points as well. Kinds the pass does not
/// handle are serialized unchanged with a logged note.
pub fn simplify(text: &str, options: &SimplifyOptions) -> Result<String> {
    let mut geom = parse_geometry(text)?;

    if options.tolerance > 0.0 {
        geom = reduce(geom, options.tolerance, options.preserve_topology);
    }
    let geom = round_coordinates(geom, options.precision);

    Ok(match options.format {
        GeometryFormat::Wkt => to_wkt_string(&geom),
        GeometryFormat::GeoJson => to_geojson_string(&geom),
    })
}

/// Vertex reduction for the kinds that support it.
fn reduce(geom: Geometry<f64>, tolerance: f64, preserve_topology: bool) -> Geometry<f64> {
    if preserve_topology {
        match geom {
            Geometry::LineString(ls) => ls.simplify_vw_preserve(tolerance).into(),
            Geometry::MultiLineString(mls) => mls.simplify_vw_preserve(tolerance).into(),
            Geometry::Polygon(poly) => poly.simplify_vw_preserve(tolerance).into(),
            Geometry::MultiPolygon(mp) => mp.simplify_vw_preserve(tolerance).into(),
            other => other,
        }
    } else {
        match geom {
            Geometry::LineString(ls) => ls.simplify(tolerance).into(),
            Geometry::MultiLineString(mls) => mls.simplify(tolerance).into(),
            Geometry::Polygon(poly) => poly.simplify(tolerance).into(),
            Geometry::MultiPolygon(mp) => mp.simplify(tolerance).into(),
            other => other,
        }
    }
}

/// Round every coordinate to the given number of decimal digits.
fn round_coordinates(geom: Geometry<f64>, precision: usize) -> Geometry<f64> {
    let round = |v: f64| format!("{v:.precision$}").parse().unwrap_or(v);
    match geom {
        Geometry::Point(p) => p.map_coords(|c| coord! { x: round(c.x), y: round(c.y) }).into(),
        Geometry::LineString(ls) => {
            ls.map_coords(|c| coord! { x: round(c.x), y: round(c.y) }).into()
        }
        Geometry::MultiLineString(mls) => {
            mls.map_coords(|c| coord! { x: round(c.x), y: round(c.y) }).into()
        }
        Geometry::Polygon(poly) => {
            poly.map_coords(|c| coord! { x: round(c.x), y: round(c.y) }).into()
        }
        Geometry::MultiPolygon(mp) => {
            mp.map_coords(|c| coord! { x: round(c.x), y: round(c.y) }).into()
        }
        other => {
            log::info!(
                "not rounding coordinates of geometry kind {}",
                GeometryKind::from_geometry(&other)
            );
            other
        }
    }
}
