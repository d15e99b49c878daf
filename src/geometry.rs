//! Geometry parsing and metadata computation.
//!
//! Accepts WKT or GeoJSON text, classifies the shape, and derives the
//! centroid, canonical WKT and bounding box that the tree engine writes
//! back onto location nodes.

use crate::error::{GazetteerError, Result};
use crate::node::{BoundingBox, GeometryKind};
use crate::spatial::bounds_from_radius;
use geo::{Centroid, Geometry};
use std::str::FromStr;
use wkt::ToWkt;

/// WKT for a point at the given coordinates.
///
/// ```rust
/// assert_eq!(gazetteer::geometry::point_wkt(6.0, 80.0), "POINT (80 6)");
/// ```
pub fn point_wkt(lat: f64, lon: f64) -> String {
    format!("POINT ({lon} {lat})")
}

/// Parse geometry text, WKT or GeoJSON.
///
/// Text whose first non-blank character is `{` is treated as GeoJSON,
/// anything else as WKT. Malformed input yields a typed
/// [`InvalidGeometry`](GazetteerError::InvalidGeometry) error naming the
/// offending text.
pub fn parse_geometry(text: &str) -> Result<Geometry<f64>> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        parse_geojson(trimmed)
    } else {
        parse_wkt(trimmed)
    }
}

/// Parse a WKT string to a geo-types geometry.
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>> {
    wkt::Wkt::from_str(text)
        .map_err(|e| GazetteerError::invalid_geometry(text, format!("{e:?}")))
        .and_then(|w| {
            w.try_into().map_err(|e: wkt::conversion::Error| {
                GazetteerError::invalid_geometry(text, format!("{e:?}"))
            })
        })
}

/// Parse a GeoJSON geometry (or single feature) to a geo-types geometry.
pub fn parse_geojson(text: &str) -> Result<Geometry<f64>> {
    let gj: geojson::GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| GazetteerError::invalid_geometry(text, e.to_string()))?;
    let geometry = match gj {
        geojson::GeoJson::Geometry(g) => g,
        geojson::GeoJson::Feature(f) => f
            .geometry
            .ok_or_else(|| GazetteerError::invalid_geometry(text, "feature has no geometry"))?,
        geojson::GeoJson::FeatureCollection(_) => {
            return Err(GazetteerError::invalid_geometry(
                text,
                "expected a single geometry, got a feature collection",
            ));
        }
    };
    Geometry::<f64>::try_from(geometry)
        .map_err(|e| GazetteerError::invalid_geometry(text, e.to_string()))
}

/// Retry an unparsable `POLYGON` as a `LINESTRING`.
///
/// OSM imports of unclosed ways sometimes arrive as malformed POLYGON
/// text; reading the coordinate list as a line salvages the geometry.
fn reparse_unclosed_polygon(text: &str) -> Option<Geometry<f64>> {
    let mut inner = text.trim().strip_prefix("POLYGON")?.trim();
    while inner.starts_with('(') && inner.ends_with(')') {
        inner = inner[1..inner.len() - 1].trim();
    }
    parse_wkt(&format!("LINESTRING ({inner})")).ok()
}

/// Whether geometry text denotes a bare point. Unparsable text is not a
/// point; the caller finds out why when it resolves the geometry.
pub(crate) fn is_point_text(text: &str) -> bool {
    matches!(parse_geometry(text), Ok(Geometry::Point(_)))
}

/// Centroid (as `lat`, `lon`) and bounding extent of a parsed geometry.
///
/// `None` for empty geometry (an empty collection has no centroid).
pub fn centroid_and_bounds(geom: &Geometry<f64>) -> Option<(f64, f64, BoundingBox)> {
    let centroid = geom.centroid()?;
    let bounds = BoundingBox::from_geometry(geom)?;
    Some((centroid.y(), centroid.x(), bounds))
}

/// Canonical geometry fields derived for one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedGeometry {
    pub wkt: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub kind: Option<GeometryKind>,
    pub bounds: Option<BoundingBox>,
}

/// Derive canonical WKT, centroid and bounds from a node's own geometry.
///
/// - Non-point `wkt` text: validate it, take the shape's centroid as the
///   working coordinate and its extent as the bounds.
/// - Point geometry (a `POINT` text, or bare `lat`/`lon`): the working
///   coordinates are authoritative when present, so a coordinate edit is
///   not undone by previously generated point text; the WKT is
///   regenerated from them. A declared radius widens the bounds, and
///   pre-existing wider bounds that still cover the point are kept
///   (countries are often stored as points with their real extent
///   attached).
/// - With neither: every field stays `None`; the caller decides whether
///   that means inheritance or simply no geometry.
pub fn resolve_geometry(
    wkt: Option<&str>,
    lat: Option<f64>,
    lon: Option<f64>,
    radius_km: Option<f64>,
    existing_bounds: Option<BoundingBox>,
) -> Result<ResolvedGeometry> {
    if let Some(text) = wkt {
        let geom = match parse_geometry(text) {
            Ok(geom) => geom,
            Err(err) => match reparse_unclosed_polygon(text) {
                Some(geom) => {
                    log::warn!("unclosed POLYGON read as LINESTRING: {text}");
                    geom
                }
                None => return Err(err),
            },
        };
        let kind = GeometryKind::from_geometry(&geom);
        let (centroid_lat, centroid_lon, extent) = centroid_and_bounds(&geom)
            .ok_or_else(|| {
                GazetteerError::invalid_geometry(text, "unable to compute centroid")
            })?;

        if !kind.is_point() {
            return Ok(ResolvedGeometry {
                wkt: Some(geom.wkt_string()),
                lat: Some(centroid_lat),
                lon: Some(centroid_lon),
                kind: Some(kind),
                bounds: Some(extent),
            });
        }
        let (lat, lon) = match (lat, lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => (centroid_lat, centroid_lon),
        };
        Ok(point_geometry(lat, lon, radius_km, existing_bounds))
    } else if let (Some(lat), Some(lon)) = (lat, lon) {
        Ok(point_geometry(lat, lon, radius_km, existing_bounds))
    } else {
        // No geometry available; nothing to derive.
        Ok(ResolvedGeometry::default())
    }
}

fn point_geometry(
    lat: f64,
    lon: f64,
    radius_km: Option<f64>,
    existing_bounds: Option<BoundingBox>,
) -> ResolvedGeometry {
    let bounds = match radius_km {
        Some(radius) => bounds_from_radius(lat, lon, radius),
        None => match existing_bounds {
            Some(bounds) if !bounds.is_degenerate() && bounds.contains_point(lat, lon) => {
                bounds
            }
            _ => BoundingBox::from_point(lat, lon),
        },
    };
    ResolvedGeometry {
        wkt: Some(point_wkt(lat, lon)),
        lat: Some(lat),
        lon: Some(lon),
        kind: Some(GeometryKind::Point),
        bounds: Some(bounds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wkt_polygon() {
        let geom = parse_geometry("POLYGON ((0 0, 10 0, 10 20, 0 20, 0 0))").unwrap();
        assert!(matches!(geom, Geometry::Polygon(_)));
        assert_eq!(GeometryKind::from_geometry(&geom), GeometryKind::Polygon);
    }

    #[test]
    fn test_parse_wkt_invalid() {
        let err = parse_geometry("POLYGON ((0 0, banana))").unwrap_err();
        assert!(matches!(err, GazetteerError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_parse_geojson_geometry() {
        let geom = parse_geometry(r#"{"type":"Point","coordinates":[80.0,6.0]}"#).unwrap();
        match geom {
            Geometry::Point(p) => {
                assert_eq!(p.x(), 80.0);
                assert_eq!(p.y(), 6.0);
            }
            other => panic!("expected point, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_geojson_feature_collection_rejected() {
        let text = r#"{"type":"FeatureCollection","features":[]}"#;
        assert!(parse_geometry(text).is_err());
    }

    #[test]
    fn test_point_wkt_roundtrip() {
        let wkt = point_wkt(6.0, 80.0);
        assert_eq!(wkt, "POINT (80 6)");
        let geom = parse_geometry(&wkt).unwrap();
        assert!(matches!(geom, Geometry::Point(_)));
    }

    #[test]
    fn test_resolve_geometry_from_latlon() {
        let resolved = resolve_geometry(None, Some(6.0), Some(80.0), None, None).unwrap();
        assert_eq!(resolved.wkt.as_deref(), Some("POINT (80 6)"));
        assert_eq!(resolved.kind, Some(GeometryKind::Point));
        let bounds = resolved.bounds.unwrap();
        assert!(bounds.is_degenerate());
        assert!(bounds.contains_point(6.0, 80.0));
    }

    #[test]
    fn test_resolve_geometry_point_with_radius_widens_bounds() {
        let resolved =
            resolve_geometry(None, Some(6.0), Some(80.0), Some(25.0), None).unwrap();
        let bounds = resolved.bounds.unwrap();
        assert!(!bounds.is_degenerate());
        assert!(bounds.lat_max > 6.0 && bounds.lat_min < 6.0);
    }

    #[test]
    fn test_resolve_geometry_polygon_centroid_and_bounds() {
        let resolved = resolve_geometry(
            Some("POLYGON ((0 0, 4 0, 4 2, 0 2, 0 0))"),
            None,
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(resolved.kind, Some(GeometryKind::Polygon));
        assert!((resolved.lat.unwrap() - 1.0).abs() < 1e-9);
        assert!((resolved.lon.unwrap() - 2.0).abs() < 1e-9);
        let bounds = resolved.bounds.unwrap();
        assert_eq!(bounds.lon_min, 0.0);
        assert_eq!(bounds.lon_max, 4.0);
        assert_eq!(bounds.lat_max, 2.0);
    }

    #[test]
    fn test_resolve_geometry_latlon_wins_over_stale_point_wkt() {
        // A coordinate edit must not be undone by the previously
        // generated point text.
        let resolved = resolve_geometry(
            Some("POINT (80 6)"),
            Some(10.0),
            Some(81.0),
            None,
            Some(BoundingBox::from_point(6.0, 80.0)),
        )
        .unwrap();
        assert_eq!(resolved.wkt.as_deref(), Some("POINT (81 10)"));
        assert_eq!(resolved.lat, Some(10.0));
        let bounds = resolved.bounds.unwrap();
        assert!(bounds.contains_point(10.0, 81.0));
        assert!(!bounds.contains_point(6.0, 80.0));
    }

    #[test]
    fn test_resolve_geometry_discards_stale_bounds_missing_the_point() {
        // Wider bounds survive only while they still cover the point.
        let elsewhere = BoundingBox::new(10.0, 40.0, 12.0, 42.0).unwrap();
        let resolved =
            resolve_geometry(None, Some(6.0), Some(80.0), None, Some(elsewhere)).unwrap();
        let bounds = resolved.bounds.unwrap();
        assert!(bounds.is_degenerate());
        assert!(bounds.contains_point(6.0, 80.0));
    }

    #[test]
    fn test_resolve_geometry_point_keeps_wider_bounds() {
        let country_extent = BoundingBox::new(79.5, 5.9, 81.9, 9.8).unwrap();
        let resolved = resolve_geometry(
            Some("POINT (80.7 7.8)"),
            None,
            None,
            None,
            Some(country_extent),
        )
        .unwrap();
        assert_eq!(resolved.bounds, Some(country_extent));
        assert_eq!(resolved.wkt.as_deref(), Some("POINT (80.7 7.8)"));
    }

    #[test]
    fn test_resolve_geometry_malformed_polygon_becomes_linestring() {
        // Single-paren ring, as produced by some OSM way exports.
        let resolved = resolve_geometry(
            Some("POLYGON (0 0, 1 0, 1 1)"),
            None,
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(resolved.kind, Some(GeometryKind::LineString));
    }

    #[test]
    fn test_centroid_and_bounds() {
        let geom = parse_geometry("LINESTRING (0 0, 4 0)").unwrap();
        let (lat, lon, bounds) = centroid_and_bounds(&geom).unwrap();
        assert_eq!(lat, 0.0);
        assert_eq!(lon, 2.0);
        assert_eq!(bounds.lon_max, 4.0);

        let empty = Geometry::GeometryCollection(geo::GeometryCollection::default());
        assert!(centroid_and_bounds(&empty).is_none());
    }

    #[test]
    fn test_resolve_geometry_without_inputs_is_empty() {
        let resolved = resolve_geometry(None, None, None, None, None).unwrap();
        assert_eq!(resolved, ResolvedGeometry::default());
    }

    #[test]
    fn test_resolve_geometry_lat_without_lon_is_empty() {
        let resolved = resolve_geometry(None, Some(6.0), None, None, None).unwrap();
        assert!(resolved.wkt.is_none());
    }
}
