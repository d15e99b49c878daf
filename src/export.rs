//! Text serializations: WKT, compact GeoJSON, and OSM `.poly` boundary
//! files.

use crate::error::{GazetteerError, Result};
use crate::node::GeometryKind;
use geo::Geometry;
use wkt::ToWkt;

/// Serialize a geometry as WKT.
pub fn to_wkt_string(geom: &Geometry<f64>) -> String {
    geom.wkt_string()
}

/// Serialize a geometry as GeoJSON text with compact separators.
pub fn to_geojson_string(geom: &Geometry<f64>) -> String {
    let value = geojson::Value::from(geom);
    geojson::GeoJson::Geometry(geojson::Geometry::new(value)).to_string()
}

/// Serialize a polygon or multipolygon as an OSM `.poly` boundary file.
///
/// One named header line, then per ring: an index line, one `lon lat`
/// pair per line (tab-indented), and an `END` terminator; a final `END`
/// closes the file. Interior rings are not emitted. Used by
/// Osmosis-style extract tooling.
pub fn to_poly(name: &str, geom: &Geometry<f64>) -> Result<String> {
    let polygons: Vec<&geo::Polygon<f64>> = match geom {
        Geometry::Polygon(polygon) => vec![polygon],
        Geometry::MultiPolygon(mp) => mp.0.iter().collect(),
        other => {
            return Err(GazetteerError::UnsupportedGeometry(
                GeometryKind::from_geometry(other).to_string(),
            ));
        }
    };

    let mut out = String::new();
    out.push_str(name);
    out.push('\n');
    for (index, polygon) in polygons.iter().enumerate() {
        out.push_str(&format!("{}\n", index + 1));
        for coord in polygon.exterior().coords() {
            out.push_str(&format!("\t{}\t{}\n", coord.x, coord.y));
        }
        out.push_str("END\n");
    }
    out.push_str("END\n");
    Ok(out)
}
