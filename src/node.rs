//! Core data model: location identifiers, hierarchy levels, geometry
//! metadata and the location node itself.

use crate::error::{GazetteerError, Result};
use geo::Geometry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator used in materialized paths.
pub const PATH_SEPARATOR: char = '/';

/// Identifier of a location node.
///
/// Ids are immutable once created and must not contain the path separator,
/// since materialized paths are slash-joined id chains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    /// Parses and validates a string as a location id.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(GazetteerError::InvalidInput(
                "location id cannot be empty".into(),
            ));
        }
        if id.contains(PATH_SEPARATOR) {
            return Err(GazetteerError::InvalidInput(format!(
                "location id '{}' cannot contain '{}'",
                id, PATH_SEPARATOR
            )));
        }
        if id.contains('\0') {
            return Err(GazetteerError::InvalidInput(
                "location id cannot contain null bytes".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns a reference to the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocationId {
    type Err = GazetteerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<LocationId> for String {
    fn from(id: LocationId) -> Self {
        id.0
    }
}

/// Administrative hierarchy level, `L0` (country) down to `L5`.
///
/// A location with no level is a freeform location outside the
/// administrative hierarchy (an office, a camp, an incident site).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Level {
    L0,
    L1,
    L2,
    L3,
    L4,
    L5,
}

/// Number of hierarchy levels.
pub const LEVEL_COUNT: usize = 6;

impl Level {
    /// All levels, root level first.
    pub const ALL: [Level; LEVEL_COUNT] =
        [Level::L0, Level::L1, Level::L2, Level::L3, Level::L4, Level::L5];

    /// Zero-based index of this level (`L0` is 0).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Level for a zero-based index, `None` when out of range.
    pub fn from_index(index: usize) -> Option<Level> {
        Level::ALL.get(index).copied()
    }

    /// The level directly above this one, `None` for `L0`.
    pub fn parent_level(self) -> Option<Level> {
        match self.index() {
            0 => None,
            i => Level::from_index(i - 1),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.index())
    }
}

impl FromStr for Level {
    type Err = GazetteerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "L0" => Ok(Level::L0),
            "L1" => Ok(Level::L1),
            "L2" => Ok(Level::L2),
            "L3" => Ok(Level::L3),
            "L4" => Ok(Level::L4),
            "L5" => Ok(Level::L5),
            other => Err(GazetteerError::InvalidInput(format!(
                "unknown hierarchy level: {other}"
            ))),
        }
    }
}

/// Denormalized ancestor names, one slot per hierarchy level.
///
/// Stored redundantly on every node so display code never has to walk
/// parent pointers. A node's own level slot holds its own name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelNames([Option<String>; LEVEL_COUNT]);

impl LevelNames {
    /// Name stored for a level, if any.
    pub fn get(&self, level: Level) -> Option<&str> {
        self.0[level.index()].as_deref()
    }

    /// Store a name for a level.
    pub fn set(&mut self, level: Level, name: impl Into<String>) {
        self.0[level.index()] = Some(name.into());
    }

    /// Clear a level's slot.
    pub fn clear(&mut self, level: Level) {
        self.0[level.index()] = None;
    }

    /// Iterate `(level, name)` pairs for populated slots.
    pub fn iter(&self) -> impl Iterator<Item = (Level, &str)> {
        Level::ALL
            .iter()
            .filter_map(|&level| self.get(level).map(|name| (level, name)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// Geometry shape kind, mirroring the WKT/GeoJSON taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryKind {
    /// Classify a geo-types geometry.
    pub fn from_geometry(geom: &Geometry<f64>) -> Self {
        match geom {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryKind::Polygon
            }
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }

    pub fn is_point(self) -> bool {
        matches!(self, GeometryKind::Point)
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiPolygon => "MultiPolygon",
            GeometryKind::GeometryCollection => "GeometryCollection",
        };
        write!(f, "{name}")
    }
}

/// Axis-aligned bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Result<Self> {
        if lon_min > lon_max {
            return Err(GazetteerError::InvalidInput(format!(
                "lon_min ({lon_min}) must be <= lon_max ({lon_max})"
            )));
        }
        if lat_min > lat_max {
            return Err(GazetteerError::InvalidInput(format!(
                "lat_min ({lat_min}) must be <= lat_max ({lat_max})"
            )));
        }
        Ok(Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        })
    }

    /// Zero-area box of a single point.
    pub fn from_point(lat: f64, lon: f64) -> Self {
        Self {
            lon_min: lon,
            lat_min: lat,
            lon_max: lon,
            lat_max: lat,
        }
    }

    /// Bounding extent of a geometry, `None` for empty collections.
    pub fn from_geometry(geom: &Geometry<f64>) -> Option<Self> {
        use geo::BoundingRect;
        let rect = geom.bounding_rect()?;
        Some(Self {
            lon_min: rect.min().x,
            lat_min: rect.min().y,
            lon_max: rect.max().x,
            lat_max: rect.max().y,
        })
    }

    /// Interval-overlap test on all four bounds.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.lat_min <= other.lat_max
            && self.lat_max >= other.lat_min
            && self.lon_min <= other.lon_max
            && self.lon_max >= other.lon_min
    }

    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }

    /// True for a degenerate box with no extent.
    pub fn is_degenerate(&self) -> bool {
        self.lon_min == self.lon_max && self.lat_min == self.lat_max
    }

    /// WKT polygon covering the box, corners in counterclockwise order.
    pub fn to_polygon_wkt(&self) -> String {
        format!(
            "POLYGON (({lon_min} {lat_min}, {lon_max} {lat_min}, {lon_max} {lat_max}, {lon_min} {lat_max}, {lon_min} {lat_min}))",
            lon_min = self.lon_min,
            lat_min = self.lat_min,
            lon_max = self.lon_max,
            lat_max = self.lat_max,
        )
    }
}

/// A node in the location tree.
///
/// Nodes start "unresolved" (no `path`); the maintenance engine computes
/// `path`, `lx`, coordinates, bounds and geometry kind, and keeps them
/// consistent across edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationNode {
    pub id: LocationId,
    pub name: String,
    /// Hierarchy level; `None` for freeform locations.
    pub level: Option<Level>,
    pub parent: Option<LocationId>,
    /// Materialized ancestor chain, slash-separated ids from root to self.
    pub path: Option<String>,
    /// Denormalized ancestor names per level.
    pub lx: LevelNames,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// True when `lat`/`lon` were copied from an ancestor.
    pub inherited: bool,
    /// Own geometry as WKT; `None` for inheriting nodes.
    pub wkt: Option<String>,
    /// Declared radius in km, widening a point's bounds.
    pub radius_km: Option<f64>,
    pub bounds: Option<BoundingBox>,
    pub kind: Option<GeometryKind>,
}

impl LocationNode {
    /// Create an unresolved node with just an id and a display name.
    pub fn new(id: LocationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            level: None,
            parent: None,
            path: None,
            lx: LevelNames::default(),
            lat: None,
            lon: None,
            inherited: false,
            wkt: None,
            radius_km: None,
            bounds: None,
            kind: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_parent(mut self, parent: LocationId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_latlon(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    pub fn with_wkt(mut self, wkt: impl Into<String>) -> Self {
        self.wkt = Some(wkt.into());
        self
    }

    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }

    /// Ids along the materialized path, root first, self last.
    pub fn path_ids(&self) -> Vec<&str> {
        match &self.path {
            Some(path) => path.split(PATH_SEPARATOR).collect(),
            None => Vec::new(),
        }
    }

    /// True when both working coordinates are present.
    pub fn has_latlon(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }
}

/// Explicit write-set for a node's mutable, engine-maintained fields.
///
/// Every field the maintenance pass may correct is enumerated here;
/// `None` means "leave untouched". Nullable node fields use a nested
/// `Option` so the engine can clear them explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationPatch {
    pub path: Option<String>,
    pub lx: Option<LevelNames>,
    pub lat: Option<Option<f64>>,
    pub lon: Option<Option<f64>>,
    pub wkt: Option<Option<String>>,
    pub inherited: Option<bool>,
    pub bounds: Option<Option<BoundingBox>>,
    pub kind: Option<Option<GeometryKind>>,
}

impl LocationPatch {
    pub fn is_empty(&self) -> bool {
        *self == LocationPatch::default()
    }

    /// Apply this patch to a node in place.
    pub fn apply(&self, node: &mut LocationNode) {
        if let Some(path) = &self.path {
            node.path = Some(path.clone());
        }
        if let Some(lx) = &self.lx {
            node.lx = lx.clone();
        }
        if let Some(lat) = self.lat {
            node.lat = lat;
        }
        if let Some(lon) = self.lon {
            node.lon = lon;
        }
        if let Some(wkt) = &self.wkt {
            node.wkt = wkt.clone();
        }
        if let Some(inherited) = self.inherited {
            node.inherited = inherited;
        }
        if let Some(bounds) = self.bounds {
            node.bounds = bounds;
        }
        if let Some(kind) = self.kind {
            node.kind = kind;
        }
    }
}
