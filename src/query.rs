//! Read-only query primitives over the maintained tree.
//!
//! Descendant/ancestor lookups ride on the materialized path; spatial
//! lookups pre-filter on stored bounds and refine with exact geometry
//! tests through the configured [`SpatialBackend`].

use crate::error::{GazetteerError, Result};
use crate::geometry::parse_geometry;
use crate::node::{BoundingBox, Level, LocationId, LocationNode, PATH_SEPARATOR};
use crate::simplify::SimplifyOptions;
use crate::spatial::{bounds_from_radius, feature_bounds, great_circle_distance_km, DistanceFormula};
use crate::store::LocationStore;
use crate::tree::{Gazetteer, TreeIssue};
use geo::Geometry;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

/// Strategy interface for exact geometry work.
///
/// The pure in-process implementation ([`LocalBackend`]) is always
/// available and is what tests run against. A deployment with a spatial
/// database can supply a delegating implementation instead; both must
/// produce equivalent sets of matching ids. The backend is selected
/// when the [`Gazetteer`] is built, never at a call site.
pub trait SpatialBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Exact intersection test.
    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool;

    /// Simplify-and-serialize.
    fn simplify(&self, text: &str, options: &SimplifyOptions) -> Result<String>;
}

/// Pure in-process spatial backend built on the geo crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl SpatialBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
        use geo::Intersects;
        a.intersects(b)
    }

    fn simplify(&self, text: &str, options: &SimplifyOptions) -> Result<String> {
        crate::simplify::simplify(text, options)
    }
}

/// Lazy one-pass refinement of a bbox pre-filter by exact intersection.
///
/// Streams the candidate list once; not restartable.
pub struct ShapeQuery<'a> {
    candidates: std::vec::IntoIter<LocationNode>,
    shape: Geometry<f64>,
    backend: &'a dyn SpatialBackend,
}

impl Iterator for ShapeQuery<'_> {
    type Item = LocationNode;

    fn next(&mut self) -> Option<Self::Item> {
        for candidate in self.candidates.by_ref() {
            let Some(wkt) = candidate.wkt.as_deref() else {
                continue;
            };
            match parse_geometry(wkt) {
                Ok(geom) => {
                    if self.backend.intersects(&geom, &self.shape) {
                        return Some(candidate);
                    }
                }
                Err(err) => {
                    log::error!("error reading wkt of location {}: {err}", candidate.id);
                }
            }
        }
        None
    }
}

/// Lazy great-circle refinement of a radius pre-filter.
///
/// Yields `(node, distance_km)` pairs in store order.
pub struct RadiusQuery {
    candidates: std::vec::IntoIter<LocationNode>,
    lat: f64,
    lon: f64,
    radius_km: f64,
    formula: DistanceFormula,
}

impl Iterator for RadiusQuery {
    type Item = (LocationNode, f64);

    fn next(&mut self) -> Option<Self::Item> {
        for candidate in self.candidates.by_ref() {
            let (Some(lat), Some(lon)) = (candidate.lat, candidate.lon) else {
                continue;
            };
            let distance = great_circle_distance_km(self.lat, self.lon, lat, lon, self.formula);
            if distance < self.radius_km {
                return Some((candidate, distance));
            }
        }
        None
    }
}

impl<S: LocationStore> Gazetteer<S> {
    /// Ids of all proper descendants of a node, optionally filtered to
    /// one hierarchy level.
    ///
    /// Resolved trees answer this with a single materialized-path prefix
    /// match; unresolved nodes fall back to a segment scan.
    pub fn children(
        &self,
        id: &LocationId,
        level: Option<Level>,
    ) -> Result<FxHashSet<LocationId>> {
        let node = self
            .store
            .get(id)?
            .ok_or_else(|| GazetteerError::MissingLocation(id.to_string()))?;

        let level_matches =
            |candidate: &LocationNode| level.is_none_or(|l| candidate.level == Some(l));

        let mut out = FxHashSet::default();
        match &node.path {
            Some(path) => {
                let prefix = format!("{path}{PATH_SEPARATOR}");
                for candidate in self.store.find_by_path_prefix(&prefix)? {
                    if level_matches(&candidate) {
                        out.insert(candidate.id);
                    }
                }
            }
            None => {
                let head = format!("{id}{PATH_SEPARATOR}");
                let infix = format!("{PATH_SEPARATOR}{id}{PATH_SEPARATOR}");
                for candidate in self.store.iter()? {
                    let Some(path) = candidate.path.as_deref() else {
                        continue;
                    };
                    if (path.starts_with(&head) || path.contains(&infix))
                        && level_matches(&candidate)
                    {
                        out.insert(candidate.id);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Ancestor ids of a node, nearest first, excluding the node itself.
    ///
    /// Derived by splitting the materialized path; an unresolved node
    /// falls back to its immediate parent pointer.
    pub fn ancestors(&self, id: &LocationId) -> Result<Vec<LocationId>> {
        let node = self
            .store
            .get(id)?
            .ok_or_else(|| GazetteerError::MissingLocation(id.to_string()))?;

        match &node.path {
            Some(path) => {
                let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
                let mut ids = Vec::with_capacity(segments.len().saturating_sub(1));
                for segment in &segments[..segments.len().saturating_sub(1)] {
                    ids.push(LocationId::new(*segment)?);
                }
                ids.reverse();
                Ok(ids)
            }
            None => Ok(node.parent.into_iter().collect()),
        }
    }

    /// Ancestor nodes, nearest first.
    pub fn ancestor_nodes(&self, id: &LocationId) -> Result<Vec<LocationNode>> {
        let ids = self.ancestors(id)?;
        self.store.get_many(&ids)
    }

    /// Ancestor id per hierarchy level.
    ///
    /// Loose hierarchies look up each ancestor's own stored level.
    /// Strict hierarchies can also derive levels from path position;
    /// when the two derivations disagree the lookup result is returned
    /// and a [`TreeIssue::HierarchyMismatch`] is surfaced instead of
    /// silently picking a winner.
    pub fn ancestors_per_level(
        &self,
        id: &LocationId,
    ) -> Result<(BTreeMap<Level, LocationId>, Vec<TreeIssue>)> {
        let node = self
            .store
            .get(id)?
            .ok_or_else(|| GazetteerError::MissingLocation(id.to_string()))?;

        let ancestor_ids = self.ancestors(id)?;
        let ancestor_nodes = self.store.get_many(&ancestor_ids)?;

        let mut by_lookup = BTreeMap::new();
        for ancestor in &ancestor_nodes {
            if let Some(level) = ancestor.level
                && self.hierarchy.contains(level)
            {
                by_lookup.insert(level, ancestor.id.clone());
            }
        }

        let mut issues = Vec::new();
        if self.hierarchy.strict()
            && let Some(path) = &node.path
        {
            let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
            let mut by_position = BTreeMap::new();
            for (index, segment) in segments[..segments.len().saturating_sub(1)]
                .iter()
                .enumerate()
            {
                if let Some(level) = Level::from_index(index) {
                    by_position.insert(level, LocationId::new(*segment)?);
                }
            }
            if by_position != by_lookup {
                log::warn!(
                    "ancestor levels of {id} disagree between path position and stored levels"
                );
                issues.push(TreeIssue::HierarchyMismatch { node: id.clone() });
            }
        }

        Ok((by_lookup, issues))
    }

    /// Ids of all nodes whose stored bounds overlap the query box.
    ///
    /// A necessary-but-not-sufficient pre-filter; exact refinement is
    /// [`shape_query`](Self::shape_query).
    pub fn bbox_query(&self, bbox: &BoundingBox) -> Result<FxHashSet<LocationId>> {
        Ok(self
            .store
            .bbox_candidates(bbox)?
            .into_iter()
            .map(|node| node.id)
            .collect())
    }

    /// Nodes whose geometry intersects the given shape, as a lazy
    /// one-pass iterator streaming from the bbox pre-filter.
    pub fn shape_query(&self, shape: &Geometry<f64>) -> Result<ShapeQuery<'_>> {
        let bbox = BoundingBox::from_geometry(shape).ok_or_else(|| {
            GazetteerError::InvalidInput("query shape has no extent".into())
        })?;
        let candidates = self.store.bbox_candidates(&bbox)?;
        Ok(ShapeQuery {
            candidates: candidates.into_iter(),
            shape: shape.clone(),
            backend: self.backend.as_ref(),
        })
    }

    /// Nodes whose geometry covers the given coordinate.
    pub fn locations_at(&self, lat: f64, lon: f64) -> Result<Vec<LocationNode>> {
        let point = Geometry::Point(geo::Point::new(lon, lat));
        Ok(self.shape_query(&point)?.collect())
    }

    /// Same-level nodes whose geometry touches the node's own geometry.
    ///
    /// A freeform node borrows its parent's level and geometry. Returns
    /// `None` when there is no usable level or geometry to compare.
    pub fn neighbours(&self, id: &LocationId) -> Result<Option<FxHashSet<LocationId>>> {
        let mut node = self
            .store
            .get(id)?
            .ok_or_else(|| GazetteerError::MissingLocation(id.to_string()))?;

        if node.level.is_none() {
            let Some(parent_id) = node.parent.clone() else {
                return Ok(None);
            };
            match self.store.get(&parent_id)? {
                Some(parent) => node = parent,
                None => return Ok(None),
            }
        }
        let level = node.level;
        let Some(wkt) = node.wkt.as_deref() else {
            return Ok(None);
        };
        let geom = match parse_geometry(wkt) {
            Ok(geom) => geom,
            Err(err) => {
                log::error!("error reading wkt of location {}: {err}", node.id);
                return Ok(None);
            }
        };
        let Some(bounds) = node.bounds else {
            return Ok(None);
        };

        let mut out = FxHashSet::default();
        for candidate in self.store.bbox_candidates(&bounds)? {
            if candidate.id == node.id || candidate.level != level {
                continue;
            }
            let Some(candidate_wkt) = candidate.wkt.as_deref() else {
                continue;
            };
            match parse_geometry(candidate_wkt) {
                Ok(candidate_geom) => {
                    if self.backend.intersects(&candidate_geom, &geom) {
                        out.insert(candidate.id);
                    }
                }
                Err(err) => {
                    log::error!("error reading wkt of location {}: {err}", candidate.id);
                }
            }
        }
        Ok(Some(out))
    }

    /// Nodes within a radius (in km) of a coordinate, as a lazy iterator
    /// of `(node, distance_km)` pairs.
    ///
    /// Pre-filters with the spherical bounds box around the center, then
    /// refines with the configured great-circle formula.
    pub fn radius_query(&self, lat: f64, lon: f64, radius_km: f64) -> Result<RadiusQuery> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(GazetteerError::InvalidInput(format!(
                "radius must be positive, got {radius_km}"
            )));
        }
        let bbox = bounds_from_radius(lat, lon, radius_km);
        let mut candidates = Vec::new();
        for node in self.store.iter()? {
            if let (Some(node_lat), Some(node_lon)) = (node.lat, node.lon)
                && bbox.contains_point(node_lat, node_lon)
            {
                candidates.push(node);
            }
        }
        Ok(RadiusQuery {
            candidates: candidates.into_iter(),
            lat,
            lon,
            radius_km,
            formula: self.settings.distance_formula,
        })
    }

    /// Map bounds covering the given locations' working coordinates,
    /// honouring the configured minimum box size and inset.
    pub fn map_bounds_for(&self, ids: &[LocationId]) -> Result<Option<BoundingBox>> {
        let nodes = self.store.get_many(ids)?;
        Ok(feature_bounds(
            nodes.iter().filter_map(|node| match (node.lat, node.lon) {
                (Some(lat), Some(lon)) => Some((lat, lon)),
                _ => None,
            }),
            self.settings.bbox_min_size,
            self.settings.bbox_inset,
        ))
    }

    /// Simplify geometry text through the configured spatial backend.
    pub fn simplify_geometry(&self, text: &str, options: &SimplifyOptions) -> Result<String> {
        self.backend.simplify(text, options)
    }

    /// Simplification options seeded from the engine settings.
    pub fn default_simplify_options(&self) -> SimplifyOptions {
        SimplifyOptions::default()
            .with_tolerance(self.settings.simplify_tolerance)
            .with_precision(self.settings.precision)
    }
}
