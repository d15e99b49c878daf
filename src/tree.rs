//! Location-tree maintenance.
//!
//! The heart of the crate: keeps every node's materialized path,
//! denormalized ancestor names, inherited coordinates and bounds
//! consistent, incrementally when one node is edited and in bulk when
//! the whole registry is rebuilt.
//!
//! Repair conditions that would poison a bulk rebuild (a dangling parent
//! reference, an over-deep ancestor chain, unparsable geometry) are
//! reported as [`TreeIssue`] values and logged instead of raised as
//! errors.

use crate::config::{HierarchyConfig, MaintenanceMode, Settings};
use crate::error::{GazetteerError, Result};
use crate::geometry::{ResolvedGeometry, is_point_text, parse_geometry, resolve_geometry};
use crate::node::{
    BoundingBox, Level, LevelNames, LocationId, LocationNode, LocationPatch, PATH_SEPARATOR,
};
use crate::query::{LocalBackend, SpatialBackend};
use crate::store::{LocationStore, MemoryStore};
use std::fmt;

/// A non-fatal condition encountered while repairing the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeIssue {
    /// Declared parent id not found; node kept as a best-effort root.
    MissingParent { node: LocationId, parent: LocationId },
    /// Ancestor chain exceeded the configured recursion bound; the node
    /// is deferred for a later pass.
    RecursionLimit { node: LocationId },
    /// Parent's level is not above the node's own level.
    InvalidParentLevel {
        node: LocationId,
        parent: LocationId,
        parent_level: Option<Level>,
    },
    /// Strict hierarchy with a parent more than one level up.
    SkippedLevels { node: LocationId, parent: LocationId },
    /// Own geometry text could not be parsed.
    InvalidGeometry { node: LocationId, reason: String },
    /// Ancestor levels derived from path position disagree with the
    /// ancestors' own stored levels.
    HierarchyMismatch { node: LocationId },
}

impl fmt::Display for TreeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeIssue::MissingParent { node, parent } => {
                write!(f, "parent {parent} of location {node} not found")
            }
            TreeIssue::RecursionLimit { node } => {
                write!(f, "resolving location {node} exceeded the recursion limit")
            }
            TreeIssue::InvalidParentLevel {
                node,
                parent,
                parent_level,
            } => match parent_level {
                Some(level) => write!(
                    f,
                    "parent {parent} of location {node} has invalid level {level}"
                ),
                None => write!(f, "parent {parent} of location {node} has no level"),
            },
            TreeIssue::SkippedLevels { node, parent } => {
                write!(f, "location {node} skips levels below parent {parent}")
            }
            TreeIssue::InvalidGeometry { node, reason } => {
                write!(f, "location {node} has invalid geometry: {reason}")
            }
            TreeIssue::HierarchyMismatch { node } => {
                write!(f, "path-derived and stored ancestor levels disagree for {node}")
            }
        }
    }
}

/// Result of resolving a single node.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// Node (and any unresolved ancestors) repaired.
    Resolved { path: String, issues: Vec<TreeIssue> },
    /// Resolution hit the recursion bound and must be retried later.
    Deferred { issues: Vec<TreeIssue> },
    /// Maintenance is suspended; nothing was touched.
    Suspended,
}

impl ResolveOutcome {
    /// Final path when the node was resolved.
    pub fn path(&self) -> Option<&str> {
        match self {
            ResolveOutcome::Resolved { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result of propagating inherited coordinates to descendants.
#[derive(Debug, Clone, PartialEq)]
pub enum PropagateOutcome {
    Propagated {
        /// Number of nodes whose stored fields changed.
        updated: usize,
        issues: Vec<TreeIssue>,
    },
    Suspended,
}

/// Summary of a full-registry rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildReport {
    /// Nodes visited and finalized.
    pub resolved: usize,
    /// Nodes whose stored fields changed.
    pub updated: usize,
    /// Nodes still deferred after the trailing retry pass.
    pub deferred: Vec<LocationId>,
    pub issues: Vec<TreeIssue>,
    /// True when the rebuild was a no-op because maintenance is suspended.
    pub suspended: bool,
}

impl RebuildReport {
    fn suspended() -> Self {
        Self {
            suspended: true,
            ..Default::default()
        }
    }
}

/// Accumulator threaded through one maintenance walk.
#[derive(Debug, Default)]
struct ResolveCx {
    issues: Vec<TreeIssue>,
    updated: usize,
}

/// Outcome of one node visit inside a walk.
enum Step {
    Done(String),
    Deferred,
}

/// The hierarchical location registry.
///
/// Owns the storage backend, the hierarchy configuration, the engine
/// settings and the spatial strategy. Maintenance operations live here;
/// the read-only query primitives are in [`crate::query`].
///
/// # Examples
///
/// ```rust
/// use gazetteer::{Gazetteer, Level, LocationId, LocationNode};
///
/// # fn main() -> gazetteer::Result<()> {
/// let mut gazetteer = Gazetteer::in_memory();
///
/// let lk = LocationId::new("LK")?;
/// gazetteer.insert(
///     LocationNode::new(lk.clone(), "Sri Lanka")
///         .with_level(Level::L0)
///         .with_latlon(7.0, 81.0),
/// )?;
///
/// let southern = LocationNode::new(LocationId::new("LK-S")?, "Southern")
///     .with_level(Level::L1)
///     .with_parent(lk);
/// let outcome = gazetteer.insert(southern)?;
/// assert_eq!(outcome.path(), Some("LK/LK-S"));
/// # Ok(())
/// # }
/// ```
pub struct Gazetteer<S: LocationStore = MemoryStore> {
    pub(crate) store: S,
    pub(crate) hierarchy: HierarchyConfig,
    pub(crate) settings: Settings,
    pub(crate) mode: MaintenanceMode,
    pub(crate) backend: Box<dyn SpatialBackend>,
}

impl Gazetteer<MemoryStore> {
    /// Registry backed by the in-memory reference store.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl<S: LocationStore> Gazetteer<S> {
    /// Registry over the given store, with default hierarchy, settings
    /// and the pure in-process spatial backend.
    pub fn new(store: S) -> Self {
        Self {
            store,
            hierarchy: HierarchyConfig::default(),
            settings: Settings::default(),
            mode: MaintenanceMode::default(),
            backend: Box::new(LocalBackend),
        }
    }

    pub fn with_hierarchy(mut self, hierarchy: HierarchyConfig) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Select the spatial strategy. Chosen once at startup, never per
    /// call site.
    pub fn with_backend(mut self, backend: Box<dyn SpatialBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn hierarchy(&self) -> &HierarchyConfig {
        &self.hierarchy
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn maintenance_mode(&self) -> MaintenanceMode {
        self.mode
    }

    /// Suspend tree maintenance (bulk import mode). Resolution calls
    /// become no-ops until [`resume_maintenance`](Self::resume_maintenance)
    /// is called; the caller that suspended must resume and then run
    /// [`resolve_all`](Self::resolve_all) explicitly.
    pub fn suspend_maintenance(&mut self) {
        self.mode = MaintenanceMode::Suspended;
    }

    pub fn resume_maintenance(&mut self) {
        self.mode = MaintenanceMode::Enabled;
    }

    /// Insert a node and resolve it (plus any unresolved ancestors).
    pub fn insert(&mut self, node: LocationNode) -> Result<ResolveOutcome> {
        let id = node.id.clone();
        self.store.insert(node)?;
        self.resolve(&id)
    }

    /// Remove a node. Children referencing it as parent are left
    /// orphaned for the caller to re-point or remove.
    pub fn remove(&mut self, id: &LocationId) -> Result<Option<LocationNode>> {
        self.store.remove(id)
    }

    /// Resolve one node: compute its materialized path, ancestor name
    /// columns, coordinates and bounds, write back any divergence, and
    /// propagate to inheriting descendants. Unresolved ancestors are
    /// resolved first; descendants are only ever visited by propagation.
    pub fn resolve(&mut self, id: &LocationId) -> Result<ResolveOutcome> {
        if self.mode.is_suspended() {
            return Ok(ResolveOutcome::Suspended);
        }
        let mut cx = ResolveCx::default();
        match self.resolve_node(id, false, false, 0, &mut cx)? {
            Step::Done(path) => Ok(ResolveOutcome::Resolved {
                path,
                issues: cx.issues,
            }),
            Step::Deferred => Ok(ResolveOutcome::Deferred { issues: cx.issues }),
        }
    }

    /// Rebuild the whole registry, one hierarchy level at a time from
    /// the root level downward, freeform nodes last, so every ancestor
    /// is resolved before its descendants are visited.
    ///
    /// Hierarchy nodes that already carry a path and an up-to-date point
    /// geometry are skipped; nodes deferred on the recursion bound get
    /// one trailing retry pass.
    pub fn resolve_all(&mut self) -> Result<RebuildReport> {
        if self.mode.is_suspended() {
            log::warn!("resolve_all called while maintenance is suspended; skipping");
            return Ok(RebuildReport::suspended());
        }

        let mut cx = ResolveCx::default();
        let mut resolved = 0usize;
        let mut deferred: Vec<LocationId> = Vec::new();

        let levels = Level::ALL.iter().map(|&l| Some(l)).chain([None]);
        for level in levels {
            let ids: Vec<LocationId> = self
                .store
                .get_by_level(level)?
                .into_iter()
                .map(|node| node.id)
                .collect();
            for id in ids {
                match self.resolve_node(&id, true, false, 0, &mut cx)? {
                    Step::Done(_) => resolved += 1,
                    Step::Deferred => deferred.push(id),
                }
            }
        }

        // One retry pass for nodes deferred on the recursion bound.
        let retry = std::mem::take(&mut deferred);
        for id in retry {
            match self.resolve_node(&id, true, false, 0, &mut cx)? {
                Step::Done(_) => resolved += 1,
                Step::Deferred => deferred.push(id),
            }
        }

        Ok(RebuildReport {
            resolved,
            updated: cx.updated,
            deferred,
            issues: cx.issues,
            suspended: false,
        })
    }

    /// Re-resolve every direct child of `id` that inherits its
    /// coordinates, recursively.
    pub fn propagate(&mut self, id: &LocationId) -> Result<PropagateOutcome> {
        if self.mode.is_suspended() {
            return Ok(PropagateOutcome::Suspended);
        }
        let mut cx = ResolveCx::default();
        self.propagate_children(id, 0, &mut cx)?;
        Ok(PropagateOutcome::Propagated {
            updated: cx.updated,
            issues: cx.issues,
        })
    }

    /// Backfill bounds for nodes that have none: the WKT extent where
    /// the geometry parses, otherwise the point itself as a zero-area
    /// box. Returns the number of patched nodes.
    pub fn set_all_bounds(&mut self) -> Result<usize> {
        let missing: Vec<LocationNode> = self
            .store
            .iter()?
            .filter(|node| node.bounds.is_none())
            .collect();

        let mut patched = 0usize;
        for node in missing {
            let from_wkt = node.wkt.as_deref().and_then(|text| match parse_geometry(text) {
                Ok(geom) => BoundingBox::from_geometry(&geom),
                Err(err) => {
                    log::error!("cannot read wkt of location {}: {err}", node.id);
                    None
                }
            });
            let bounds = from_wkt.or_else(|| match (node.lat, node.lon) {
                (Some(lat), Some(lon)) => Some(BoundingBox::from_point(lat, lon)),
                _ => None,
            });
            if let Some(bounds) = bounds {
                let patch = LocationPatch {
                    bounds: Some(Some(bounds)),
                    ..Default::default()
                };
                self.store.update(&node.id, &patch)?;
                patched += 1;
            }
        }
        Ok(patched)
    }

    /// One node visit: repair the node, then descend to inheriting
    /// children unless this is a bulk rebuild (where level ordering
    /// makes propagation redundant).
    fn resolve_node(
        &mut self,
        id: &LocationId,
        rebuilding: bool,
        propagating: bool,
        depth: usize,
        cx: &mut ResolveCx,
    ) -> Result<Step> {
        if depth > self.settings.recursion_limit {
            cx.issues.push(TreeIssue::RecursionLimit { node: id.clone() });
            log::error!("resolving location {id}: too much recursion");
            return Ok(Step::Deferred);
        }

        let node = self
            .store
            .get(id)?
            .ok_or_else(|| GazetteerError::MissingLocation(id.to_string()))?;

        // Idempotence: a hierarchy node already carrying a path and an
        // up-to-date geometry is final during rebuilds. Pure-point nodes
        // without a generated WKT (including inheriting nodes) are
        // always revisited so refreshed ancestor coordinates reach them.
        if rebuilding
            && node.level.is_some()
            && node.path.is_some()
            && node.wkt.is_some()
            && node.bounds.is_some()
        {
            return Ok(Step::Done(node.path.clone().unwrap_or_default()));
        }

        let mut lx = LevelNames::default();
        if let Some(level) = node.level {
            lx.set(level, node.name.clone());
        }

        let mut parent_latlon: (Option<f64>, Option<f64>) = (None, None);
        let mut parent_missing = false;
        let path: String;

        match &node.parent {
            None => {
                path = id.to_string();
            }
            Some(parent_id) => match self.store.get(parent_id)? {
                None => {
                    // Dangling reference: keep the node reachable as a
                    // best-effort root and report, so bulk rebuilds
                    // continue past it.
                    cx.issues.push(TreeIssue::MissingParent {
                        node: id.clone(),
                        parent: parent_id.clone(),
                    });
                    log::error!("parent {parent_id} of location {id} not found");
                    parent_missing = true;
                    path = format!("{parent_id}{PATH_SEPARATOR}{id}");
                }
                Some(mut parent) => {
                    if let Some(level) = node.level {
                        match parent.level {
                            Some(parent_level) if parent_level >= level => {
                                cx.issues.push(TreeIssue::InvalidParentLevel {
                                    node: id.clone(),
                                    parent: parent_id.clone(),
                                    parent_level: Some(parent_level),
                                });
                                log::error!(
                                    "parent {parent_id} of {level} location {id} has invalid level {parent_level}"
                                );
                                return Ok(Step::Done(format!(
                                    "{parent_id}{PATH_SEPARATOR}{id}"
                                )));
                            }
                            Some(parent_level) => {
                                if self.hierarchy.strict()
                                    && level.parent_level() != Some(parent_level)
                                {
                                    cx.issues.push(TreeIssue::SkippedLevels {
                                        node: id.clone(),
                                        parent: parent_id.clone(),
                                    });
                                    log::warn!(
                                        "strict hierarchy: {level} location {id} nests under {parent_level} parent {parent_id}"
                                    );
                                }
                            }
                            None => {}
                        }
                    }

                    // Resolve the ancestor chain first. Propagation
                    // descends from an already-resolved parent, so it
                    // never walks back up (that would recurse forever).
                    let parent_unresolved =
                        parent.path.is_none() || self.parent_columns_missing(&parent);
                    if parent_unresolved && !propagating {
                        match self.resolve_node(parent_id, rebuilding, false, depth + 1, cx)? {
                            Step::Deferred => return Ok(Step::Deferred),
                            Step::Done(_) => {
                                parent = self.store.get(parent_id)?.ok_or_else(|| {
                                    GazetteerError::MissingLocation(parent_id.to_string())
                                })?;
                            }
                        }
                    }

                    let parent_path = parent
                        .path
                        .clone()
                        .unwrap_or_else(|| parent_id.to_string());
                    path = format!("{parent_path}{PATH_SEPARATOR}{id}");

                    for (ancestor_level, name) in parent.lx.iter() {
                        if node.level.is_none_or(|own| ancestor_level < own) {
                            lx.set(ancestor_level, name);
                        }
                    }
                    if let Some(parent_level) = parent.level {
                        lx.set(parent_level, parent.name.clone());
                    }

                    parent_latlon = (parent.lat, parent.lon);
                }
            },
        }

        // Geometry: own WKT or own coordinates win; otherwise inherit
        // from the parent's resolved position.
        let mut inherited = false;
        let mut skip_geometry_fields = false;
        let mut resolved = ResolvedGeometry::default();

        // Roots have nothing to inherit from; whatever they carry is
        // theirs. Elsewhere a stale inherited flag survives a bare point
        // (its coordinates came from an ancestor), but any real shape
        // the node acquired wins over inheritance.
        let has_own_geometry = if node.parent.is_none() {
            node.wkt.is_some() || node.has_latlon()
        } else {
            match node.wkt.as_deref() {
                Some(text) => !node.inherited || !is_point_text(text),
                None => !node.inherited && node.has_latlon(),
            }
        };
        if has_own_geometry {
            match resolve_geometry(
                node.wkt.as_deref(),
                node.lat,
                node.lon,
                node.radius_km,
                node.bounds,
            ) {
                Ok(geometry) => resolved = geometry,
                Err(err) => {
                    cx.issues.push(TreeIssue::InvalidGeometry {
                        node: id.clone(),
                        reason: err.to_string(),
                    });
                    log::error!("location {id}: {err}");
                    if node.has_latlon() {
                        // Fall back to point-only behaviour.
                        resolved = resolve_geometry(
                            None,
                            node.lat,
                            node.lon,
                            node.radius_km,
                            node.bounds,
                        )?;
                    } else {
                        skip_geometry_fields = true;
                    }
                }
            }
        } else if parent_missing {
            // Nothing to copy from; leave the node's coordinates alone
            // rather than blanking them.
            skip_geometry_fields = true;
        } else {
            inherited = node.parent.is_some();
            let (lat, lon) = parent_latlon;
            resolved = ResolvedGeometry {
                wkt: None,
                lat,
                lon,
                kind: lat.and(lon).map(|_| crate::node::GeometryKind::Point),
                bounds: match (lat, lon) {
                    (Some(lat), Some(lon)) => Some(BoundingBox::from_point(lat, lon)),
                    _ => None,
                },
            };
        }

        // Write back only the fields that diverge.
        let mut patch = LocationPatch::default();
        if node.path.as_deref() != Some(&path) {
            patch.path = Some(path.clone());
        }
        if node.lx != lx {
            patch.lx = Some(lx);
        }
        if !skip_geometry_fields {
            if node.inherited != inherited {
                patch.inherited = Some(inherited);
            }
            if node.lat != resolved.lat {
                patch.lat = Some(resolved.lat);
            }
            if node.lon != resolved.lon {
                patch.lon = Some(resolved.lon);
            }
            if node.wkt != resolved.wkt {
                patch.wkt = Some(resolved.wkt.clone());
            }
            if node.bounds != resolved.bounds {
                patch.bounds = Some(resolved.bounds);
            }
            if node.kind != resolved.kind {
                patch.kind = Some(resolved.kind);
            }
        }
        if !patch.is_empty() {
            self.store.update(id, &patch)?;
            cx.updated += 1;
        }

        if !rebuilding {
            self.propagate_children(id, depth, cx)?;
        }

        Ok(Step::Done(path))
    }

    /// Depth-first descent into children that inherit their coordinates.
    fn propagate_children(
        &mut self,
        id: &LocationId,
        depth: usize,
        cx: &mut ResolveCx,
    ) -> Result<()> {
        let children = self.store.get_by_parent(id)?;
        for child in children {
            if !child.inherited {
                continue;
            }
            match self.resolve_node(&child.id, false, true, depth + 1, cx)? {
                Step::Done(_) => {}
                Step::Deferred => {
                    log::error!(
                        "cannot propagate inherited coordinates to child {} of location {id}: too much recursion",
                        child.id
                    );
                }
            }
        }
        Ok(())
    }

    /// Whether a parent's denormalized columns are too incomplete to
    /// copy from. Only strict hierarchies can tell: there, every level
    /// above the parent must be populated.
    fn parent_columns_missing(&self, parent: &LocationNode) -> bool {
        if !self.hierarchy.strict() {
            return false;
        }
        let Some(parent_level) = parent.level else {
            return false;
        };
        Level::ALL
            .iter()
            .take(parent_level.index())
            .any(|&level| self.hierarchy.contains(level) && parent.lx.get(level).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::GeometryKind;

    fn id(s: &str) -> LocationId {
        LocationId::new(s).unwrap()
    }

    fn country() -> LocationNode {
        LocationNode::new(id("A"), "A")
            .with_level(Level::L0)
            .with_latlon(6.0, 80.0)
    }

    #[test]
    fn test_resolve_root_point() {
        let mut gazetteer = Gazetteer::in_memory();
        let outcome = gazetteer.insert(country()).unwrap();
        assert_eq!(outcome.path(), Some("A"));

        let node = gazetteer.store().get(&id("A")).unwrap().unwrap();
        assert_eq!(node.path.as_deref(), Some("A"));
        assert_eq!(node.wkt.as_deref(), Some("POINT (80 6)"));
        assert!(!node.inherited);
        assert_eq!(node.kind, Some(GeometryKind::Point));
        assert_eq!(node.lx.get(Level::L0), Some("A"));
        let bounds = node.bounds.unwrap();
        assert!(bounds.contains_point(6.0, 80.0));
    }

    #[test]
    fn test_resolve_child_inherits_coordinates() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();
        let outcome = gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();
        assert_eq!(outcome.path(), Some("A/B"));

        let node = gazetteer.store().get(&id("B")).unwrap().unwrap();
        assert!(node.inherited);
        assert_eq!(node.lat, Some(6.0));
        assert_eq!(node.lon, Some(80.0));
        assert!(node.wkt.is_none());
        assert_eq!(node.lx.get(Level::L0), Some("A"));
        assert_eq!(node.lx.get(Level::L1), Some("B"));
    }

    #[test]
    fn test_resolve_grandchild_with_own_polygon() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();
        gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();
        let outcome = gazetteer
            .insert(
                LocationNode::new(id("C"), "C")
                    .with_level(Level::L2)
                    .with_parent(id("B"))
                    .with_wkt("POLYGON ((79 5, 81 5, 81 7, 79 7, 79 5))"),
            )
            .unwrap();
        assert_eq!(outcome.path(), Some("A/B/C"));

        let node = gazetteer.store().get(&id("C")).unwrap().unwrap();
        assert!(!node.inherited);
        assert_eq!(node.kind, Some(GeometryKind::Polygon));
        assert_eq!(node.lx.get(Level::L0), Some("A"));
        assert_eq!(node.lx.get(Level::L1), Some("B"));
        assert_eq!(node.lx.get(Level::L2), Some("C"));
        let bounds = node.bounds.unwrap();
        assert_eq!(bounds.lon_min, 79.0);
        assert_eq!(bounds.lon_max, 81.0);
        assert_eq!(bounds.lat_min, 5.0);
        assert_eq!(bounds.lat_max, 7.0);
        // Centroid of the polygon, not the parent's point.
        assert!((node.lat.unwrap() - 6.0).abs() < 1e-9);
        assert!((node.lon.unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_unresolved_ancestors_first() {
        let mut gazetteer = Gazetteer::in_memory();
        // Insert straight into the store: nothing resolved yet.
        gazetteer.store_mut().insert(country()).unwrap();
        gazetteer
            .store_mut()
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();

        let outcome = gazetteer.resolve(&id("B")).unwrap();
        assert_eq!(outcome.path(), Some("A/B"));
        // The ancestor got a path too.
        let a = gazetteer.store().get(&id("A")).unwrap().unwrap();
        assert_eq!(a.path.as_deref(), Some("A"));
    }

    #[test]
    fn test_propagation_follows_coordinate_update() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();
        gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();

        // Move the country.
        let patch = LocationPatch {
            lat: Some(Some(10.0)),
            ..Default::default()
        };
        gazetteer.store_mut().update(&id("A"), &patch).unwrap();

        match gazetteer.propagate(&id("A")).unwrap() {
            PropagateOutcome::Propagated { updated, .. } => assert!(updated >= 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let b = gazetteer.store().get(&id("B")).unwrap().unwrap();
        assert_eq!(b.lat, Some(10.0));
        assert_eq!(b.lon, Some(80.0));
    }

    #[test]
    fn test_propagation_cascades_to_grandchildren() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();
        gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();
        gazetteer
            .insert(
                LocationNode::new(id("C"), "C")
                    .with_level(Level::L2)
                    .with_parent(id("B")),
            )
            .unwrap();

        let patch = LocationPatch {
            lat: Some(Some(9.0)),
            lon: Some(Some(81.5)),
            ..Default::default()
        };
        gazetteer.store_mut().update(&id("A"), &patch).unwrap();
        gazetteer.propagate(&id("A")).unwrap();

        let c = gazetteer.store().get(&id("C")).unwrap().unwrap();
        assert_eq!(c.lat, Some(9.0));
        assert_eq!(c.lon, Some(81.5));
    }

    #[test]
    fn test_missing_parent_keeps_best_effort_root() {
        let mut gazetteer = Gazetteer::in_memory();
        let outcome = gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("ghost")),
            )
            .unwrap();
        match outcome {
            ResolveOutcome::Resolved { path, issues } => {
                assert_eq!(path, "ghost/B");
                assert!(matches!(issues[0], TreeIssue::MissingParent { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_parent_level_reported() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer
            .insert(
                LocationNode::new(id("D"), "D")
                    .with_level(Level::L2)
                    .with_latlon(1.0, 2.0),
            )
            .unwrap();
        let outcome = gazetteer
            .insert(
                LocationNode::new(id("E"), "E")
                    .with_level(Level::L1)
                    .with_parent(id("D")),
            )
            .unwrap();
        match outcome {
            ResolveOutcome::Resolved { path, issues } => {
                assert_eq!(path, "D/E");
                assert!(matches!(issues[0], TreeIssue::InvalidParentLevel { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_recursion_limit_defers() {
        let settings = Settings::default().with_recursion_limit(2);
        let mut gazetteer = Gazetteer::in_memory().with_settings(settings);

        let mut parent: Option<LocationId> = None;
        for (index, name) in ["r0", "r1", "r2", "r3", "r4", "r5"].iter().enumerate() {
            let mut node = LocationNode::new(id(name), *name)
                .with_level(Level::from_index(index).unwrap());
            if let Some(parent_id) = parent.take() {
                node = node.with_parent(parent_id);
            } else {
                node = node.with_latlon(0.0, 0.0);
            }
            gazetteer.store_mut().insert(node).unwrap();
            parent = Some(id(name));
        }

        let outcome = gazetteer.resolve(&id("r5")).unwrap();
        match outcome {
            ResolveOutcome::Deferred { issues } => {
                assert!(issues.iter().any(|i| matches!(i, TreeIssue::RecursionLimit { .. })));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // A full rebuild works level-by-level and needs no deep chains.
        let report = gazetteer.resolve_all().unwrap();
        assert!(report.deferred.is_empty());
        let r5 = gazetteer.store().get(&id("r5")).unwrap().unwrap();
        assert_eq!(r5.path.as_deref(), Some("r0/r1/r2/r3/r4/r5"));
    }

    #[test]
    fn test_suspended_maintenance_is_noop() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.suspend_maintenance();

        let outcome = gazetteer.insert(country()).unwrap();
        assert_eq!(outcome, ResolveOutcome::Suspended);
        let node = gazetteer.store().get(&id("A")).unwrap().unwrap();
        assert!(node.path.is_none());

        assert!(gazetteer.resolve_all().unwrap().suspended);
        assert_eq!(
            gazetteer.propagate(&id("A")).unwrap(),
            PropagateOutcome::Suspended
        );

        // Explicit rebuild after resuming repairs everything.
        gazetteer.resume_maintenance();
        let report = gazetteer.resolve_all().unwrap();
        assert_eq!(report.resolved, 1);
        let node = gazetteer.store().get(&id("A")).unwrap().unwrap();
        assert_eq!(node.path.as_deref(), Some("A"));
    }

    #[test]
    fn test_resolve_all_is_idempotent() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.store_mut().insert(country()).unwrap();
        gazetteer
            .store_mut()
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();
        gazetteer
            .store_mut()
            .insert(
                LocationNode::new(id("C"), "C")
                    .with_level(Level::L2)
                    .with_parent(id("B"))
                    .with_wkt("POLYGON ((79 5, 81 5, 81 7, 79 7, 79 5))"),
            )
            .unwrap();
        gazetteer
            .store_mut()
            .insert(LocationNode::new(id("X"), "Site").with_parent(id("C")))
            .unwrap();

        let first = gazetteer.resolve_all().unwrap();
        assert!(first.updated > 0);
        assert!(first.issues.is_empty());

        let second = gazetteer.resolve_all().unwrap();
        assert_eq!(second.updated, 0, "second rebuild must be a no-op");
    }

    #[test]
    fn test_invalid_geometry_falls_back_to_point() {
        let mut gazetteer = Gazetteer::in_memory();
        let outcome = gazetteer
            .insert(
                LocationNode::new(id("bad"), "Bad")
                    .with_level(Level::L0)
                    .with_latlon(6.0, 80.0)
                    .with_wkt("POLYGON ((not wkt))"),
            )
            .unwrap();
        match outcome {
            ResolveOutcome::Resolved { issues, .. } => {
                assert!(matches!(issues[0], TreeIssue::InvalidGeometry { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let node = gazetteer.store().get(&id("bad")).unwrap().unwrap();
        assert_eq!(node.wkt.as_deref(), Some("POINT (80 6)"));
        assert_eq!(node.kind, Some(GeometryKind::Point));
    }

    #[test]
    fn test_invalid_geometry_without_latlon_leaves_fields_alone() {
        let mut gazetteer = Gazetteer::in_memory();
        let outcome = gazetteer
            .insert(
                LocationNode::new(id("bad"), "Bad")
                    .with_level(Level::L0)
                    .with_wkt("POLYGON ((not wkt))"),
            )
            .unwrap();
        assert_eq!(outcome.path(), Some("bad"));
        let node = gazetteer.store().get(&id("bad")).unwrap().unwrap();
        // Path maintained, geometry untouched for a later fix.
        assert_eq!(node.path.as_deref(), Some("bad"));
        assert_eq!(node.wkt.as_deref(), Some("POLYGON ((not wkt))"));
        assert!(node.bounds.is_none());
    }

    #[test]
    fn test_coordinate_edit_survives_stale_point_wkt() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();

        // The caller moves the point; the generated WKT is still the
        // old position.
        let patch = LocationPatch {
            lat: Some(Some(10.0)),
            lon: Some(Some(81.0)),
            ..Default::default()
        };
        gazetteer.store_mut().update(&id("A"), &patch).unwrap();
        gazetteer.resolve(&id("A")).unwrap();

        let node = gazetteer.store().get(&id("A")).unwrap().unwrap();
        assert_eq!(node.lat, Some(10.0));
        assert_eq!(node.wkt.as_deref(), Some("POINT (81 10)"));
        assert!(node.bounds.unwrap().contains_point(10.0, 81.0));
    }

    #[test]
    fn test_point_wkt_does_not_clear_inherited_flag() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();
        gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();

        // A point snuck into an inheriting node (e.g. by an importer):
        // inheritance still wins, and the stray WKT is dropped.
        let patch = LocationPatch {
            wkt: Some(Some("POINT (99 9)".into())),
            ..Default::default()
        };
        gazetteer.store_mut().update(&id("B"), &patch).unwrap();
        gazetteer.resolve(&id("B")).unwrap();

        let node = gazetteer.store().get(&id("B")).unwrap().unwrap();
        assert!(node.inherited);
        assert!(node.wkt.is_none());
        assert_eq!(node.lat, Some(6.0));
        assert_eq!(node.lon, Some(80.0));
    }

    #[test]
    fn test_missing_parent_keeps_inherited_coordinates() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();
        gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();
        gazetteer.remove(&id("A")).unwrap();

        gazetteer.resolve(&id("B")).unwrap();
        let node = gazetteer.store().get(&id("B")).unwrap().unwrap();
        // Stale but usable coordinates survive the dangling reference.
        assert!(node.inherited);
        assert_eq!(node.lat, Some(6.0));
        assert_eq!(node.path.as_deref(), Some("A/B"));
    }

    #[test]
    fn test_own_wkt_clears_stale_inherited_flag() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();
        gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();

        // The district acquires its own boundary.
        let patch = LocationPatch {
            wkt: Some(Some("POLYGON ((79 5, 81 5, 81 7, 79 7, 79 5))".into())),
            ..Default::default()
        };
        gazetteer.store_mut().update(&id("B"), &patch).unwrap();
        gazetteer.resolve(&id("B")).unwrap();

        let node = gazetteer.store().get(&id("B")).unwrap().unwrap();
        assert!(!node.inherited);
        assert_eq!(node.kind, Some(GeometryKind::Polygon));
    }

    #[test]
    fn test_freeform_node_under_hierarchy() {
        let mut gazetteer = Gazetteer::in_memory();
        gazetteer.insert(country()).unwrap();
        gazetteer
            .insert(
                LocationNode::new(id("B"), "B")
                    .with_level(Level::L1)
                    .with_parent(id("A")),
            )
            .unwrap();
        let outcome = gazetteer
            .insert(LocationNode::new(id("office"), "Field Office").with_parent(id("B")))
            .unwrap();
        assert_eq!(outcome.path(), Some("A/B/office"));

        let node = gazetteer.store().get(&id("office")).unwrap().unwrap();
        assert!(node.inherited);
        assert_eq!(node.lat, Some(6.0));
        assert_eq!(node.lx.get(Level::L0), Some("A"));
        assert_eq!(node.lx.get(Level::L1), Some("B"));
        // Freeform nodes have no own-level column.
        assert_eq!(node.lx.get(Level::L2), None);
    }

    #[test]
    fn test_strict_hierarchy_reports_skipped_levels() {
        let hierarchy = HierarchyConfig::default().with_strict(true);
        let mut gazetteer = Gazetteer::in_memory().with_hierarchy(hierarchy);
        gazetteer.insert(country()).unwrap();
        let outcome = gazetteer
            .insert(
                LocationNode::new(id("C"), "C")
                    .with_level(Level::L2)
                    .with_parent(id("A")),
            )
            .unwrap();
        match outcome {
            ResolveOutcome::Resolved { issues, .. } => {
                assert!(issues.iter().any(|i| matches!(i, TreeIssue::SkippedLevels { .. })));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_set_all_bounds_backfills() {
        let mut gazetteer = Gazetteer::in_memory();
        let mut with_wkt = LocationNode::new(id("P"), "Poly");
        with_wkt.wkt = Some("POLYGON ((0 0, 2 0, 2 2, 0 2, 0 0))".into());
        let point_only = LocationNode::new(id("Q"), "Point").with_latlon(6.0, 80.0);
        let bare = LocationNode::new(id("R"), "Bare");
        for node in [with_wkt, point_only, bare] {
            gazetteer.store_mut().insert(node).unwrap();
        }

        let patched = gazetteer.set_all_bounds().unwrap();
        assert_eq!(patched, 2);
        let p = gazetteer.store().get(&id("P")).unwrap().unwrap();
        assert_eq!(p.bounds.unwrap().lon_max, 2.0);
        let q = gazetteer.store().get(&id("Q")).unwrap().unwrap();
        assert!(q.bounds.unwrap().is_degenerate());
        let r = gazetteer.store().get(&id("R")).unwrap().unwrap();
        assert!(r.bounds.is_none());
    }
}
