//! Storage boundary for location nodes.
//!
//! This module provides a trait-based abstraction over the persistence
//! layer, allowing different backing stores while keeping the tree
//! engine storage-agnostic.

use crate::error::{GazetteerError, Result};
use crate::node::{BoundingBox, Level, LocationId, LocationNode, LocationPatch};
use std::collections::BTreeMap;

/// Trait for location persistence backends.
///
/// The engine reads and writes nodes exclusively through this interface,
/// so a store backed by a spatial database can short-circuit
/// [`bbox_candidates`](LocationStore::bbox_candidates) with a native
/// index instead of the default full scan. Implementations are expected
/// to provide atomic read-modify-write per node; the engine assumes a
/// single logical writer per node and takes no locks of its own.
pub trait LocationStore {
    /// Get one node by id.
    fn get(&self, id: &LocationId) -> Result<Option<LocationNode>>;

    /// Get several nodes by id, skipping ids that do not exist.
    fn get_many(&self, ids: &[LocationId]) -> Result<Vec<LocationNode>> {
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.get(id)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// All direct children of a node.
    fn get_by_parent(&self, parent: &LocationId) -> Result<Vec<LocationNode>>;

    /// All nodes at a hierarchy level (`None` = freeform nodes).
    fn get_by_level(&self, level: Option<Level>) -> Result<Vec<LocationNode>>;

    /// All nodes whose materialized path starts with the given prefix.
    fn find_by_path_prefix(&self, prefix: &str) -> Result<Vec<LocationNode>>;

    /// Insert a new node or replace an existing one wholesale.
    fn insert(&mut self, node: LocationNode) -> Result<()>;

    /// Write the fields named by a patch back to a node.
    fn update(&mut self, id: &LocationId, patch: &LocationPatch) -> Result<()>;

    /// Remove a node, returning it if it existed. Children referencing
    /// it as parent are left in place for the caller to re-point.
    fn remove(&mut self, id: &LocationId) -> Result<Option<LocationNode>>;

    /// Number of stored nodes.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterator over all nodes.
    fn iter(&self) -> Result<Box<dyn Iterator<Item = LocationNode> + '_>>;

    /// Nodes whose stored bounds overlap the query box.
    ///
    /// The default implementation is a full scan with an interval-overlap
    /// test on all four bounds; spatially-indexed stores should override.
    fn bbox_candidates(&self, bbox: &BoundingBox) -> Result<Vec<LocationNode>> {
        let mut out = Vec::new();
        for node in self.iter()? {
            if let Some(node_bounds) = &node.bounds
                && node_bounds.intersects(bbox)
            {
                out.push(node);
            }
        }
        Ok(out)
    }
}

/// Store statistics.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Number of stored nodes.
    pub node_count: usize,
    /// Total number of write operations performed.
    pub write_count: u64,
}

/// In-memory store backed by a `BTreeMap`, the reference implementation
/// used in tests and small deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: BTreeMap<LocationId, LocationNode>,
    stats: StoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.node_count = self.nodes.len();
        stats
    }
}

impl LocationStore for MemoryStore {
    fn get(&self, id: &LocationId) -> Result<Option<LocationNode>> {
        Ok(self.nodes.get(id).cloned())
    }

    fn get_by_parent(&self, parent: &LocationId) -> Result<Vec<LocationNode>> {
        Ok(self
            .nodes
            .values()
            .filter(|node| node.parent.as_ref() == Some(parent))
            .cloned()
            .collect())
    }

    fn get_by_level(&self, level: Option<Level>) -> Result<Vec<LocationNode>> {
        Ok(self
            .nodes
            .values()
            .filter(|node| node.level == level)
            .cloned()
            .collect())
    }

    fn find_by_path_prefix(&self, prefix: &str) -> Result<Vec<LocationNode>> {
        Ok(self
            .nodes
            .values()
            .filter(|node| {
                node.path
                    .as_deref()
                    .is_some_and(|path| path.starts_with(prefix))
            })
            .cloned()
            .collect())
    }

    fn insert(&mut self, node: LocationNode) -> Result<()> {
        self.stats.write_count += 1;
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn update(&mut self, id: &LocationId, patch: &LocationPatch) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GazetteerError::MissingLocation(id.to_string()))?;
        patch.apply(node);
        self.stats.write_count += 1;
        Ok(())
    }

    fn remove(&mut self, id: &LocationId) -> Result<Option<LocationNode>> {
        let old = self.nodes.remove(id);
        if old.is_some() {
            self.stats.write_count += 1;
        }
        Ok(old)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.nodes.len())
    }

    fn iter(&self) -> Result<Box<dyn Iterator<Item = LocationNode> + '_>> {
        Ok(Box::new(self.nodes.values().cloned()))
    }
}
