//! Embedded hierarchical location registry with materialized-path
//! maintenance, coordinate inheritance and spatial queries.
//!
//! ```rust
//! use gazetteer::{Gazetteer, Level, LocationId, LocationNode, LocationStore};
//!
//! let mut registry = Gazetteer::in_memory();
//!
//! let lk = LocationId::new("LK")?;
//! registry.insert(
//!     LocationNode::new(lk.clone(), "Sri Lanka")
//!         .with_level(Level::L0)
//!         .with_latlon(7.0, 81.0),
//! )?;
//! registry.insert(
//!     LocationNode::new(LocationId::new("LK-S")?, "Southern")
//!         .with_level(Level::L1)
//!         .with_parent(lk.clone()),
//! )?;
//!
//! let southern = registry.store().get(&LocationId::new("LK-S")?)?.unwrap();
//! assert_eq!(southern.path.as_deref(), Some("LK/LK-S"));
//! assert!(southern.inherited);
//! assert_eq!(registry.children(&lk, None)?.len(), 1);
//! # Ok::<(), gazetteer::GazetteerError>(())
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod geocode;
pub mod geometry;
pub mod node;
pub mod query;
pub mod simplify;
pub mod spatial;
pub mod store;
pub mod tree;

pub use config::{HierarchyConfig, MaintenanceMode, Settings};
pub use error::{GazetteerError, Result};
pub use geocode::{GeocodeError, GeocodedPoint, Geocoder};
pub use node::{
    BoundingBox, GeometryKind, Level, LevelNames, LocationId, LocationNode, LocationPatch,
};
pub use query::{LocalBackend, RadiusQuery, ShapeQuery, SpatialBackend};
pub use simplify::{GeometryFormat, SimplifyOptions};
pub use spatial::DistanceFormula;
pub use store::{LocationStore, MemoryStore, StoreStats};
pub use tree::{
    Gazetteer, PropagateOutcome, RebuildReport, ResolveOutcome, TreeIssue,
};

pub use geo::Geometry;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{Gazetteer, GazetteerError, Result};

    pub use crate::{HierarchyConfig, MaintenanceMode, Settings};

    pub use crate::{Level, LocationId, LocationNode, LocationPatch};

    pub use crate::{LocationStore, MemoryStore};

    pub use crate::{PropagateOutcome, RebuildReport, ResolveOutcome, TreeIssue};

    pub use crate::{DistanceFormula, GeometryFormat, SimplifyOptions};
}
