//! Hierarchy and engine configuration.
//!
//! Configuration is plain serializable data with builder-style setters,
//! validated once at construction time.

use crate::error::{GazetteerError, Result};
use crate::node::{LEVEL_COUNT, Level};
use crate::spatial::DistanceFormula;
use serde::{Deserialize, Serialize};

/// Per-region hierarchy configuration.
///
/// Controls how many administrative levels are in use, what they are
/// called, and whether nesting is strict (every node at level N has a
/// direct parent at level N-1) or loose (levels may be skipped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Ordered level keys in use, root level first.
    levels: Vec<Level>,
    /// Display label per level slot.
    labels: [String; LEVEL_COUNT],
    /// Strict nesting flag.
    strict: bool,
}

impl HierarchyConfig {
    /// All six levels, default labels, loose nesting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the hierarchy to the given levels.
    ///
    /// Levels must be non-empty, in ascending order and start at `L0`.
    pub fn with_levels(mut self, levels: Vec<Level>) -> Result<Self> {
        if levels.is_empty() {
            return Err(GazetteerError::InvalidInput(
                "hierarchy must have at least one level".into(),
            ));
        }
        if levels[0] != Level::L0 {
            return Err(GazetteerError::InvalidInput(
                "hierarchy must start at L0".into(),
            ));
        }
        if !levels.windows(2).all(|w| w[0] < w[1]) {
            return Err(GazetteerError::InvalidInput(
                "hierarchy levels must be in ascending order".into(),
            ));
        }
        self.levels = levels;
        Ok(self)
    }

    pub fn with_label(mut self, level: Level, label: impl Into<String>) -> Self {
        self.labels[level.index()] = label.into();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Ordered level keys in use.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn contains(&self, level: Level) -> bool {
        self.levels.contains(&level)
    }

    /// Deepest configured level.
    pub fn max_level(&self) -> Level {
        self.levels.last().copied().unwrap_or(Level::L0)
    }

    /// Display label for a level.
    pub fn label(&self, level: Level) -> &str {
        &self.labels[level.index()]
    }

    /// Whether every node at level N must have a direct parent at N-1.
    pub fn strict(&self) -> bool {
        self.strict
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            levels: Level::ALL.to_vec(),
            labels: [
                "Country".into(),
                "State / Province".into(),
                "County / District".into(),
                "City / Town / Village".into(),
                "Neighbourhood".into(),
                "Area".into(),
            ],
            strict: false,
        }
    }
}

/// Whether tree maintenance is active.
///
/// Bulk importers suspend maintenance to avoid churning the tree on
/// every row, then run a full rebuild once finished. The flag is held
/// per engine instance, never global, and is never restored
/// automatically: the caller that suspended it must resume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceMode {
    #[default]
    Enabled,
    Suspended,
}

impl MaintenanceMode {
    pub fn is_suspended(self) -> bool {
        self == MaintenanceMode::Suspended
    }
}

/// Engine tuning knobs.
///
/// # Example
///
/// ```rust
/// use gazetteer::Settings;
///
/// let settings = Settings::default()
///     .with_precision(4)
///     .with_recursion_limit(16);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Decimal digits kept when rounding output coordinates.
    #[serde(default = "Settings::default_precision")]
    pub precision: usize,

    /// Default simplification tolerance in degrees (0 = none).
    #[serde(default = "Settings::default_simplify_tolerance")]
    pub simplify_tolerance: f64,

    /// Maximum ancestor-chain depth resolved in one call.
    #[serde(default = "Settings::default_recursion_limit")]
    pub recursion_limit: usize,

    /// Great-circle distance formula for radius queries.
    #[serde(default)]
    pub distance_formula: DistanceFormula,

    /// Minimum width/height in degrees for feature-set bounds.
    #[serde(default = "Settings::default_bbox_min_size")]
    pub bbox_min_size: f64,

    /// Margin in degrees added around feature-set bounds.
    #[serde(default = "Settings::default_bbox_inset")]
    pub bbox_inset: f64,
}

impl Settings {
    const fn default_precision() -> usize {
        6
    }

    const fn default_simplify_tolerance() -> f64 {
        0.01
    }

    const fn default_recursion_limit() -> usize {
        32
    }

    const fn default_bbox_min_size() -> f64 {
        0.05
    }

    const fn default_bbox_inset() -> f64 {
        0.007
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_simplify_tolerance(mut self, tolerance: f64) -> Self {
        self.simplify_tolerance = tolerance;
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_distance_formula(mut self, formula: DistanceFormula) -> Self {
        self.distance_formula = formula;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.precision > 12 {
            return Err(GazetteerError::InvalidInput(
                "precision must be at most 12 decimal digits".into(),
            ));
        }
        if !self.simplify_tolerance.is_finite() || self.simplify_tolerance < 0.0 {
            return Err(GazetteerError::InvalidInput(
                "simplify tolerance must be finite and non-negative".into(),
            ));
        }
        if self.recursion_limit == 0 {
            return Err(GazetteerError::InvalidInput(
                "recursion limit must be greater than zero".into(),
            ));
        }
        if !self.bbox_min_size.is_finite() || self.bbox_min_size < 0.0 {
            return Err(GazetteerError::InvalidInput(
                "bbox minimum size must be finite and non-negative".into(),
            ));
        }
        if !self.bbox_inset.is_finite() || self.bbox_inset < 0.0 {
            return Err(GazetteerError::InvalidInput(
                "bbox inset must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            precision: Self::default_precision(),
            simplify_tolerance: Self::default_simplify_tolerance(),
            recursion_limit: Self::default_recursion_limit(),
            distance_formula: DistanceFormula::default(),
            bbox_min_size: Self::default_bbox_min_size(),
            bbox_inset: Self::default_bbox_inset(),
        }
    }
}
