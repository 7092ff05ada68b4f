//! Impact weights and analysis configuration (`ripple.toml`)

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RippleError};
use crate::model::{DependencyCounts, DependencyKind};

/// Config file name looked up next to the snapshots.
pub const CONFIG_FILE: &str = "ripple.toml";

/// Propagation stops once a path adds less impact than this.
pub const DEFAULT_PRUNING_THRESHOLD: f64 = 1e-5;

/// Probability that a single dependency occurrence of a kind carries impact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightTable([f64; DependencyKind::COUNT]);

impl WeightTable {
    pub fn new(weights: [f64; DependencyKind::COUNT]) -> Result<Self> {
        let table = WeightTable(weights);
        for kind in DependencyKind::ALL {
            validate_weight(kind, table.get(kind))?;
        }
        Ok(table)
    }

    /// Same weight for every kind.
    pub fn uniform(weight: f64) -> Result<Self> {
        Self::new([weight; DependencyKind::COUNT])
    }

    pub fn with(mut self, kind: DependencyKind, weight: f64) -> Result<Self> {
        validate_weight(kind, weight)?;
        self.0[kind.index()] = weight;
        Ok(self)
    }

    pub fn get(&self, kind: DependencyKind) -> f64 {
        self.0[kind.index()]
    }

    /// Probability that at least one occurrence on an edge propagates impact,
    /// with occurrences and kinds treated as independent events.
    pub fn link_probability(&self, counts: &DependencyCounts) -> f64 {
        let mut blocked = 1.0;
        for (kind, count) in counts.iter() {
            blocked *= (1.0 - self.get(kind)).powi(count.min(i32::MAX as u32) as i32);
        }
        1.0 - blocked
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        WeightTable([
            0.3, // use
            0.5, // member
            0.7, // inheritance
            0.4, // invocation
            0.8, // override
            0.3, // access
        ])
    }
}

fn validate_weight(kind: DependencyKind, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RippleError::InvalidWeight { kind, value })
    }
}

/// Everything the impact phase needs besides the snapshots.
///
/// Fields are only set through the validating constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactConfig {
    weights: WeightTable,
    workers: Option<usize>,
    pruning_threshold: f64,
}

impl ImpactConfig {
    pub fn new(weights: WeightTable) -> Self {
        ImpactConfig {
            weights,
            workers: None,
            pruning_threshold: DEFAULT_PRUNING_THRESHOLD,
        }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Worker threads for impact tasks; `None` lets rayon decide.
    pub fn workers(&self) -> Option<usize> {
        self.workers
    }

    pub fn pruning_threshold(&self) -> f64 {
        self.pruning_threshold
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    pub fn with_pruning_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(RippleError::InvalidThreshold(threshold));
        }
        self.pruning_threshold = threshold;
        Ok(self)
    }

    /// Parse a TOML document. Kinds missing from `[weights]` keep their
    /// default weight.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let raw: ConfigFile = toml::from_str(source)?;
        let mut weights = WeightTable::default();
        for (kind, weight) in raw.weights {
            weights = weights.with(kind, weight)?;
        }
        let mut config = ImpactConfig::new(weights);
        if let Some(workers) = raw.workers {
            config = config.with_workers(workers);
        }
        if let Some(threshold) = raw.pruning_threshold {
            config = config.with_pruning_threshold(threshold)?;
        }
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!("Loaded impact config from {}", path.display());
        Ok(config)
    }
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self::new(WeightTable::default())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    workers: Option<usize>,
    pruning_threshold: Option<f64>,
    weights: BTreeMap<DependencyKind, f64>,
}
