//! Ripple Core: structural matching of program snapshots and change impact scoring

pub mod model;
pub mod snapshot;
pub mod entity;
pub mod aspects;
pub mod matcher;
pub mod diff;
pub mod impact;
pub mod config;
pub mod document;
pub mod error;


#[cfg(test)]
pub mod test_utils;

pub use model::{ElementId, TypeId, AnnotationId, ElementKind, DependencyKind, DependencyCounts, Modifier, Modifiers, Element, Facets, TypeInfo, TypeKind, Annotation};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotKey, NodeRef};
pub use entity::Entity;
pub use matcher::{EntityMatcher, EntityWrapper, MatchMode, MatcherStats};
pub use diff::{DiffResult, DiffSummary, compare, compare_with};
pub use impact::{ImpactAggregator, ImpactCalculator, SourceImpact};
pub use config::{CONFIG_FILE, DEFAULT_PRUNING_THRESHOLD, ImpactConfig, WeightTable};
pub use document::SnapshotDocument;
pub use error::{Result, RippleError};
