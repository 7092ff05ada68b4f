//! Snapshot diff: structural classification plus impact scores

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ImpactConfig, WeightTable};
use crate::entity::Entity;
use crate::error::{Result, RippleError};
use crate::impact::ImpactAggregator;
use crate::matcher::{EntityMatcher, EntityWrapper, MatchMode};
use crate::model::*;
use crate::snapshot::{NodeRef, Snapshot, SnapshotKey};

/// Outcome of comparing two snapshots.
#[derive(Debug, Clone)]
pub struct DiffResult {
    name: String,
    current: SnapshotKey,
    /// Previous-only elements.
    removed: Vec<ElementId>,
    /// Current-only elements.
    added: Vec<ElementId>,
    /// (previous, current) pairs that correspond but differ.
    changed: Vec<(ElementId, ElementId)>,
    /// (previous, current) pairs that are structurally identical.
    unchanged: Vec<(ElementId, ElementId)>,
    /// Impact score per current element id.
    impact: Vec<f64>,
}

/// Counts describing a diff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub removed: usize,
    pub added: usize,
    pub changed: usize,
    pub unchanged: usize,
    /// Current elements with a non-zero impact score.
    pub impacted: usize,
    pub max_impact: f64,
}

impl DiffResult {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key of the snapshot the impact scores refer to.
    pub fn current_key(&self) -> SnapshotKey {
        self.current
    }

    pub fn removed(&self) -> &[ElementId] {
        &self.removed
    }

    pub fn added(&self) -> &[ElementId] {
        &self.added
    }

    pub fn changed(&self) -> &[(ElementId, ElementId)] {
        &self.changed
    }

    pub fn unchanged(&self) -> &[(ElementId, ElementId)] {
        &self.unchanged
    }

    /// Impact scores indexed by current element id.
    ///
    /// Changed and added elements are the impact sources and score only
    /// what other sources propagate to them; 0.0 there does not mean
    /// unaffected.
    pub fn impact_scores(&self) -> &[f64] {
        &self.impact
    }

    /// Impact score of a current-snapshot element.
    pub fn node_impact(&self, node: NodeRef<'_>) -> Result<f64> {
        if node.snapshot().key() != self.current {
            return Err(RippleError::InvalidArgument(format!(
                "element {:?} does not belong to the current snapshot of diff '{}'",
                node, self.name
            )));
        }
        self.impact.get(node.id().index()).copied().ok_or_else(|| {
            RippleError::InvalidArgument(format!("element {} is outside the impact table", node.id()))
        })
    }

    /// The current element matched to a previous one, changed or not.
    pub fn counterpart(&self, previous: ElementId) -> Option<ElementId> {
        // Both lists are filled in previous-id order.
        [&self.changed, &self.unchanged].into_iter().find_map(|pairs| {
            pairs
                .binary_search_by_key(&previous, |&(p, _)| p)
                .ok()
                .map(|i| pairs[i].1)
        })
    }

    /// Whether any element was removed, added or changed.
    pub fn has_changes(&self) -> bool {
        !(self.removed.is_empty() && self.added.is_empty() && self.changed.is_empty())
    }

    /// The `limit` current elements with the highest non-zero impact,
    /// ties broken by id.
    pub fn most_impacted(&self, limit: usize) -> Vec<(ElementId, f64)> {
        let mut scored: Vec<(ElementId, f64)> = self
            .impact
            .iter()
            .enumerate()
            .filter(|&(_, &score)| score > 0.0)
            .map(|(i, &score)| (ElementId(i as u32), score))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            removed: self.removed.len(),
            added: self.added.len(),
            changed: self.changed.len(),
            unchanged: self.unchanged.len(),
            impacted: self.impact.iter().filter(|&&s| s > 0.0).count(),
            max_impact: self.impact.iter().copied().fold(0.0, f64::max),
        }
    }
}

/// Compare two snapshots with the given impact weights.
pub fn compare(
    name: &str,
    previous: &Snapshot,
    current: &Snapshot,
    weights: &WeightTable,
) -> Result<DiffResult> {
    compare_with(name, previous, current, &ImpactConfig::new(*weights))
}

/// Compare two snapshots with a full impact configuration.
pub fn compare_with(
    name: &str,
    previous: &Snapshot,
    current: &Snapshot,
    config: &ImpactConfig,
) -> Result<DiffResult> {
    let span = tracing::info_span!("compare", name);
    let _guard = span.enter();

    let matcher = EntityMatcher::new();
    let prev_map = bucket(&matcher, previous);
    let cur_map = bucket(&matcher, current);
    debug!(
        "Bucketed {} previous and {} current elements",
        prev_map.len(),
        cur_map.len()
    );

    let mut removed = Vec::new();
    let mut changed = Vec::new();
    let mut unchanged = Vec::new();
    for node in previous.nodes() {
        let key = matcher.wrap(Entity::from(node), MatchMode::Similar);
        match cur_map.get(&key) {
            None => removed.push(node.id()),
            Some(&counterpart) => {
                let pair = (node.id(), counterpart.id());
                if matcher.matches(node.into(), counterpart.into(), MatchMode::Identical) {
                    unchanged.push(pair);
                } else {
                    changed.push(pair);
                }
            }
        }
    }

    let added: Vec<ElementId> = current
        .nodes()
        .filter(|&node| !prev_map.contains_key(&matcher.wrap(node.into(), MatchMode::Similar)))
        .map(|node| node.id())
        .collect();

    let stats = matcher.stats();
    debug!(
        "Matcher ran {} comparisons ({} cache hits, {} cycle assumptions, {} provisional)",
        stats.comparisons, stats.cache_hits, stats.assumptions, stats.provisional
    );

    let mut sources: Vec<ElementId> = added
        .iter()
        .copied()
        .chain(changed.iter().map(|&(_, cur)| cur))
        .collect();
    sources.sort_unstable();
    sources.dedup();

    let impact = ImpactAggregator::new(config).run(current, &sources)?;

    let result = DiffResult {
        name: name.to_string(),
        current: current.key(),
        removed,
        added,
        changed,
        unchanged,
        impact,
    };
    let summary = result.summary();
    info!(
        "Diff '{}': {} removed, {} added, {} changed, {} unchanged, {} impacted",
        name, summary.removed, summary.added, summary.changed, summary.unchanged, summary.impacted
    );
    Ok(result)
}

/// Map every element of `snapshot` by its similar-mode wrapper.
///
/// Elements sharing a wrapper shadow each other, the last one wins.
fn bucket<'m, 's>(
    matcher: &'m EntityMatcher<'s>,
    snapshot: &'s Snapshot,
) -> HashMap<EntityWrapper<'m, 's>, NodeRef<'s>> {
    let mut map = HashMap::with_capacity(snapshot.len());
    let mut shadowed = 0usize;
    for node in snapshot.nodes() {
        if map
            .insert(matcher.wrap(node.into(), MatchMode::Similar), node)
            .is_some()
        {
            shadowed += 1;
        }
    }
    if shadowed > 0 {
        warn!(
            "{} elements of snapshot '{}' share a similar key with a later element and were shadowed",
            shadowed,
            snapshot.name()
        );
    }
    map
}
