//! Weighted backward impact propagation
//!
//! For one changed element, [`ImpactCalculator`] walks "who depends on me"
//! edges depth-first and lowers each reached element's probability of
//! staying unaffected. [`ImpactAggregator`] runs one calculator per changed
//! element on a rayon pool and multiplies the results together.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{debug, error};

use crate::config::{DEFAULT_PRUNING_THRESHOLD, ImpactConfig, WeightTable};
use crate::error::{Result, RippleError};
use crate::model::ElementId;
use crate::snapshot::{Dependencies, Snapshot};

/// Outcome of propagating a single source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImpact {
    pub source: ElementId,
    /// Per element id: probability of not being impacted by `source`.
    pub no_impact: Vec<f64>,
    /// Elements expanded by the walk, the source included.
    pub expansions: usize,
}

struct Frame<'s> {
    element: ElementId,
    /// Accumulated no-impact probability of the path reaching `element`.
    carried: f64,
    dependents: Dependencies<'s>,
}

/// Single-source propagation over one snapshot.
pub struct ImpactCalculator<'s, 'w> {
    snapshot: &'s Snapshot,
    weights: &'w WeightTable,
    threshold: f64,
}

impl<'s, 'w> ImpactCalculator<'s, 'w> {
    pub fn new(snapshot: &'s Snapshot, weights: &'w WeightTable) -> Self {
        ImpactCalculator {
            snapshot,
            weights,
            threshold: DEFAULT_PRUNING_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Propagate impact from `source` to everything that transitively
    /// depends on it.
    ///
    /// An element may be reached again through a different path once the
    /// walk has backtracked; only elements on the current path are skipped.
    ///
    /// The walk treats the source as certainly affected, but the returned
    /// `no_impact[source]` is 1.0: a source is not scored for its own change.
    /// Once aggregated, a changed or added element therefore scores only
    /// what the other sources propagate to it, and a score of 0.0 for it
    /// does not mean it is unaffected. Callers find such elements in
    /// [`DiffResult::changed`](crate::diff::DiffResult::changed) and
    /// [`DiffResult::added`](crate::diff::DiffResult::added).
    pub fn run(&self, source: ElementId) -> Result<SourceImpact> {
        let n = self.snapshot.len();
        if source.index() >= n {
            return Err(RippleError::InvalidArgument(format!(
                "impact source {} is not an element of snapshot '{}' ({} elements)",
                source,
                self.snapshot.name(),
                n
            )));
        }

        let mut no_impact = vec![1.0; n];
        no_impact[source.index()] = 0.0;
        let mut on_path = vec![false; n];
        on_path[source.index()] = true;

        let mut stack = vec![Frame {
            element: source,
            carried: 0.0,
            dependents: self.snapshot.dependencies_from(source),
        }];
        let mut expansions = 1;

        while let Some(frame) = stack.last_mut() {
            let Some((dependent, counts)) = frame.dependents.next() else {
                on_path[frame.element.index()] = false;
                stack.pop();
                continue;
            };
            if on_path[dependent.index()] {
                continue;
            }

            let link = self.weights.link_probability(counts);
            let increment = (1.0 - frame.carried) * link;
            no_impact[dependent.index()] *= 1.0 - increment;

            if increment >= self.threshold {
                on_path[dependent.index()] = true;
                stack.push(Frame {
                    element: dependent,
                    carried: 1.0 - increment,
                    dependents: self.snapshot.dependencies_from(dependent),
                });
                expansions += 1;
            }
        }

        no_impact[source.index()] = 1.0;

        Ok(SourceImpact {
            source,
            no_impact,
            expansions,
        })
    }
}

/// Fans single-source calculations out over a thread pool and combines them.
pub struct ImpactAggregator<'c> {
    config: &'c ImpactConfig,
}

impl<'c> ImpactAggregator<'c> {
    pub fn new(config: &'c ImpactConfig) -> Self {
        ImpactAggregator { config }
    }

    /// Impact score (probability of being affected by at least one source)
    /// for every element of `snapshot`.
    ///
    /// Fails as a whole if any single task fails.
    pub fn run(&self, snapshot: &Snapshot, sources: &[ElementId]) -> Result<Vec<f64>> {
        let calculator = ImpactCalculator::new(snapshot, self.config.weights())
            .with_threshold(self.config.pruning_threshold());
        self.run_tasks(snapshot.len(), sources, |source| calculator.run(source))
    }

    /// Runs `task` once per source on the pool and combines the results
    /// over `n` elements.
    pub(crate) fn run_tasks<F>(&self, n: usize, sources: &[ElementId], task: F) -> Result<Vec<f64>>
    where
        F: Fn(ElementId) -> Result<SourceImpact> + Sync,
    {
        if sources.is_empty() {
            return Ok(vec![0.0; n]);
        }

        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("ripple-impact-{}", i));
        if let Some(workers) = self.config.workers() {
            builder = builder.num_threads(workers);
        }
        let pool = builder.build()?;

        debug!(
            "Propagating impact of {} sources over {} elements on {} threads",
            sources.len(),
            n,
            pool.current_num_threads()
        );

        let results: Vec<SourceImpact> = pool.install(|| {
            sources
                .par_iter()
                .map(|&source| run_isolated(&task, source))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut combined = vec![1.0; n];
        let mut expansions = 0;
        for result in &results {
            expansions += result.expansions;
            for (total, p) in combined.iter_mut().zip(&result.no_impact) {
                *total *= p;
            }
        }
        debug!("Impact propagation expanded {} elements in total", expansions);

        Ok(combined.into_iter().map(|p| 1.0 - p).collect())
    }
}

fn run_isolated<F>(task: &F, source: ElementId) -> Result<SourceImpact>
where
    F: Fn(ElementId) -> Result<SourceImpact>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| task(source))) {
        Ok(Ok(impact)) => Ok(impact),
        Ok(Err(e)) => Err(RippleError::Aggregation(format!(
            "impact task for element {} failed: {}",
            source, e
        ))),
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("Impact task for element {} panicked: {}", source, panic_msg);
            Err(RippleError::Aggregation(format!(
                "impact task for element {} panicked: {}",
                source, panic_msg
            )))
        }
    }
}
