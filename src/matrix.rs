//! Many-to-many weight tables over a prepared core hierarchy.
//!
//! Runs the bidirectional core search once per source and target pair with
//! reused search state, so a table costs no per-cell allocation. Cells that
//! cannot be reached, or whose search ran out of budget, hold
//! [`WEIGHT_INF`].

use std::time::Instant;

use tracing::debug;

use crate::core::{CoreDijkstra, CoreHierarchy, SearchState};
use crate::filter::TraversalFilter;
use crate::graph::{NodeId, RoadGraph, WEIGHT_INF};

#[derive(Debug, Clone)]
pub struct MatrixStats {
    pub n_sources: usize,
    pub n_targets: usize,
    /// Cells left at [`WEIGHT_INF`].
    pub unreachable: usize,
    /// Settled nodes summed over all pair searches.
    pub visited: usize,
    pub total_time_us: u64,
}

pub struct CoreMatrix<'a> {
    dijkstra: CoreDijkstra<'a>,
    n_nodes: usize,
}

impl<'a> CoreMatrix<'a> {
    pub fn new(graph: &'a RoadGraph, hierarchy: &'a CoreHierarchy) -> Self {
        CoreMatrix {
            dijkstra: CoreDijkstra::new(graph, hierarchy),
            n_nodes: hierarchy.n_nodes() as usize,
        }
    }

    pub fn with_filter(mut self, filter: &'a dyn TraversalFilter) -> Self {
        self.dijkstra = self.dijkstra.with_filter(filter);
        self
    }

    /// Caps settled nodes per pair, not for the whole table.
    pub fn with_budget(mut self, max_visited: usize) -> Self {
        self.dijkstra = self.dijkstra.with_budget(max_visited);
        self
    }

    /// Computes the weight table in row-major order, one row per source.
    pub fn compute(&self, sources: &[NodeId], targets: &[NodeId]) -> (Vec<u32>, MatrixStats) {
        let start = Instant::now();
        let mut fwd = SearchState::new(self.n_nodes);
        let mut bwd = SearchState::new(self.n_nodes);
        let mut weights = Vec::with_capacity(sources.len() * targets.len());
        let mut unreachable = 0usize;
        let mut visited = 0usize;

        for &s in sources {
            for &t in targets {
                let run = self.dijkstra.run(s, t, &mut fwd, &mut bwd);
                visited += run.visited;
                let weight = if run.exhausted { WEIGHT_INF } else { run.best };
                if weight == WEIGHT_INF {
                    unreachable += 1;
                }
                weights.push(weight);
            }
        }

        let stats = MatrixStats {
            n_sources: sources.len(),
            n_targets: targets.len(),
            unreachable,
            visited,
            total_time_us: start.elapsed().as_micros() as u64,
        };
        debug!(
            sources = stats.n_sources,
            targets = stats.n_targets,
            unreachable = stats.unreachable,
            visited = stats.visited,
            time_us = stats.total_time_us,
            "matrix computed"
        );
        (weights, stats)
    }
}
