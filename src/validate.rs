//! Spot-checks a prepared hierarchy against plain Dijkstra.
//!
//! Random node pairs are routed both ways and the weights compared. The
//! filter is applied to every base edge in the baseline; core queries give
//! the same answer as long as filtered edges all sit in the core, which
//! restriction seeding guarantees.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::core::{CoreDijkstra, CoreHierarchy, QueryOutcome, SearchState};
use crate::filter::{EdgeTraversal, TraversalFilter};
use crate::graph::{NodeId, RoadGraph, WEIGHT_INF};
use crate::weighting::Weighting;

/// Point-to-point weight by plain Dijkstra over the base graph.
pub fn dijkstra_baseline(
    graph: &RoadGraph,
    weighting: &dyn Weighting,
    filter: &dyn TraversalFilter,
    source: NodeId,
    target: NodeId,
) -> Option<u32> {
    let mut dist = vec![WEIGHT_INF; graph.n_nodes() as usize];
    let mut heap = BinaryHeap::new();
    dist[source as usize] = 0;
    heap.push(Reverse((0u32, source)));

    while let Some(Reverse((d, u))) = heap.pop() {
        if d > dist[u as usize] {
            continue;
        }
        if u == target {
            return Some(d);
        }
        for i in graph.out_range(u) {
            let head = graph.out_heads[i];
            let eid = graph.out_edge_ids[i];
            let w = weighting.edge_weight(graph, eid, !graph.out_is_fwd[i]);
            if w == WEIGHT_INF {
                continue;
            }
            if !filter.accept(&EdgeTraversal {
                edge: eid,
                from: u,
                to: head,
            }) {
                continue;
            }
            let nd = d.saturating_add(w);
            if nd < dist[head as usize] {
                dist[head as usize] = nd;
                heap.push(Reverse((nd, head)));
            }
        }
    }
    None
}

/// One disagreeing pair.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub source: NodeId,
    pub target: NodeId,
    pub baseline: Option<u32>,
    pub core: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub n_tests: usize,
    pub correct: usize,
    pub incorrect: usize,
    /// Pairs neither search could connect.
    pub unreachable_both: usize,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.incorrect == 0
    }

    pub fn print(&self) {
        println!(
            "validation: {} pairs, {} correct, {} incorrect, {} unreachable",
            self.n_tests, self.correct, self.incorrect, self.unreachable_both
        );
        for err in self.errors.iter().take(8) {
            println!(
                "  {} -> {}: baseline {:?}, core {:?}",
                err.source, err.target, err.baseline, err.core
            );
        }
        if self.errors.len() > 8 {
            println!("  ... and {} more", self.errors.len() - 8);
        }
    }
}

/// Routes `n_tests` seeded random pairs through both searches.
pub fn validate_core(
    graph: &RoadGraph,
    hierarchy: &CoreHierarchy,
    weighting: &dyn Weighting,
    filter: &dyn TraversalFilter,
    n_tests: usize,
    seed: u64,
) -> ValidationResult {
    let n = graph.n_nodes();
    let mut result = ValidationResult {
        n_tests,
        correct: 0,
        incorrect: 0,
        unreachable_both: 0,
        errors: Vec::new(),
    };
    if n == 0 || n_tests == 0 {
        return result;
    }

    let dijkstra = CoreDijkstra::new(graph, hierarchy).with_filter(filter);
    let mut fwd = SearchState::new(n as usize);
    let mut bwd = SearchState::new(n as usize);
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..n_tests {
        let s = rng.random_range(0..n);
        let t = rng.random_range(0..n);
        let baseline = dijkstra_baseline(graph, weighting, filter, s, t);
        let core = match dijkstra.calc_path_with(s, t, &mut fwd, &mut bwd) {
            QueryOutcome::Found(p) => Some(p.weight),
            _ => None,
        };
        match (baseline, core) {
            (None, None) => result.unreachable_both += 1,
            (b, c) if b == c => result.correct += 1,
            (b, c) => {
                result.incorrect += 1;
                result.errors.push(ValidationError {
                    source: s,
                    target: t,
                    baseline: b,
                    core: c,
                });
            }
        }
    }
    info!(
        pairs = result.n_tests,
        correct = result.correct,
        incorrect = result.incorrect,
        unreachable = result.unreachable_both,
        "hierarchy validated"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PrepareCore, PrepareParams};
    use crate::filter::{BlockedEdges, NoRestrictions, RestrictedEdges, PASS_ALL};
    use crate::graph::{GraphBuilder, WayTags};
    use crate::profiles;
    use crate::weighting::create_weighting;

    fn grid(rows: u32, cols: u32) -> crate::graph::RoadGraph {
        let mut b = GraphBuilder::new();
        b.add_nodes((rows * cols) as usize);
        for r in 0..rows {
            for c in 0..cols {
                let v = r * cols + c;
                if c + 1 < cols {
                    b.add_edge(v, v + 1, 100_000, WayTags::default());
                }
                if r + 1 < rows {
                    b.add_edge(v, v + cols, 100_000, WayTags::default());
                }
            }
        }
        b.build()
    }

    #[test]
    fn baseline_finds_exact_weights() {
        let graph = grid(2, 2);
        let w = create_weighting("shortest", profiles::by_name("car").unwrap()).unwrap();
        assert_eq!(
            dijkstra_baseline(&graph, w.as_ref(), &PASS_ALL, 0, 3),
            Some(200_000)
        );
        assert_eq!(
            dijkstra_baseline(&graph, w.as_ref(), &PASS_ALL, 0, 0),
            Some(0)
        );

        let mut lonely = GraphBuilder::new();
        lonely.add_nodes(2);
        let lonely = lonely.build();
        assert_eq!(
            dijkstra_baseline(&lonely, w.as_ref(), &PASS_ALL, 0, 1),
            None
        );
    }

    #[test]
    fn contracted_grid_agrees_with_baseline() {
        let graph = grid(4, 4);
        let w = create_weighting("fastest", profiles::by_name("car").unwrap()).unwrap();
        let (hierarchy, _) = PrepareCore::new(
            &graph,
            w.as_ref(),
            &NoRestrictions,
            PrepareParams::default(),
        )
        .run();

        let result = validate_core(&graph, &hierarchy, w.as_ref(), &PASS_ALL, 200, 42);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert_eq!(result.correct, 200);
        assert_eq!(result.unreachable_both, 0);
    }

    #[test]
    fn filtered_restricted_edges_stay_consistent() {
        // Ring 0-1-2-3-0; edge 1 (between 1 and 2) is restricted and blocked.
        let mut b = GraphBuilder::new();
        b.add_nodes(4);
        b.add_edge(0, 1, 100_000, WayTags::default());
        b.add_edge(1, 2, 100_000, WayTags::default());
        b.add_edge(2, 3, 100_000, WayTags::default());
        b.add_edge(3, 0, 100_000, WayTags::default());
        let graph = b.build();

        let w = create_weighting("shortest", profiles::by_name("car").unwrap()).unwrap();
        let restricted: RestrictedEdges = [1u32].into_iter().collect();
        let (hierarchy, _) = PrepareCore::new(
            &graph,
            w.as_ref(),
            &restricted,
            PrepareParams::default(),
        )
        .run();

        let blocked: BlockedEdges = [1u32].into_iter().collect();
        let result = validate_core(&graph, &hierarchy, w.as_ref(), &blocked, 60, 7);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert_eq!(result.unreachable_both, 0);
    }
}
