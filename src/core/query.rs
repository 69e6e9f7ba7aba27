//! Bidirectional core Dijkstra.
//!
//! Outside the core both frontiers climb: an arc is relaxed only toward a
//! node of equal or higher level, exactly the classic CH rule. Once a
//! frontier stands on a core node its arcs into the core are relaxed
//! unshortcut, and each base edge is put to the per-query filter. Meeting
//! candidates are checked when a node is settled and again when its
//! distance improves; shortcut unpacking happens only during path
//! reconstruction.
//!
//! A direction finishes when its frontier empties or its next tentative
//! distance reaches the best meeting weight. Queries never fail: no
//! connection and budget exhaustion are ordinary outcomes.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::hierarchy::{CoreHierarchy, HierArc};
use crate::filter::{EdgeTraversal, TraversalFilter, PASS_ALL};
use crate::graph::{EdgeId, NodeId, RoadGraph, WEIGHT_INF};

const NO_NODE: u32 = u32::MAX;
const NO_EDGE: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct RoutePath {
    pub nodes: Vec<NodeId>,
    /// Base edge ids, shortcuts fully expanded, in travel order.
    pub edges: Vec<EdgeId>,
    /// Total cost under the hierarchy's weighting.
    pub weight: u32,
    pub distance_mm: u64,
}

/// How a query ended. Only configuration problems are `Err` elsewhere;
/// these three are all ordinary results.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Found(RoutePath),
    NoRoute,
    BudgetExhausted { visited: usize },
}

impl QueryOutcome {
    pub fn found(self) -> Option<RoutePath> {
        match self {
            QueryOutcome::Found(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }
}

/// Version-stamped per-node search entry (O(1) reset between queries).
#[derive(Clone, Copy)]
struct SearchEntry {
    dist: u32,
    parent: u32,
    edge: u32,
    version: u32,
}

/// Reusable single-direction search state.
pub struct SearchState {
    entries: Vec<SearchEntry>,
    version: u32,
    heap: BinaryHeap<Reverse<(u32, u32)>>,
}

impl SearchState {
    pub fn new(n_nodes: usize) -> Self {
        Self {
            entries: vec![
                SearchEntry {
                    dist: WEIGHT_INF,
                    parent: NO_NODE,
                    edge: NO_EDGE,
                    version: 0,
                };
                n_nodes
            ],
            version: 0,
            heap: BinaryHeap::with_capacity(1024),
        }
    }

    fn reset(&mut self) {
        self.version = self.version.wrapping_add(1);
        if self.version == 0 {
            for entry in &mut self.entries {
                entry.version = 0;
            }
            self.version = 1;
        }
        self.heap.clear();
    }

    #[inline(always)]
    fn dist(&self, node: u32) -> u32 {
        let entry = &self.entries[node as usize];
        if entry.version == self.version {
            entry.dist
        } else {
            WEIGHT_INF
        }
    }

    #[inline(always)]
    fn set(&mut self, node: u32, dist: u32, parent: u32, edge: u32) {
        self.entries[node as usize] = SearchEntry {
            dist,
            parent,
            edge,
            version: self.version,
        };
    }

    #[inline(always)]
    fn parent_of(&self, node: u32) -> (u32, u32) {
        let entry = &self.entries[node as usize];
        (entry.parent, entry.edge)
    }
}

pub(crate) struct RunResult {
    pub best: u32,
    pub meet: u32,
    pub visited: usize,
    pub exhausted: bool,
}

pub struct CoreDijkstra<'a> {
    graph: &'a RoadGraph,
    hierarchy: &'a CoreHierarchy,
    filter: &'a dyn TraversalFilter,
    max_visited: usize,
}

impl<'a> CoreDijkstra<'a> {
    pub fn new(graph: &'a RoadGraph, hierarchy: &'a CoreHierarchy) -> Self {
        Self {
            graph,
            hierarchy,
            filter: &PASS_ALL,
            max_visited: usize::MAX,
        }
    }

    pub fn with_filter(mut self, filter: &'a dyn TraversalFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Caps settled nodes across both directions.
    pub fn with_budget(mut self, max_visited: usize) -> Self {
        self.max_visited = max_visited;
        self
    }

    pub fn calc_path(&self, source: NodeId, target: NodeId) -> QueryOutcome {
        let n = self.hierarchy.n_nodes() as usize;
        let mut fwd = SearchState::new(n);
        let mut bwd = SearchState::new(n);
        self.calc_path_with(source, target, &mut fwd, &mut bwd)
    }

    /// Same as [`calc_path`](Self::calc_path) with caller-owned state, for
    /// tight loops over many pairs.
    pub fn calc_path_with(
        &self,
        source: NodeId,
        target: NodeId,
        fwd: &mut SearchState,
        bwd: &mut SearchState,
    ) -> QueryOutcome {
        let run = self.run(source, target, fwd, bwd);
        if run.exhausted {
            return QueryOutcome::BudgetExhausted {
                visited: run.visited,
            };
        }
        if run.meet == NO_NODE {
            return QueryOutcome::NoRoute;
        }
        QueryOutcome::Found(self.build_path(source, target, run.meet, fwd, bwd, run.best))
    }

    pub(crate) fn run(
        &self,
        source: NodeId,
        target: NodeId,
        fwd: &mut SearchState,
        bwd: &mut SearchState,
    ) -> RunResult {
        fwd.reset();
        bwd.reset();
        fwd.set(source, 0, NO_NODE, NO_EDGE);
        fwd.heap.push(Reverse((0, source)));
        bwd.set(target, 0, NO_NODE, NO_EDGE);
        bwd.heap.push(Reverse((0, target)));

        let mut best = WEIGHT_INF;
        let mut meet = NO_NODE;
        let mut visited = 0usize;
        let mut fwd_done = false;
        let mut bwd_done = false;

        while !(fwd_done && bwd_done) {
            if visited >= self.max_visited {
                return RunResult {
                    best,
                    meet,
                    visited,
                    exhausted: true,
                };
            }

            if !fwd_done {
                match fwd.heap.pop() {
                    None => fwd_done = true,
                    Some(Reverse((d, u))) => {
                        if d > fwd.dist(u) {
                            // stale entry
                        } else if d >= best {
                            fwd_done = true;
                        } else {
                            visited += 1;
                            let bd = bwd.dist(u);
                            if bd != WEIGHT_INF && d.saturating_add(bd) < best {
                                best = d.saturating_add(bd);
                                meet = u;
                            }
                            for arc in self.hierarchy.out_arcs(u) {
                                if !self.accept(u, arc, false) {
                                    continue;
                                }
                                let nd = d.saturating_add(arc.weight);
                                if nd < fwd.dist(arc.node) {
                                    fwd.set(arc.node, nd, u, arc.edge);
                                    fwd.heap.push(Reverse((nd, arc.node)));
                                    let od = bwd.dist(arc.node);
                                    if od != WEIGHT_INF && nd.saturating_add(od) < best {
                                        best = nd.saturating_add(od);
                                        meet = arc.node;
                                    }
                                }
                            }
                        }
                    }
                }
            }

            if !bwd_done {
                match bwd.heap.pop() {
                    None => bwd_done = true,
                    Some(Reverse((d, u))) => {
                        if d > bwd.dist(u) {
                            // stale entry
                        } else if d >= best {
                            bwd_done = true;
                        } else {
                            visited += 1;
                            let fd = fwd.dist(u);
                            if fd != WEIGHT_INF && d.saturating_add(fd) < best {
                                best = d.saturating_add(fd);
                                meet = u;
                            }
                            for arc in self.hierarchy.in_arcs(u) {
                                if !self.accept(u, arc, true) {
                                    continue;
                                }
                                let nd = d.saturating_add(arc.weight);
                                if nd < bwd.dist(arc.node) {
                                    bwd.set(arc.node, nd, u, arc.edge);
                                    bwd.heap.push(Reverse((nd, arc.node)));
                                    let od = fwd.dist(arc.node);
                                    if od != WEIGHT_INF && nd.saturating_add(od) < best {
                                        best = nd.saturating_add(od);
                                        meet = arc.node;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        RunResult {
            best,
            meet,
            visited,
            exhausted: false,
        }
    }

    /// Relaxation rule. Outside the core an arc must lead upward. Inside
    /// it, base edges answer to the per-query filter; a core-to-core
    /// shortcut spans only periphery edges no filter may target, so it
    /// passes unasked.
    #[inline]
    fn accept(&self, cur: u32, arc: &HierArc, backward: bool) -> bool {
        let max = self.hierarchy.max_level();
        let lvl_cur = self.hierarchy.level(cur);
        let lvl_other = self.hierarchy.level(arc.node);
        if lvl_cur == max && lvl_other == max {
            if self.hierarchy.is_shortcut(arc.edge) {
                return true;
            }
            let (from, to) = if backward {
                (arc.node, cur)
            } else {
                (cur, arc.node)
            };
            return self.filter.accept(&EdgeTraversal {
                edge: arc.edge,
                from,
                to,
            });
        }
        lvl_other >= lvl_cur
    }

    fn build_path(
        &self,
        source: NodeId,
        target: NodeId,
        meet: NodeId,
        fwd: &SearchState,
        bwd: &SearchState,
        weight: u32,
    ) -> RoutePath {
        // Arc chains on either side of the meeting node, in travel order.
        let mut arc_edges = Vec::new();
        let mut cur = meet;
        while cur != source {
            let (p, e) = fwd.parent_of(cur);
            arc_edges.push(e);
            cur = p;
        }
        arc_edges.reverse();
        cur = meet;
        while cur != target {
            let (p, e) = bwd.parent_of(cur);
            arc_edges.push(e);
            cur = p;
        }

        let mut edges = Vec::new();
        for &e in &arc_edges {
            self.hierarchy.unpack_into(e, &mut edges);
        }

        let mut nodes = Vec::with_capacity(edges.len() + 1);
        nodes.push(source);
        let mut distance_mm = 0u64;
        let mut at = source;
        for &e in &edges {
            distance_mm += self.graph.edge(e).distance_mm as u64;
            at = self.graph.edge_other(e, at);
            nodes.push(at);
        }
        debug_assert_eq!(at, target);

        RoutePath {
            nodes,
            edges,
            weight,
            distance_mm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prepare::{PrepareCore, PrepareParams};
    use crate::filter::{BlockedEdges, NoRestrictions, RestrictedEdges};
    use crate::graph::{GraphBuilder, WayTags};
    use crate::profiles::CarProfile;
    use crate::weighting::ShortestWeighting;
    use std::sync::Arc;

    fn prepare(g: &RoadGraph, restricted: &[u32]) -> CoreHierarchy {
        let w = ShortestWeighting::new(Arc::new(CarProfile));
        let r: RestrictedEdges = restricted.iter().copied().collect();
        if restricted.is_empty() {
            PrepareCore::new(g, &w, &NoRestrictions, PrepareParams::default())
                .run()
                .0
        } else {
            PrepareCore::new(g, &w, &r, PrepareParams::default()).run().0
        }
    }

    fn line(n: u32) -> RoadGraph {
        let mut b = GraphBuilder::new();
        b.add_nodes(n as usize);
        for i in 0..n - 1 {
            b.add_edge(i, i + 1, 100_000, WayTags::default());
        }
        b.build()
    }

    #[test]
    fn test_line_path() {
        let g = line(4);
        let h = prepare(&g, &[]);
        let path = CoreDijkstra::new(&g, &h).calc_path(0, 3).found().unwrap();
        assert_eq!(path.nodes, vec![0, 1, 2, 3]);
        assert_eq!(path.edges, vec![0, 1, 2]);
        assert_eq!(path.weight, 300_000);
        assert_eq!(path.distance_mm, 300_000);
    }

    #[test]
    fn test_source_equals_target() {
        let g = line(3);
        let h = prepare(&g, &[]);
        let path = CoreDijkstra::new(&g, &h).calc_path(1, 1).found().unwrap();
        assert_eq!(path.nodes, vec![1]);
        assert!(path.edges.is_empty());
        assert_eq!(path.weight, 0);
    }

    #[test]
    fn test_disconnected_is_no_route() {
        let mut b = GraphBuilder::new();
        b.add_nodes(4);
        b.add_edge(0, 1, 100_000, WayTags::default());
        b.add_edge(2, 3, 100_000, WayTags::default());
        let g = b.build();
        let h = prepare(&g, &[]);
        assert!(matches!(
            CoreDijkstra::new(&g, &h).calc_path(0, 3),
            QueryOutcome::NoRoute
        ));
    }

    #[test]
    fn test_budget_exhaustion() {
        let g = line(6);
        let h = prepare(&g, &[]);
        let outcome = CoreDijkstra::new(&g, &h).with_budget(1).calc_path(0, 5);
        match outcome {
            QueryOutcome::BudgetExhausted { visited } => assert!(visited >= 1),
            other => panic!("expected budget exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_rejects_core_edge() {
        // Ring 0-1-2-3-0, everything restricted, so all nodes are core and
        // every edge answers to the filter.
        let mut b = GraphBuilder::new();
        b.add_nodes(4);
        b.add_edge(0, 1, 100_000, WayTags::default());
        b.add_edge(1, 2, 100_000, WayTags::default());
        b.add_edge(2, 3, 100_000, WayTags::default());
        b.add_edge(3, 0, 100_000, WayTags::default());
        let g = b.build();
        let h = prepare(&g, &[0, 1, 2, 3]);
        assert_eq!(h.core_node_count(), 4);

        let blocked: BlockedEdges = [0u32].into_iter().collect();
        let algo = CoreDijkstra::new(&g, &h).with_filter(&blocked);
        let path = algo.calc_path(0, 1).found().unwrap();
        assert_eq!(path.nodes, vec![0, 3, 2, 1]);
        assert_eq!(path.weight, 300_000);

        // Unfiltered it takes the direct edge.
        let path = CoreDijkstra::new(&g, &h).calc_path(0, 1).found().unwrap();
        assert_eq!(path.nodes, vec![0, 1]);
        assert_eq!(path.weight, 100_000);
    }
}
