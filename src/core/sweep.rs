//! Bounded one-to-many sweep over the base graph.
//!
//! Plain filtered Dijkstra from an origin up to a weight limit; the settled
//! set is the raw material for isochrone construction, which happens
//! outside this crate. Unlike the core query, the filter applies to every
//! edge here because no shortcuts are involved.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::filter::{EdgeTraversal, TraversalFilter};
use crate::graph::{NodeId, RoadGraph, WEIGHT_INF};
use crate::weighting::Weighting;

#[derive(Debug, Clone)]
pub struct SweepResult {
    pub origin: NodeId,
    pub limit: u32,
    /// Settled nodes and their weights, in settle order (non-decreasing).
    pub reached: Vec<(NodeId, u32)>,
    pub exhausted: bool,
}

pub fn sweep(
    graph: &RoadGraph,
    weighting: &dyn Weighting,
    filter: &dyn TraversalFilter,
    origin: NodeId,
    limit: u32,
    max_visited: usize,
) -> SweepResult {
    let n = graph.n_nodes() as usize;
    let mut dist = vec![WEIGHT_INF; n];
    let mut heap: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();
    dist[origin as usize] = 0;
    heap.push(Reverse((0, origin)));

    let mut reached = Vec::new();
    let mut exhausted = false;

    while let Some(Reverse((d, u))) = heap.pop() {
        if d > dist[u as usize] {
            continue;
        }
        if reached.len() >= max_visited {
            exhausted = true;
            break;
        }
        reached.push((u, d));

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
            if nd <= limit && nd < dist[head as usize] {
                dist[head as usize] = nd;
                heap.push(Reverse((nd, head)));
            }
        }
    }

    SweepResult {
        origin,
        limit,
        reached,
        exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{BlockedEdges, PassAll};
    use crate::graph::{GraphBuilder, WayTags};
    use crate::profiles::CarProfile;
    use crate::weighting::ShortestWeighting;
    use std::sync::Arc;

    fn line(n: u32) -> RoadGraph {
        let mut b = GraphBuilder::new();
        b.add_nodes(n as usize);
        for i in 0..n - 1 {
            b.add_edge(i, i + 1, 100_000, WayTags::default());
        }
        b.build()
    }

    #[test]
    fn test_limit_cuts_reachability() {
        let g = line(6);
        let w = ShortestWeighting::new(Arc::new(CarProfile));
        let res = sweep(&g, &w, &PassAll, 0, 250_000, usize::MAX);
        // Nodes 0, 1, 2 are within 250 m.
        let nodes: Vec<u32> = res.reached.iter().map(|&(n, _)| n).collect();
        assert_eq!(nodes, vec![0, 1, 2]);
        assert_eq!(res.reached[2].1, 200_000);
        assert!(!res.exhausted);
    }

    #[test]
    fn test_filter_prunes_branch() {
        // Star: 0 connects to 1, 2, 3.
        let mut b = GraphBuilder::new();
        b.add_nodes(4);
        b.add_edge(0, 1, 100_000, WayTags::default());
        b.add_edge(0, 2, 100_000, WayTags::default());
        b.add_edge(0, 3, 100_000, WayTags::default());
        let g = b.build();
        let w = ShortestWeighting::new(Arc::new(CarProfile));
        let blocked: BlockedEdges = [1u32].into_iter().collect();
        let res = sweep(&g, &w, &blocked, 0, WEIGHT_INF - 1, usize::MAX);
        let mut nodes: Vec<u32> = res.reached.iter().map(|&(n, _)| n).collect();
        nodes.sort_unstable();
        assert_eq!(nodes, vec![0, 1, 3]);
    }

    #[test]
    fn test_visited_cap() {
        let g = line(10);
        let w = ShortestWeighting::new(Arc::new(CarProfile));
        let res = sweep(&g, &w, &PassAll, 0, WEIGHT_INF - 1, 3);
        assert!(res.exhausted);
        assert_eq!(res.reached.len(), 3);
    }
}
