//! Core-retaining contraction: node ordering, witness searches, shortcuts.
//!
//! Restricted edges never enter the residual graph, so no shortcut can span
//! one and every node touching a restricted edge keeps the core level. All
//! other nodes are eliminated in priority order; a bounded witness search
//! decides per neighbor pair whether the bypass needs a shortcut. Exhausting
//! the witness cap keeps the shortcut, which is the safe side.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use priority_queue::PriorityQueue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use super::hierarchy::{CoreHierarchy, HierarchyParts, Shortcut};
use crate::filter::RestrictionSet;
use crate::graph::{NodeId, RoadGraph, WEIGHT_INF};
use crate::weighting::Weighting;

/// Witness settled-node cap while actually contracting.
const WITNESS_CAP_CONTRACT: usize = 1_000;
/// Cheaper cap while only estimating priorities.
const WITNESS_CAP_PRIORITY: usize = 100;

/// Tuning knobs forwarded from configuration; negative values pick the
/// built-in defaults.
#[derive(Debug, Clone, Copy)]
pub struct PrepareParams {
    /// Full requeue interval, as a percentage of node count. 0 disables.
    pub periodic_updates: i32,
    /// Re-check priorities on pop within the last x% of the queue.
    pub lazy_updates: i32,
    /// Chance (percent) to re-prioritize each neighbor after a contraction.
    pub neighbor_updates: i32,
    /// Percentage of eligible nodes to contract; the rest join the core.
    pub contracted_nodes: i32,
    /// Progress log granularity in percent of contracted nodes.
    pub log_messages: f64,
}

impl Default for PrepareParams {
    fn default() -> Self {
        Self {
            periodic_updates: -1,
            lazy_updates: -1,
            neighbor_updates: -1,
            contracted_nodes: -1,
            log_messages: -1.0,
        }
    }
}

impl PrepareParams {
    fn periodic_pct(&self) -> u32 {
        if self.periodic_updates < 0 {
            20
        } else {
            self.periodic_updates.min(100) as u32
        }
    }

    fn lazy_pct(&self) -> u32 {
        if self.lazy_updates < 0 {
            10
        } else {
            self.lazy_updates.min(100) as u32
        }
    }

    fn neighbor_pct(&self) -> u32 {
        if self.neighbor_updates < 0 {
            20
        } else {
            self.neighbor_updates.min(100) as u32
        }
    }

    fn contracted_pct(&self) -> u32 {
        if self.contracted_nodes < 0 {
            100
        } else {
            self.contracted_nodes.min(100) as u32
        }
    }

    fn log_pct(&self) -> f64 {
        if self.log_messages < 0.0 {
            20.0
        } else {
            self.log_messages
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContractionStats {
    pub nodes: u32,
    pub contracted_nodes: u32,
    pub core_nodes: u32,
    pub shortcuts: u64,
    pub witness_runs: u64,
    pub time_ms: u64,
}

/// Residual arc during contraction; `node` is the far endpoint, `origs`
/// the number of base edges the arc stands for.
#[derive(Debug, Clone, Copy)]
struct ResArc {
    node: u32,
    weight: u32,
    edge: u32,
    origs: u32,
}

struct Candidate {
    from: u32,
    to: u32,
    weight: u32,
    skip_in: u32,
    skip_out: u32,
    origs: u32,
}

pub struct PrepareCore<'a> {
    graph: &'a RoadGraph,
    weighting: &'a dyn Weighting,
    params: PrepareParams,

    fwd_weights: Vec<u32>,
    rev_weights: Vec<u32>,
    restricted_node: Vec<bool>,

    out_adj: Vec<Vec<ResArc>>,
    in_adj: Vec<Vec<ResArc>>,
    shortcuts: Vec<Shortcut>,

    levels: Vec<u32>,
    contracted: Vec<bool>,
    next_rank: u32,

    witness: WitnessSearch,
    witness_runs: u64,
    rng: StdRng,
}

impl<'a> PrepareCore<'a> {
    pub fn new(
        graph: &'a RoadGraph,
        weighting: &'a dyn Weighting,
        restrictions: &dyn RestrictionSet,
        params: PrepareParams,
    ) -> Self {
        let n = graph.n_nodes() as usize;
        let m = graph.n_edges() as usize;

        let mut fwd_weights = vec![WEIGHT_INF; m];
        let mut rev_weights = vec![WEIGHT_INF; m];
        for e in 0..m {
            fwd_weights[e] = weighting.edge_weight(graph, e as u32, false);
            rev_weights[e] = weighting.edge_weight(graph, e as u32, true);
        }

        // Core membership is structural: any node touching a restricted
        // edge stays uncontracted, accessible for this profile or not.
        let mut restricted_node = vec![false; n];
        for e in 0..m {
            if restrictions.is_restricted(e as u32) {
                let rec = graph.edge(e as u32);
                restricted_node[rec.from as usize] = true;
                restricted_node[rec.to as usize] = true;
            }
        }

        let mut out_adj: Vec<Vec<ResArc>> = vec![Vec::new(); n];
        let mut in_adj: Vec<Vec<ResArc>> = vec![Vec::new(); n];
        for e in 0..m {
            if restrictions.is_restricted(e as u32) {
                continue;
            }
            let rec = graph.edge(e as u32);
            if fwd_weights[e] != WEIGHT_INF {
                out_adj[rec.from as usize].push(ResArc {
                    node: rec.to,
                    weight: fwd_weights[e],
                    edge: e as u32,
                    origs: 1,
                });
                in_adj[rec.to as usize].push(ResArc {
                    node: rec.from,
                    weight: fwd_weights[e],
                    edge: e as u32,
                    origs: 1,
                });
            }
            if rev_weights[e] != WEIGHT_INF {
                out_adj[rec.to as usize].push(ResArc {
                    node: rec.from,
                    weight: rev_weights[e],
                    edge: e as u32,
                    origs: 1,
                });
                in_adj[rec.from as usize].push(ResArc {
                    node: rec.to,
                    weight: rev_weights[e],
                    edge: e as u32,
                    origs: 1,
                });
            }
        }

        Self {
            graph,
            weighting,
            params,
            fwd_weights,
            rev_weights,
            restricted_node,
            out_adj,
            in_adj,
            shortcuts: Vec::new(),
            // All nodes start at the core level; contraction assigns ranks.
            levels: vec![graph.n_nodes(); n],
            contracted: vec![false; n],
            next_rank: 0,
            witness: WitnessSearch::new(n),
            witness_runs: 0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn run(mut self) -> (CoreHierarchy, ContractionStats) {
        let start = Instant::now();
        let n = self.graph.n_nodes();

        let eligible: u32 = (0..n)
            .filter(|&v| !self.restricted_node[v as usize])
            .count() as u32;
        tracing::debug!(
            nodes = n,
            eligible,
            restricted = n - eligible,
            weighting = %self.weighting.file_name(),
            "computing initial node priorities"
        );

        let mut queue: PriorityQueue<u32, Reverse<i64>> = PriorityQueue::new();
        for v in 0..n {
            if self.restricted_node[v as usize] {
                continue;
            }
            let p = self.node_priority(v);
            queue.push(v, Reverse(p));
        }

        let target = (eligible as u64 * self.params.contracted_pct() as u64 / 100) as u32;
        let periodic_every = match self.params.periodic_pct() {
            0 => 0,
            pct => ((n as u64 * pct as u64 / 100) as u32).max(10),
        };
        let lazy_below = (n as u64 * self.params.lazy_pct() as u64 / 100) as usize;
        let log_every = (((target as f64) * self.params.log_pct() / 100.0).ceil() as u32).max(1);
        let neighbor_pct = self.params.neighbor_pct();

        let mut contracted_count = 0u32;
        while contracted_count < target {
            let Some((v, _)) = queue.pop() else {
                break;
            };

            // Lazy re-evaluation near the end of the queue, where priorities
            // drift the most.
            if queue.len() < lazy_below {
                let fresh = self.node_priority(v);
                if let Some((_, &Reverse(top))) = queue.peek() {
                    if fresh > top {
                        queue.push(v, Reverse(fresh));
                        continue;
                    }
                }
            }

            self.contract_node(v);
            self.levels[v as usize] = self.next_rank;
            self.next_rank += 1;
            self.contracted[v as usize] = true;
            contracted_count += 1;

            if neighbor_pct > 0 {
                let mut neighbors: Vec<u32> = self.out_adj[v as usize]
                    .iter()
                    .chain(self.in_adj[v as usize].iter())
                    .map(|a| a.node)
                    .filter(|&nb| {
                        !self.contracted[nb as usize] && !self.restricted_node[nb as usize]
                    })
                    .collect();
                neighbors.sort_unstable();
                neighbors.dedup();
                for nb in neighbors {
                    if neighbor_pct >= 100 || self.rng.random_range(0..100u32) < neighbor_pct {
                        let p = self.node_priority(nb);
                        queue.change_priority(&nb, Reverse(p));
                    }
                }
            }

            if periodic_every > 0 && contracted_count % periodic_every == 0 {
                let ids: Vec<u32> = queue.iter().map(|(id, _)| *id).collect();
                for id in ids {
                    let p = self.node_priority(id);
                    queue.change_priority(&id, Reverse(p));
                }
            }

            if contracted_count % log_every == 0 {
                tracing::debug!(
                    contracted = contracted_count,
                    target,
                    shortcuts = self.shortcuts.len(),
                    "contraction progress"
                );
            }
        }

        debug_assert!((0..n).all(|v| !self.restricted_node[v as usize]
            || self.levels[v as usize] == n));

        let core_nodes = n - contracted_count;
        let stats = ContractionStats {
            nodes: n,
            contracted_nodes: contracted_count,
            core_nodes,
            shortcuts: self.shortcuts.len() as u64,
            witness_runs: self.witness_runs,
            time_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            weighting = %self.weighting.file_name(),
            nodes = n,
            core_nodes,
            shortcuts = stats.shortcuts,
            time_ms = stats.time_ms,
            "core contraction finished"
        );

        let hierarchy = CoreHierarchy::assemble(
            self.graph,
            HierarchyParts {
                weighting_name: self.weighting.name().to_string(),
                vehicle: self.weighting.profile().name().to_string(),
                levels: self.levels,
                shortcuts: self.shortcuts,
                fwd_weights: self.fwd_weights,
                rev_weights: self.rev_weights,
            },
        );
        (hierarchy, stats)
    }

    fn contract_node(&mut self, v: NodeId) {
        let (candidates, _removed) = self.gather_shortcuts(v, WITNESS_CAP_CONTRACT);
        for c in candidates {
            self.add_shortcut(c, v);
        }
    }

    /// Edge difference plus original-edge and contracted-neighbor terms;
    /// lower contracts first.
    fn node_priority(&mut self, v: NodeId) -> i64 {
        let (candidates, removed) = self.gather_shortcuts(v, WITNESS_CAP_PRIORITY);
        let added = candidates.len() as i64;
        let orig_count: i64 = candidates.iter().map(|c| c.origs as i64).sum();

        let mut contracted_neighbors = 0i64;
        for i in self.graph.out_range(v) {
            if self.contracted[self.graph.out_heads[i] as usize] {
                contracted_neighbors += 1;
            }
        }
        for i in self.graph.in_range(v) {
            if self.contracted[self.graph.in_tails[i] as usize] {
                contracted_neighbors += 1;
            }
        }

        10 * (added - removed as i64) + orig_count + contracted_neighbors
    }

    /// Simulates eliminating `v`: for every uncontracted in/out neighbor
    /// pair u ≠ w, a shortcut candidate survives unless a witness path of
    /// weight ≤ bypass exists that avoids `v`.
    fn gather_shortcuts(&mut self, v: NodeId, cap: usize) -> (Vec<Candidate>, usize) {
        let in_arcs: Vec<ResArc> = self.in_adj[v as usize]
            .iter()
            .copied()
            .filter(|a| !self.contracted[a.node as usize] && a.node != v)
            .collect();
        let out_arcs: Vec<ResArc> = self.out_adj[v as usize]
            .iter()
            .copied()
            .filter(|a| !self.contracted[a.node as usize] && a.node != v)
            .collect();
        let removed = in_arcs.len() + out_arcs.len();

        let mut candidates = Vec::new();
        for ia in &in_arcs {
            let u = ia.node;
            // Best bypass per target; parallel out-arcs collapse to the min.
            let mut targets: FxHashMap<u32, (u32, u32, u32)> = FxHashMap::default();
            for oa in &out_arcs {
                if oa.node == u {
                    continue;
                }
                let bypass = ia.weight.saturating_add(oa.weight);
                let origs = ia.origs + oa.origs;
                let entry = targets.entry(oa.node).or_insert((bypass, oa.edge, origs));
                if bypass < entry.0 {
                    *entry = (bypass, oa.edge, origs);
                }
            }
            if targets.is_empty() {
                continue;
            }

            let bound = targets.values().map(|&(b, _, _)| b).max().unwrap_or(0);
            self.witness
                .run(&self.out_adj, &self.contracted, u, v, bound, cap);
            self.witness_runs += 1;

            for (&w, &(bypass, skip_out, origs)) in &targets {
                if self.witness.dist(w) <= bypass {
                    continue;
                }
                candidates.push(Candidate {
                    from: u,
                    to: w,
                    weight: bypass,
                    skip_in: ia.edge,
                    skip_out,
                    origs,
                });
            }
        }
        (candidates, removed)
    }

    fn add_shortcut(&mut self, c: Candidate, via: NodeId) {
        let n_base = self.graph.n_edges();

        // An existing arc at equal or better weight makes this redundant.
        if self.out_adj[c.from as usize]
            .iter()
            .any(|a| a.node == c.to && a.weight <= c.weight)
        {
            return;
        }

        // Improve an existing worse shortcut in place rather than stacking
        // parallel arcs.
        if let Some(pos) = self.out_adj[c.from as usize]
            .iter()
            .position(|a| a.node == c.to && a.edge >= n_base)
        {
            let edge_id = self.out_adj[c.from as usize][pos].edge;
            let arc = &mut self.out_adj[c.from as usize][pos];
            arc.weight = c.weight;
            arc.origs = c.origs;
            if let Some(marc) = self.in_adj[c.to as usize]
                .iter_mut()
                .find(|a| a.node == c.from && a.edge == edge_id)
            {
                marc.weight = c.weight;
                marc.origs = c.origs;
            }
            let sc = &mut self.shortcuts[(edge_id - n_base) as usize];
            sc.weight = c.weight;
            sc.skipped = [c.skip_in, c.skip_out];
            sc.via = via;
            return;
        }

        let id = n_base + self.shortcuts.len() as u32;
        self.shortcuts.push(Shortcut {
            from: c.from,
            to: c.to,
            weight: c.weight,
            skipped: [c.skip_in, c.skip_out],
            via,
        });
        self.out_adj[c.from as usize].push(ResArc {
            node: c.to,
            weight: c.weight,
            edge: id,
            origs: c.origs,
        });
        self.in_adj[c.to as usize].push(ResArc {
            node: c.from,
            weight: c.weight,
            edge: id,
            origs: c.origs,
        });
    }
}

/// Version-stamped distance entry (8 bytes, cache-line friendly)
#[derive(Clone, Copy)]
struct DistEntry {
    dist: u32,
    version: u32,
}

/// Reusable bounded Dijkstra over the residual graph, skipping contracted
/// nodes and the node being eliminated.
struct WitnessSearch {
    dist: Vec<DistEntry>,
    version: u32,
    heap: BinaryHeap<Reverse<(u32, u32)>>,
}

impl WitnessSearch {
    fn new(n_nodes: usize) -> Self {
        Self {
            dist: vec![
                DistEntry {
                    dist: WEIGHT_INF,
                    version: 0
                };
                n_nodes
            ],
            version: 0,
            heap: BinaryHeap::with_capacity(256),
        }
    }

    fn reset(&mut self) {
        self.version = self.version.wrapping_add(1);
        if self.version == 0 {
            for entry in &mut self.dist {
                entry.version = 0;
            }
            self.version = 1;
        }
        self.heap.clear();
    }

    #[inline(always)]
    fn dist(&self, node: u32) -> u32 {
        let entry = &self.dist[node as usize];
        if entry.version == self.version {
            entry.dist
        } else {
            WEIGHT_INF
        }
    }

    #[inline(always)]
    fn set_dist(&mut self, node: u32, dist: u32) {
        self.dist[node as usize] = DistEntry {
            dist,
            version: self.version,
        };
    }

    fn run(
        &mut self,
        out_adj: &[Vec<ResArc>],
        contracted: &[bool],
        source: u32,
        avoid: u32,
        bound: u32,
        cap: usize,
    ) {
        self.reset();
        self.set_dist(source, 0);
        self.heap.push(Reverse((0, source)));

        let mut settled = 0usize;
        while let Some(Reverse((d, u))) = self.heap.pop() {
            if d > self.dist(u) {
                continue;
            }
            if d > bound {
                break;
            }
            settled += 1;
            if settled > cap {
                break;
            }
            for arc in &out_adj[u as usize] {
                if arc.node == avoid || contracted[arc.node as usize] {
                    continue;
                }
                let nd = d.saturating_add(arc.weight);
                if nd < self.dist(arc.node) {
                    self.set_dist(arc.node, nd);
                    self.heap.push(Reverse((nd, arc.node)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{NoRestrictions, RestrictedEdges};
    use crate::graph::{GraphBuilder, WayTags};
    use crate::profiles::CarProfile;
    use crate::weighting::ShortestWeighting;
    use std::sync::Arc;

    fn shortest() -> ShortestWeighting {
        ShortestWeighting::new(Arc::new(CarProfile))
    }

    fn line_graph(n: u32, step_mm: u32) -> RoadGraph {
        let mut b = GraphBuilder::new();
        b.add_nodes(n as usize);
        for i in 0..n - 1 {
            b.add_edge(i, i + 1, step_mm, WayTags::default());
        }
        b.build()
    }

    /// Walks a shortcut's unpacked base edges and sums their weights.
    fn unpacked_weight(g: &RoadGraph, h: &CoreHierarchy, w: &dyn Weighting, sc: &Shortcut) -> u32 {
        let mut edges = Vec::new();
        h.unpack_into(sc.skipped[0], &mut edges);
        h.unpack_into(sc.skipped[1], &mut edges);
        let mut cur = sc.from;
        let mut total = 0u32;
        for e in edges {
            let rec = g.edge(e);
            let reverse = rec.from != cur;
            total = total.saturating_add(w.edge_weight(g, e, reverse));
            cur = if reverse { rec.from } else { rec.to };
        }
        assert_eq!(cur, sc.to);
        total
    }

    #[test]
    fn test_full_contraction_leaves_no_core() {
        let g = line_graph(5, 100_000);
        let w = shortest();
        let (h, stats) =
            PrepareCore::new(&g, &w, &NoRestrictions, PrepareParams::default()).run();
        assert_eq!(h.core_node_count(), 0);
        assert_eq!(stats.contracted_nodes, 5);
        assert_eq!(stats.core_nodes, 0);
        // Ranks are a permutation below the core level.
        for v in 0..5 {
            assert!(h.level(v) < h.max_level());
        }
    }

    #[test]
    fn test_witness_prevents_triangle_shortcut() {
        let mut b = GraphBuilder::new();
        b.add_nodes(3);
        b.add_edge(0, 1, 100_000, WayTags::default());
        b.add_edge(1, 2, 100_000, WayTags::default());
        b.add_edge(0, 2, 150_000, WayTags::default());
        let g = b.build();
        let w = shortest();
        let (h, _) = PrepareCore::new(&g, &w, &NoRestrictions, PrepareParams::default()).run();
        // The direct edge witnesses every bypass.
        assert_eq!(h.n_shortcuts(), 0);
    }

    #[test]
    fn test_restricted_edges_seed_core() {
        let g = line_graph(4, 100_000);
        let w = shortest();
        let restrictions: RestrictedEdges = [1u32].into_iter().collect(); // edge 1-2
        let (h, stats) =
            PrepareCore::new(&g, &w, &restrictions, PrepareParams::default()).run();
        assert_eq!(h.core_node_count(), 2);
        assert!(h.is_core(1));
        assert!(h.is_core(2));
        assert!(!h.is_core(0));
        assert!(!h.is_core(3));
        assert_eq!(stats.contracted_nodes, 2);
        // No shortcut may span the restricted edge.
        for si in 0..h.n_shortcuts() {
            let sc = h.shortcut(g.n_edges() + si);
            let mut edges = Vec::new();
            h.unpack_into(g.n_edges() + si, &mut edges);
            assert!(!edges.contains(&1), "shortcut {:?} spans restricted edge", sc);
        }
    }

    #[test]
    fn test_partial_contraction_keeps_remainder_in_core() {
        let g = line_graph(10, 100_000);
        let w = shortest();
        let params = PrepareParams {
            contracted_nodes: 50,
            ..PrepareParams::default()
        };
        let (h, stats) = PrepareCore::new(&g, &w, &NoRestrictions, params).run();
        assert_eq!(stats.contracted_nodes, 5);
        assert_eq!(h.core_node_count(), 5);
    }

    #[test]
    fn test_shortcut_weights_match_unpacked_paths() {
        // 4x4 grid with uneven distances to force real shortcuts.
        let mut b = GraphBuilder::new();
        b.add_nodes(16);
        let idx = |r: u32, c: u32| r * 4 + c;
        for r in 0..4u32 {
            for c in 0..4u32 {
                let d = 100_000 + ((r * 7 + c * 13) % 5) * 10_000;
                if c + 1 < 4 {
                    b.add_edge(idx(r, c), idx(r, c + 1), d, WayTags::default());
                }
                if r + 1 < 4 {
                    b.add_edge(idx(r, c), idx(r + 1, c), d + 5_000, WayTags::default());
                }
            }
        }
        let g = b.build();
        let w = shortest();
        let (h, _) = PrepareCore::new(&g, &w, &NoRestrictions, PrepareParams::default()).run();

        for si in 0..h.n_shortcuts() {
            let id = g.n_edges() + si;
            let sc = *h.shortcut(id);
            assert_eq!(unpacked_weight(&g, &h, &w, &sc), sc.weight);
        }
    }
}
