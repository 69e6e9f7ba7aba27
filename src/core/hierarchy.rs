//! Prepared core hierarchy for one weighting.
//!
//! Node levels encode the search order: contracted (periphery) nodes carry
//! their contraction rank, core nodes all share the sentinel level
//! `n_nodes`. Arc lists hold every accessible base-edge traversal plus the
//! shortcuts created during contraction; shortcut edge ids continue the
//! base edge id space at `n_base_edges`.

use crate::graph::{EdgeId, NodeId, RoadGraph, WEIGHT_INF};

/// A contraction shortcut standing in for a two-arc path over `via`.
///
/// `skipped` holds the arc edge ids entering and leaving the via node; each
/// may itself be a shortcut id, so unpacking recurses.
#[derive(Debug, Clone, Copy)]
pub struct Shortcut {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: u32,
    pub skipped: [EdgeId; 2],
    pub via: NodeId,
}

/// One directed arc of the search graph. `node` is the head for out-arcs
/// and the tail for in-arcs.
#[derive(Debug, Clone, Copy)]
pub struct HierArc {
    pub node: u32,
    pub weight: u32,
    pub edge: u32,
}

#[derive(Debug, Clone)]
pub struct CoreHierarchy {
    weighting_name: String,
    vehicle: String,

    n_nodes: u32,
    n_base_edges: u32,
    levels: Vec<u32>,
    core_nodes: u32,
    shortcuts: Vec<Shortcut>,

    out_offsets: Vec<u64>,
    out_arcs: Vec<HierArc>,
    in_offsets: Vec<u64>,
    in_arcs: Vec<HierArc>,
}

/// Raw preparation output before the arc lists exist.
pub struct HierarchyParts {
    pub weighting_name: String,
    pub vehicle: String,
    pub levels: Vec<u32>,
    pub shortcuts: Vec<Shortcut>,
    /// Per base edge, cost along / against its stored direction.
    pub fwd_weights: Vec<u32>,
    pub rev_weights: Vec<u32>,
}

impl CoreHierarchy {
    /// Builds the CSR arc lists from base-edge weights and shortcuts.
    pub fn assemble(graph: &RoadGraph, parts: HierarchyParts) -> CoreHierarchy {
        let n_nodes = graph.n_nodes();
        let n_base_edges = graph.n_edges();
        assert_eq!(parts.levels.len(), n_nodes as usize);
        assert_eq!(parts.fwd_weights.len(), n_base_edges as usize);
        assert_eq!(parts.rev_weights.len(), n_base_edges as usize);

        let mut out_adj: Vec<Vec<HierArc>> = vec![Vec::new(); n_nodes as usize];
        let mut in_adj: Vec<Vec<HierArc>> = vec![Vec::new(); n_nodes as usize];

        for u in 0..n_nodes {
            for i in graph.out_range(u) {
                let eid = graph.out_edge_ids[i];
                let w = if graph.out_is_fwd[i] {
                    parts.fwd_weights[eid as usize]
                } else {
                    parts.rev_weights[eid as usize]
                };
                if w != WEIGHT_INF {
                    out_adj[u as usize].push(HierArc {
                        node: graph.out_heads[i],
                        weight: w,
                        edge: eid,
                    });
                }
            }
            for i in graph.in_range(u) {
                let eid = graph.in_edge_ids[i];
                let w = if graph.in_is_fwd[i] {
                    parts.fwd_weights[eid as usize]
                } else {
                    parts.rev_weights[eid as usize]
                };
                if w != WEIGHT_INF {
                    in_adj[u as usize].push(HierArc {
                        node: graph.in_tails[i],
                        weight: w,
                        edge: eid,
                    });
                }
            }
        }

        for (si, sc) in parts.shortcuts.iter().enumerate() {
            let edge = n_base_edges + si as u32;
            out_adj[sc.from as usize].push(HierArc {
                node: sc.to,
                weight: sc.weight,
                edge,
            });
            in_adj[sc.to as usize].push(HierArc {
                node: sc.from,
                weight: sc.weight,
                edge,
            });
        }

        let (out_offsets, out_arcs) = flatten(&out_adj);
        let (in_offsets, in_arcs) = flatten(&in_adj);

        let core_nodes = parts.levels.iter().filter(|&&l| l == n_nodes).count() as u32;

        CoreHierarchy {
            weighting_name: parts.weighting_name,
            vehicle: parts.vehicle,
            n_nodes,
            n_base_edges,
            levels: parts.levels,
            core_nodes,
            shortcuts: parts.shortcuts,
            out_offsets,
            out_arcs,
            in_offsets,
            in_arcs,
        }
    }

    #[inline]
    pub fn n_nodes(&self) -> u32 {
        self.n_nodes
    }

    #[inline]
    pub fn n_base_edges(&self) -> u32 {
        self.n_base_edges
    }

    /// The shared level of all core nodes; every contracted node sits below.
    #[inline]
    pub fn max_level(&self) -> u32 {
        self.n_nodes
    }

    #[inline]
    pub fn level(&self, n: NodeId) -> u32 {
        self.levels[n as usize]
    }

    #[inline]
    pub fn is_core(&self, n: NodeId) -> bool {
        self.levels[n as usize] == self.n_nodes
    }

    #[inline]
    pub fn core_node_count(&self) -> u32 {
        self.core_nodes
    }

    #[inline]
    pub fn is_shortcut(&self, edge: u32) -> bool {
        edge >= self.n_base_edges
    }

    #[inline]
    pub fn shortcut(&self, edge: u32) -> &Shortcut {
        &self.shortcuts[(edge - self.n_base_edges) as usize]
    }

    #[inline]
    pub fn n_shortcuts(&self) -> u32 {
        self.shortcuts.len() as u32
    }

    #[inline]
    pub fn out_arcs(&self, u: NodeId) -> &[HierArc] {
        let start = self.out_offsets[u as usize] as usize;
        let end = self.out_offsets[u as usize + 1] as usize;
        &self.out_arcs[start..end]
    }

    #[inline]
    pub fn in_arcs(&self, u: NodeId) -> &[HierArc] {
        let start = self.in_offsets[u as usize] as usize;
        let end = self.in_offsets[u as usize + 1] as usize;
        &self.in_arcs[start..end]
    }

    pub fn weighting_name(&self) -> &str {
        &self.weighting_name
    }

    pub fn vehicle(&self) -> &str {
        &self.vehicle
    }

    /// Expands an arc edge id into base edge ids, in path order.
    pub fn unpack_into(&self, edge: u32, out: &mut Vec<EdgeId>) {
        if edge < self.n_base_edges {
            out.push(edge);
            return;
        }
        let sc = self.shortcut(edge);
        self.unpack_into(sc.skipped[0], out);
        self.unpack_into(sc.skipped[1], out);
    }

    pub fn stats(&self) -> CoreStats {
        CoreStats {
            n_nodes: self.n_nodes,
            core_nodes: self.core_nodes,
            n_shortcuts: self.shortcuts.len() as u64,
            n_out_arcs: self.out_arcs.len() as u64,
            n_in_arcs: self.in_arcs.len() as u64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreStats {
    pub n_nodes: u32,
    pub core_nodes: u32,
    pub n_shortcuts: u64,
    pub n_out_arcs: u64,
    pub n_in_arcs: u64,
}

fn flatten(adj: &[Vec<HierArc>]) -> (Vec<u64>, Vec<HierArc>) {
    let total: usize = adj.iter().map(|a| a.len()).sum();
    let mut offsets = Vec::with_capacity(adj.len() + 1);
    let mut arcs = Vec::with_capacity(total);
    let mut offset = 0u64;
    for list in adj {
        offsets.push(offset);
        arcs.extend_from_slice(list);
        offset += list.len() as u64;
    }
    offsets.push(offset);
    (offsets, arcs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, WayTags};

    /// Path 0-1-2-3 with nested shortcuts: 1→3 over 2, then 0→3 over 1.
    fn nested_hierarchy() -> CoreHierarchy {
        let mut b = GraphBuilder::new();
        b.add_nodes(4);
        for i in 0..3u32 {
            b.add_edge(i, i + 1, 100_000, WayTags::default());
        }
        let g = b.build();

        let shortcuts = vec![
            Shortcut {
                from: 1,
                to: 3,
                weight: 200_000,
                skipped: [1, 2],
                via: 2,
            },
            Shortcut {
                from: 0,
                to: 3,
                weight: 300_000,
                // Second skipped entry is the first shortcut's id.
                skipped: [0, 3],
                via: 1,
            },
        ];
        CoreHierarchy::assemble(
            &g,
            HierarchyParts {
                weighting_name: "shortest".into(),
                vehicle: "car".into(),
                levels: vec![2, 1, 0, 4],
                shortcuts,
                fwd_weights: vec![100_000; 3],
                rev_weights: vec![100_000; 3],
            },
        )
    }

    #[test]
    fn test_levels_and_core_membership() {
        let h = nested_hierarchy();
        assert_eq!(h.max_level(), 4);
        assert!(!h.is_core(0));
        assert!(h.is_core(3));
        assert_eq!(h.core_node_count(), 1);
    }

    #[test]
    fn test_arc_lists_include_shortcuts() {
        let h = nested_hierarchy();
        // Node 0: base arc to 1 plus shortcut to 3.
        let heads: Vec<u32> = h.out_arcs(0).iter().map(|a| a.node).collect();
        assert!(heads.contains(&1));
        assert!(heads.contains(&3));
        // In-arcs of 3: base arc from 2 plus both shortcut heads.
        let tails: Vec<u32> = h.in_arcs(3).iter().map(|a| a.node).collect();
        assert!(tails.contains(&2));
        assert!(tails.contains(&1));
        assert!(tails.contains(&0));
    }

    #[test]
    fn test_unpack_nested_shortcut() {
        let h = nested_hierarchy();
        assert!(h.is_shortcut(3));
        assert!(h.is_shortcut(4));

        let mut edges = Vec::new();
        h.unpack_into(4, &mut edges);
        assert_eq!(edges, vec![0, 1, 2]);

        edges.clear();
        h.unpack_into(1, &mut edges);
        assert_eq!(edges, vec![1]);
    }

    #[test]
    fn test_inaccessible_arcs_are_dropped() {
        let mut b = GraphBuilder::new();
        b.add_nodes(2);
        b.add_edge(0, 1, 50_000, WayTags::default());
        let g = b.build();
        let h = CoreHierarchy::assemble(
            &g,
            HierarchyParts {
                weighting_name: "shortest".into(),
                vehicle: "car".into(),
                levels: vec![0, 1],
                shortcuts: vec![],
                fwd_weights: vec![50_000],
                rev_weights: vec![WEIGHT_INF],
            },
        );
        assert_eq!(h.out_arcs(0).len(), 1);
        // Reverse traversal is inaccessible, so node 1 has no out-arcs.
        assert_eq!(h.out_arcs(1).len(), 0);
        assert_eq!(h.in_arcs(0).len(), 0);
        assert_eq!(h.in_arcs(1).len(), 1);
    }
}
