//! Base road graph: nodes, tagged edges, and CSR traversal adjacency.
//!
//! Edges are stored once, undirected at the storage level. Every edge is
//! listed in both orientations in the adjacency arrays; whether a vehicle
//! may actually traverse an orientation is decided by the weighting layer,
//! so one graph serves all profiles.
//!
//! Unit conventions: distances in millimeters (u32), speeds in mm/s,
//! weights in either mm or deciseconds depending on the weighting.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub type NodeId = u32;
pub type EdgeId = u32;

/// Infinity sentinel for weights and distances.
pub const WEIGHT_INF: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HighwayClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    #[default]
    Residential,
    Service,
    Track,
    Path,
    Footway,
    Cycleway,
    Pedestrian,
}

/// Tags that survive ingestion; everything the profiles need to decide
/// access and speed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WayTags {
    #[serde(default)]
    pub highway: HighwayClass,
    #[serde(default)]
    pub maxspeed_kph: Option<u32>,
    /// Forward-only for vehicles that respect oneway (foot ignores it).
    #[serde(default)]
    pub oneway: bool,
    /// Explicit access overrides; `None` falls back to the highway class.
    #[serde(default)]
    pub motor_vehicle: Option<bool>,
    #[serde(default)]
    pub foot: Option<bool>,
    #[serde(default)]
    pub bicycle: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub from: NodeId,
    pub to: NodeId,
    pub distance_mm: u32,
    pub tags: WayTags,
}

/// Frozen road graph with CSR adjacency in both directions.
///
/// `out_*[i]` describes a traversal leaving a node: the node reached, the
/// edge used, and whether the edge is traversed in its stored direction.
/// `in_*` mirrors the same arcs keyed by their target node.
#[derive(Debug, Clone)]
pub struct RoadGraph {
    pub coords: Vec<(f64, f64)>,
    pub edges: Vec<EdgeRecord>,

    pub out_offsets: Vec<u64>,
    pub out_heads: Vec<u32>,
    pub out_edge_ids: Vec<u32>,
    pub out_is_fwd: Vec<bool>,

    pub in_offsets: Vec<u64>,
    pub in_tails: Vec<u32>,
    pub in_edge_ids: Vec<u32>,
    pub in_is_fwd: Vec<bool>,
}

impl RoadGraph {
    #[inline]
    pub fn n_nodes(&self) -> u32 {
        self.coords.len() as u32
    }

    #[inline]
    pub fn n_edges(&self) -> u32 {
        self.edges.len() as u32
    }

    #[inline]
    pub fn edge(&self, e: EdgeId) -> &EdgeRecord {
        &self.edges[e as usize]
    }

    #[inline]
    pub fn out_range(&self, u: NodeId) -> std::ops::Range<usize> {
        self.out_offsets[u as usize] as usize..self.out_offsets[u as usize + 1] as usize
    }

    #[inline]
    pub fn in_range(&self, u: NodeId) -> std::ops::Range<usize> {
        self.in_offsets[u as usize] as usize..self.in_offsets[u as usize + 1] as usize
    }

    /// Endpoint of `e` that is not `n`. For a self-loop returns `n`.
    #[inline]
    pub fn edge_other(&self, e: EdgeId, n: NodeId) -> NodeId {
        let rec = self.edge(e);
        if rec.from == n {
            rec.to
        } else {
            rec.from
        }
    }

    pub fn load_spec<P: AsRef<Path>>(path: P) -> Result<RoadGraph> {
        let file = File::open(&path).with_context(|| {
            format!("failed to open graph spec {}", path.as_ref().display())
        })?;
        let reader = BufReader::new(file);
        let spec: GraphSpec =
            serde_json::from_reader(reader).context("failed to parse graph spec JSON")?;
        spec.into_graph()
    }
}

/// JSON description of a graph, for small fixtures and CLI input.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeSpec {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: u32,
    pub to: u32,
    /// Explicit length in meters; derived from node coordinates if absent.
    #[serde(default)]
    pub distance_m: Option<f64>,
    #[serde(default)]
    pub tags: WayTags,
}

impl GraphSpec {
    pub fn into_graph(self) -> Result<RoadGraph> {
        let n = self.nodes.len() as u32;
        let mut builder = GraphBuilder::new();
        for node in &self.nodes {
            builder.add_node(node.lat, node.lon);
        }
        for (i, e) in self.edges.into_iter().enumerate() {
            if e.from >= n || e.to >= n {
                anyhow::bail!("edge #{i} references node out of range (n_nodes = {n})");
            }
            let distance_m = match e.distance_m {
                Some(d) => d,
                None => {
                    let (alat, alon) = builder.coords[e.from as usize];
                    let (blat, blon) = builder.coords[e.to as usize];
                    haversine_distance(alat, alon, blat, blon)
                }
            };
            builder.add_edge(e.from, e.to, (distance_m * 1000.0).round() as u32, e.tags);
        }
        Ok(builder.build())
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Accumulates nodes and edges, then freezes them into CSR form.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    coords: Vec<(f64, f64)>,
    edges: Vec<EdgeRecord>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, lat: f64, lon: f64) -> NodeId {
        self.coords.push((lat, lon));
        (self.coords.len() - 1) as NodeId
    }

    /// Adds `count` placeholder nodes and returns the id of the first.
    pub fn add_nodes(&mut self, count: usize) -> NodeId {
        let first = self.coords.len() as NodeId;
        self.coords.resize(self.coords.len() + count, (0.0, 0.0));
        first
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, distance_mm: u32, tags: WayTags) -> EdgeId {
        debug_assert!((from as usize) < self.coords.len());
        debug_assert!((to as usize) < self.coords.len());
        self.edges.push(EdgeRecord {
            from,
            to,
            distance_mm,
            tags,
        });
        (self.edges.len() - 1) as EdgeId
    }

    pub fn build(self) -> RoadGraph {
        let n_nodes = self.coords.len();

        // Both orientations of every edge, grouped per node.
        let mut out_adj: Vec<Vec<(u32, u32, bool)>> = vec![Vec::new(); n_nodes];
        let mut in_adj: Vec<Vec<(u32, u32, bool)>> = vec![Vec::new(); n_nodes];
        for (idx, e) in self.edges.iter().enumerate() {
            let eid = idx as u32;
            out_adj[e.from as usize].push((e.to, eid, true));
            in_adj[e.to as usize].push((e.from, eid, true));
            out_adj[e.to as usize].push((e.from, eid, false));
            in_adj[e.from as usize].push((e.to, eid, false));
        }

        let (out_offsets, out_heads, out_edge_ids, out_is_fwd) = flatten_csr(&out_adj);
        let (in_offsets, in_tails, in_edge_ids, in_is_fwd) = flatten_csr(&in_adj);

        RoadGraph {
            coords: self.coords,
            edges: self.edges,
            out_offsets,
            out_heads,
            out_edge_ids,
            out_is_fwd,
            in_offsets,
            in_tails,
            in_edge_ids,
            in_is_fwd,
        }
    }
}

fn flatten_csr(adj: &[Vec<(u32, u32, bool)>]) -> (Vec<u64>, Vec<u32>, Vec<u32>, Vec<bool>) {
    let total: usize = adj.iter().map(|a| a.len()).sum();
    let mut offsets = Vec::with_capacity(adj.len() + 1);
    let mut nodes = Vec::with_capacity(total);
    let mut edge_ids = Vec::with_capacity(total);
    let mut is_fwd = Vec::with_capacity(total);

    let mut offset = 0u64;
    for arcs in adj {
        offsets.push(offset);
        for &(node, edge, fwd) in arcs {
            nodes.push(node);
            edge_ids.push(edge);
            is_fwd.push(fwd);
            offset += 1;
        }
    }
    offsets.push(offset);

    (offsets, nodes, edge_ids, is_fwd)
}
