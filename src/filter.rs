//! Traversal filters and restriction sets.
//!
//! A `RestrictionSet` is fixed at preparation time and decides which edges
//! are kept out of contraction (they seed the core). A `TraversalFilter`
//! arrives with each query and is consulted only for edges inside the core;
//! periphery edges were validated when their shortcuts were built, so a
//! filter that targets them would be ignored. Keeping the two notions in
//! sync is the caller's contract.

use rustc_hash::FxHashSet;

use crate::graph::{EdgeId, NodeId};

/// One directed use of an edge during a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeTraversal {
    pub edge: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
}

pub trait TraversalFilter: Send + Sync {
    fn accept(&self, t: &EdgeTraversal) -> bool;
}

/// Accepts everything; the default when a query brings no constraints.
pub struct PassAll;

pub static PASS_ALL: PassAll = PassAll;

impl TraversalFilter for PassAll {
    #[inline]
    fn accept(&self, _t: &EdgeTraversal) -> bool {
        true
    }
}

/// Rejects an explicit set of edge ids, e.g. closed roads or avoided ways.
#[derive(Debug, Default, Clone)]
pub struct BlockedEdges {
    blocked: FxHashSet<EdgeId>,
}

impl BlockedEdges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&mut self, edge: EdgeId) {
        self.blocked.insert(edge);
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

impl FromIterator<EdgeId> for BlockedEdges {
    fn from_iter<I: IntoIterator<Item = EdgeId>>(iter: I) -> Self {
        Self {
            blocked: iter.into_iter().collect(),
        }
    }
}

impl TraversalFilter for BlockedEdges {
    #[inline]
    fn accept(&self, t: &EdgeTraversal) -> bool {
        !self.blocked.contains(&t.edge)
    }
}

/// All filters must accept; empty sequence accepts everything.
#[derive(Default)]
pub struct FilterSequence {
    filters: Vec<Box<dyn TraversalFilter>>,
}

impl FilterSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, filter: Box<dyn TraversalFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl TraversalFilter for FilterSequence {
    fn accept(&self, t: &EdgeTraversal) -> bool {
        self.filters.iter().all(|f| f.accept(t))
    }
}

/// Preparation-time marking of edges that must stay out of contraction.
pub trait RestrictionSet: Send + Sync {
    fn is_restricted(&self, edge: EdgeId) -> bool;
}

/// No restricted edges: contraction runs to completion and the core is empty.
pub struct NoRestrictions;

impl RestrictionSet for NoRestrictions {
    #[inline]
    fn is_restricted(&self, _edge: EdgeId) -> bool {
        false
    }
}

/// Explicit edge id set, the usual choice for conditional or restrictable
/// ways picked out during ingestion.
#[derive(Debug, Default, Clone)]
pub struct RestrictedEdges {
    edges: FxHashSet<EdgeId>,
}

impl RestrictedEdges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, edge: EdgeId) {
        self.edges.insert(edge);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl FromIterator<EdgeId> for RestrictedEdges {
    fn from_iter<I: IntoIterator<Item = EdgeId>>(iter: I) -> Self {
        Self {
            edges: iter.into_iter().collect(),
        }
    }
}

impl RestrictionSet for RestrictedEdges {
    #[inline]
    fn is_restricted(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(edge: EdgeId) -> EdgeTraversal {
        EdgeTraversal {
            edge,
            from: 0,
            to: 1,
        }
    }

    #[test]
    fn test_blocked_edges() {
        let f: BlockedEdges = [3u32, 7].into_iter().collect();
        assert!(!f.accept(&t(3)));
        assert!(!f.accept(&t(7)));
        assert!(f.accept(&t(4)));
    }

    #[test]
    fn test_filter_sequence_is_conjunction() {
        let mut seq = FilterSequence::new();
        assert!(seq.accept(&t(1)));
        seq.add(Box::new([1u32].into_iter().collect::<BlockedEdges>()));
        seq.add(Box::new([2u32].into_iter().collect::<BlockedEdges>()));
        assert!(!seq.accept(&t(1)));
        assert!(!seq.accept(&t(2)));
        assert!(seq.accept(&t(3)));
    }

    #[test]
    fn test_restricted_edges() {
        let r: RestrictedEdges = [5u32].into_iter().collect();
        assert!(r.is_restricted(5));
        assert!(!r.is_restricted(6));
        assert!(!NoRestrictions.is_restricted(5));
    }
}
