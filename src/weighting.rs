//! Edge weightings: map a traversal to a u32 cost under a vehicle profile.
//!
//! A weighting owns its profile; the pair (weighting name, vehicle name) is
//! the identity a prepared hierarchy is stored and looked up under. Weights
//! are deciseconds for `fastest` and millimeters for `shortest`; `WEIGHT_INF`
//! marks an inaccessible traversal.

use std::sync::Arc;

use crate::error::CoreError;
use crate::graph::{EdgeId, RoadGraph, WEIGHT_INF};
use crate::hints::{keys, QueryHints};
use crate::profiles::VehicleProfile;

pub trait Weighting: Send + Sync {
    fn name(&self) -> &'static str;

    fn profile(&self) -> &dyn VehicleProfile;

    /// Cost of traversing `edge`; `reverse` means against its stored
    /// direction. Returns `WEIGHT_INF` when the profile forbids it.
    fn edge_weight(&self, graph: &RoadGraph, edge: EdgeId, reverse: bool) -> u32;

    /// True when weights are travel time rather than distance. Reporting
    /// only; the engine never branches on it.
    fn is_time_based(&self) -> bool;

    /// Identity string used for property-store keys and log lines,
    /// e.g. "fastest_car".
    fn file_name(&self) -> String {
        format!("{}_{}", self.name(), self.profile().name())
    }

    /// Whether this weighting satisfies a request. The weighting name must
    /// match; the vehicle must match too when the request pins one.
    fn matches(&self, hints: &QueryHints) -> bool {
        match hints.get_str(keys::WEIGHTING) {
            Some(w) if w != self.name() => return false,
            _ => {}
        }
        match hints.get_str(keys::VEHICLE) {
            Some(v) => v == self.profile().name(),
            None => true,
        }
    }
}

impl std::fmt::Debug for dyn Weighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Weighting({})", self.file_name())
    }
}

/// Travel-time weighting in deciseconds.
pub struct FastestWeighting {
    profile: Arc<dyn VehicleProfile>,
}

impl FastestWeighting {
    pub fn new(profile: Arc<dyn VehicleProfile>) -> Self {
        Self { profile }
    }
}

impl Weighting for FastestWeighting {
    fn name(&self) -> &'static str {
        "fastest"
    }

    fn profile(&self) -> &dyn VehicleProfile {
        self.profile.as_ref()
    }

    fn edge_weight(&self, graph: &RoadGraph, edge: EdgeId, reverse: bool) -> u32 {
        let rec = graph.edge(edge);
        if !self.profile.access(&rec.tags).allows(reverse) {
            return WEIGHT_INF;
        }
        let speed = self.profile.speed_mmps(&rec.tags);
        if speed == 0 {
            return WEIGHT_INF;
        }
        let ds = (rec.distance_mm as u64 * 10) / speed as u64;
        // Stay below the sentinel.
        ds.min((WEIGHT_INF - 1) as u64) as u32
    }

    fn is_time_based(&self) -> bool {
        true
    }
}

/// Distance weighting in millimeters.
pub struct ShortestWeighting {
    profile: Arc<dyn VehicleProfile>,
}

impl ShortestWeighting {
    pub fn new(profile: Arc<dyn VehicleProfile>) -> Self {
        Self { profile }
    }
}

impl Weighting for ShortestWeighting {
    fn name(&self) -> &'static str {
        "shortest"
    }

    fn profile(&self) -> &dyn VehicleProfile {
        self.profile.as_ref()
    }

    fn edge_weight(&self, graph: &RoadGraph, edge: EdgeId, reverse: bool) -> u32 {
        let rec = graph.edge(edge);
        if !self.profile.access(&rec.tags).allows(reverse) {
            return WEIGHT_INF;
        }
        rec.distance_mm.min(WEIGHT_INF - 1)
    }

    fn is_time_based(&self) -> bool {
        false
    }
}

pub const KNOWN_WEIGHTINGS: &[&str] = &["fastest", "shortest"];

pub fn create_weighting(
    name: &str,
    profile: Arc<dyn VehicleProfile>,
) -> Result<Arc<dyn Weighting>, CoreError> {
    match name {
        "fastest" => Ok(Arc::new(FastestWeighting::new(profile))),
        "shortest" => Ok(Arc::new(ShortestWeighting::new(profile))),
        _ => Err(CoreError::UnknownWeighting {
            requested: name.to_string(),
            available: KNOWN_WEIGHTINGS.join(", "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, WayTags};
    use crate::profiles::{kmh_to_mmps, CarProfile, FootProfile};

    fn one_edge_graph(tags: WayTags) -> RoadGraph {
        let mut b = GraphBuilder::new();
        let a = b.add_node(0.0, 0.0);
        let c = b.add_node(0.0, 0.001);
        b.add_edge(a, c, 100_000, tags);
        b.build()
    }

    #[test]
    fn test_fastest_deciseconds() {
        let g = one_edge_graph(WayTags {
            maxspeed_kph: Some(36),
            ..WayTags::default()
        });
        let w = FastestWeighting::new(Arc::new(CarProfile));
        // 100 m at 10 m/s = 10 s = 100 ds.
        assert_eq!(w.edge_weight(&g, 0, false), 100);
        assert_eq!(w.edge_weight(&g, 0, true), 100);
    }

    #[test]
    fn test_fastest_blocks_oneway_reverse() {
        let g = one_edge_graph(WayTags {
            oneway: true,
            maxspeed_kph: Some(36),
            ..WayTags::default()
        });
        let w = FastestWeighting::new(Arc::new(CarProfile));
        assert_eq!(w.edge_weight(&g, 0, false), 100);
        assert_eq!(w.edge_weight(&g, 0, true), WEIGHT_INF);
        // Foot ignores oneway.
        let wf = FastestWeighting::new(Arc::new(FootProfile));
        assert_eq!(wf.edge_weight(&g, 0, true), 1_000_000 / kmh_to_mmps(5.0));
    }

    #[test]
    fn test_shortest_millimeters() {
        let g = one_edge_graph(WayTags::default());
        let w = ShortestWeighting::new(Arc::new(CarProfile));
        assert_eq!(w.edge_weight(&g, 0, false), 100_000);
    }

    #[test]
    fn test_file_name_and_matches() {
        let w = FastestWeighting::new(Arc::new(CarProfile));
        assert_eq!(w.file_name(), "fastest_car");

        let hints = QueryHints::new().with(keys::WEIGHTING, "fastest");
        assert!(w.matches(&hints));
        let hints = hints.with(keys::VEHICLE, "foot");
        assert!(!w.matches(&hints));
        let hints = QueryHints::new().with(keys::WEIGHTING, "shortest");
        assert!(!w.matches(&hints));
        // No constraints at all matches anything.
        assert!(w.matches(&QueryHints::new()));
    }

    #[test]
    fn test_create_weighting_rejects_unknown() {
        let err = create_weighting("scenic", Arc::new(CarProfile)).unwrap_err();
        assert!(matches!(err, CoreError::UnknownWeighting { .. }));
    }
}
