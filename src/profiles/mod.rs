//! Built-in vehicle profiles for different travel modes
//!
//! Each profile implements tag semantics for access and speed. A profile is
//! the capability a weighting needs from a vehicle; nothing here knows about
//! hierarchies or queries.

use std::sync::Arc;

use crate::graph::WayTags;

pub mod bike;
pub mod car;
pub mod foot;

pub use bike::BikeProfile;
pub use car::CarProfile;
pub use foot::FootProfile;

/// Per-direction access along an edge's stored orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub fwd: bool,
    pub rev: bool,
}

impl Access {
    pub const NONE: Access = Access { fwd: false, rev: false };
    pub const FORWARD: Access = Access { fwd: true, rev: false };
    pub const BOTH: Access = Access { fwd: true, rev: true };

    #[inline]
    pub fn allows(&self, reverse: bool) -> bool {
        if reverse {
            self.rev
        } else {
            self.fwd
        }
    }
}

/// What a weighting needs from a vehicle: a stable name for hierarchy
/// identity, access rules, and a travel speed.
pub trait VehicleProfile: Send + Sync {
    fn name(&self) -> &'static str;

    fn access(&self, tags: &WayTags) -> Access;

    /// Travel speed in mm/s; `0` means the edge is unusable even if access
    /// rules would admit it.
    fn speed_mmps(&self, tags: &WayTags) -> u32;
}

pub fn by_name(name: &str) -> Option<Arc<dyn VehicleProfile>> {
    match name {
        "car" => Some(Arc::new(CarProfile)),
        "foot" => Some(Arc::new(FootProfile)),
        "bike" => Some(Arc::new(BikeProfile)),
        _ => None,
    }
}

pub fn known_names() -> &'static [&'static str] {
    &["car", "foot", "bike"]
}

/// Convert km/h to mm/s (integer)
pub fn kmh_to_mmps(kmh: f64) -> u32 {
    ((kmh * 1000.0 / 3.6).round() as u32).min(80_000) // Cap at 80 m/s (288 km/h)
}
