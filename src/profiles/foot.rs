//! Foot routing profile - pedestrian access and a flat walking speed
//!
//! Pedestrians ignore oneway and use a constant speed, so `maxspeed_kph`
//! never applies here.

use crate::graph::{HighwayClass, WayTags};
use crate::profiles::{kmh_to_mmps, Access, VehicleProfile};

const WALKING_KMH: f64 = 5.0;

pub struct FootProfile;

impl VehicleProfile for FootProfile {
    fn name(&self) -> &'static str {
        "foot"
    }

    fn access(&self, tags: &WayTags) -> Access {
        if let Some(allowed) = tags.foot {
            return if allowed { Access::BOTH } else { Access::NONE };
        }
        match tags.highway {
            HighwayClass::Motorway | HighwayClass::Trunk => Access::NONE,
            HighwayClass::Cycleway => Access::NONE,
            _ => Access::BOTH,
        }
    }

    fn speed_mmps(&self, _tags: &WayTags) -> u32 {
        kmh_to_mmps(WALKING_KMH)
    }
}
