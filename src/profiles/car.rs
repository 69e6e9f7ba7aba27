//! Car routing profile - tag semantics for automobile routing

use crate::graph::{HighwayClass, WayTags};
use crate::profiles::{kmh_to_mmps, Access, VehicleProfile};

pub struct CarProfile;

impl VehicleProfile for CarProfile {
    fn name(&self) -> &'static str {
        "car"
    }

    fn access(&self, tags: &WayTags) -> Access {
        if tags.motor_vehicle == Some(false) {
            return Access::NONE;
        }
        let routable = match tags.highway {
            HighwayClass::Motorway
            | HighwayClass::Trunk
            | HighwayClass::Primary
            | HighwayClass::Secondary
            | HighwayClass::Tertiary
            | HighwayClass::Residential
            | HighwayClass::Service => true,
            // Explicit motor_vehicle=yes opens tracks and the like.
            _ => tags.motor_vehicle == Some(true),
        };
        if !routable {
            return Access::NONE;
        }
        if tags.oneway {
            Access::FORWARD
        } else {
            Access::BOTH
        }
    }

    fn speed_mmps(&self, tags: &WayTags) -> u32 {
        if let Some(kph) = tags.maxspeed_kph {
            return kmh_to_mmps(kph as f64);
        }
        let kmh = match tags.highway {
            HighwayClass::Motorway => 110.0,
            HighwayClass::Trunk => 90.0,
            HighwayClass::Primary => 70.0,
            HighwayClass::Secondary => 60.0,
            HighwayClass::Tertiary => 50.0,
            HighwayClass::Residential => 30.0,
            HighwayClass::Service => 20.0,
            HighwayClass::Track => 15.0,
            _ => 0.0,
        };
        kmh_to_mmps(kmh)
    }
}
