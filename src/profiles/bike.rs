//! Bike routing profile - cyclist access rules and class-based speeds

use crate::graph::{HighwayClass, WayTags};
use crate::profiles::{kmh_to_mmps, Access, VehicleProfile};

pub struct BikeProfile;

impl VehicleProfile for BikeProfile {
    fn name(&self) -> &'static str {
        "bike"
    }

    fn access(&self, tags: &WayTags) -> Access {
        if let Some(allowed) = tags.bicycle {
            if !allowed {
                return Access::NONE;
            }
        } else if matches!(tags.highway, HighwayClass::Motorway | HighwayClass::Trunk) {
            return Access::NONE;
        }
        if tags.oneway {
            Access::FORWARD
        } else {
            Access::BOTH
        }
    }

    fn speed_mmps(&self, tags: &WayTags) -> u32 {
        let class_kmh: f64 = match tags.highway {
            HighwayClass::Cycleway => 18.0,
            HighwayClass::Primary | HighwayClass::Secondary => 18.0,
            HighwayClass::Tertiary | HighwayClass::Residential => 16.0,
            HighwayClass::Service | HighwayClass::Track => 12.0,
            HighwayClass::Path | HighwayClass::Footway | HighwayClass::Pedestrian => 10.0,
            _ => 14.0,
        };
        // A posted car limit below cycling speed caps it (living streets etc).
        let kmh = match tags.maxspeed_kph {
            Some(kph) => class_kmh.min(kph as f64),
            None => class_kmh,
        };
        kmh_to_mmps(kmh)
    }
}
