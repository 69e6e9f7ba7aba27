pub mod cli;
pub mod core;
pub mod error;
pub mod filter;
pub mod graph;
pub mod hints;
pub mod matrix;
pub mod orchestrator;
pub mod profiles;
pub mod props;
pub mod registry;
pub mod validate;
pub mod weighting;

pub use crate::core::{CoreDijkstra, CoreHierarchy, QueryOutcome, RoutePath};
pub use crate::error::CoreError;
pub use crate::graph::RoadGraph;
pub use crate::orchestrator::{CoreConfig, CorePrepSet};
pub use crate::registry::{ProfileData, ProfileRegistry, RoutingProfile};
