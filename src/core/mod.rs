//! Core-retaining contraction hierarchies.
//!
//! Preparation contracts the periphery of the graph but leaves restricted
//! edges and their endpoints uncontracted; queries run a bidirectional
//! Dijkstra that uses shortcuts outside the core and consults per-query
//! filters inside it.

pub mod hierarchy;
pub mod prepare;
pub mod query;
pub mod sweep;

pub use hierarchy::{CoreHierarchy, CoreStats, Shortcut};
pub use prepare::{ContractionStats, PrepareCore, PrepareParams};
pub use query::{CoreDijkstra, QueryOutcome, RoutePath, SearchState};
pub use sweep::{sweep, SweepResult};
