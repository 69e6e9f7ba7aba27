//! Configuration and lifecycle faults for the core routing engine.
//!
//! These are programming or configuration errors surfaced to the caller.
//! Per-query conditions (no route, visited-node budget exhausted) are not
//! errors; they are reported through `QueryOutcome`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The weighting list handed to the orchestrator was empty.
    #[error("at least one weighting is required for core preparation")]
    EmptyWeightings,

    /// A preparation was registered against a different weighting than the
    /// one added at the same position.
    #[error("preparation #{index} was built for weighting '{prepared}' but slot holds '{expected}'")]
    WeightingMismatch {
        index: usize,
        prepared: String,
        expected: String,
    },

    /// `add_preparation` was called more often than `add_weighting`.
    #[error("no weighting registered for preparation #{index}; call add_weighting first")]
    MissingWeighting { index: usize },

    /// Lookup was attempted while the engine is disabled, either globally or
    /// through a per-request disable hint.
    #[error("core routing is disabled for this request")]
    Disabled,

    /// Lookup ran before any preparation was registered.
    #[error("no core preparations registered; prepare the graph first")]
    NotPrepared,

    /// The requested weighting matches none of the prepared hierarchies.
    #[error("no prepared core hierarchy for '{requested}', available: [{available}]")]
    UnknownWeighting { requested: String, available: String },

    /// Configuration names a vehicle no profile implements.
    #[error("unknown vehicle '{requested}', available: [{available}]")]
    UnknownVehicle { requested: String, available: String },

    /// The requested weighting matches more than one prepared hierarchy.
    #[error("ambiguous weighting '{requested}' matches {matches} prepared hierarchies")]
    AmbiguousWeighting { requested: String, matches: usize },

    /// A preparation task failed; the remaining batch was aborted.
    #[error("core preparation for '{weighting}' failed: {reason}")]
    PrepareFailed { weighting: String, reason: String },

    /// A hierarchy swap gave up waiting for in-flight queries to drain.
    #[error("hierarchy swap for profile '{profile}' timed out after {waited_ms} ms with {in_use} queries in flight")]
    SwapTimedOut {
        profile: String,
        waited_ms: u64,
        in_use: usize,
    },
}
