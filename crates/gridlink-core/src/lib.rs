//! gridlink-core: cover a point grid with capacity-bounded linear chains
//! (sans-IO).
//!
//! Every cell of a `rows` x `cols` grid is joined into disjoint simple
//! paths using only 8-directional adjacency. Candidate connections pass
//! through a pluggable [`ConstraintEngine`] (degree, adjacency, distance
//! bounds, and an optional non-crossing rule) before the [`Grid`] commits
//! them, and a greedy [`ChainBuilder`] drives the covering either in one
//! call or one step at a time.
//!
//! This crate has **no I/O dependencies** -- rendering, interactive
//! controls, and animation pacing live with the caller.

pub mod builder;
pub mod chain;
pub mod constraint;
mod cover;
pub mod diagnostics;
pub mod distance;
pub mod grid;
pub mod non_crossing;
pub mod point;
pub mod types;

pub use builder::{BuildState, ChainBuilder};
pub use chain::{Chain, ChainEnd, ChainId};
pub use constraint::{
    BasicConstraint, ConnectionConstraint, ConstraintEngine, ValidationFailure, ValidationResult,
};
pub use diagnostics::{AuditReport, BuildDiagnostics, audit, fingerprint};
pub use distance::{MaxDistanceConstraint, MinDistanceConstraint};
pub use grid::Grid;
pub use non_crossing::{NonCrossingConstraint, segments_cross};
pub use point::Point;
pub use types::{BuildOutcome, CoverageStats, GridConfig, GridError, Position, Segment};

/// Build a grid from `config` and return an idle builder over it.
///
/// # Errors
///
/// Returns [`GridError::InvalidGridDimensions`] if `rows` or `cols` is
/// zero, [`GridError::InvalidChainCapacity`] if `max_connection_count` is
/// zero, or [`GridError::InvalidConfig`] for malformed distance bounds.
pub fn initialize(config: &GridConfig) -> Result<ChainBuilder, GridError> {
    ChainBuilder::from_config(config)
}
