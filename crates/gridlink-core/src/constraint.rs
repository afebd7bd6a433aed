//! Connection constraints: pluggable predicates that a candidate
//! connection must satisfy before the grid commits it.
//!
//! This module defines the [`ConnectionConstraint`] trait, the
//! [`ConstraintEngine`] registry that evaluates constraints in
//! registration order, and the cheap structural predicates
//! ([`BasicConstraint`]) registered ahead of the geometric ones.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::distance::{MaxDistanceConstraint, MinDistanceConstraint};
use crate::grid::Grid;
use crate::non_crossing::NonCrossingConstraint;
use crate::point::Point;
use crate::types::{GridConfig, GridError, Segment};

/// A named predicate over candidate connections.
///
/// Constraints that depend on committed state (such as
/// [`NonCrossingConstraint`]) receive every committed segment through
/// [`record_connection`](Self::record_connection), whether or not they
/// are currently enabled, so re-enabling them is always consistent.
pub trait ConnectionConstraint: fmt::Debug {
    /// Registry key. Must be unique within an engine.
    fn name(&self) -> &str;

    /// Human-readable description of what the constraint enforces.
    fn description(&self) -> String;

    /// Returns `true` if connecting `p1` and `p2` satisfies the constraint.
    fn validate(&self, grid: &Grid, p1: &Point, p2: &Point) -> bool;

    /// Observe a newly committed connection.
    fn record_connection(&mut self, _segment: Segment) {}

    /// Forget all observed connections.
    fn clear(&mut self) {}
}

/// Cheap structural predicates evaluated before anything geometric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasicConstraint {
    /// Both points must have fewer than two connections.
    Degree,

    /// The points must be distinct and 8-directionally adjacent.
    Adjacency,

    /// The points must not already be linked.
    Unlinked,
}

impl BasicConstraint {
    /// All variants in evaluation order.
    pub const ALL: [Self; 3] = [Self::Degree, Self::Adjacency, Self::Unlinked];
}

impl ConnectionConstraint for BasicConstraint {
    fn name(&self) -> &str {
        match self {
            Self::Degree => "degree",
            Self::Adjacency => "adjacency",
            Self::Unlinked => "unlinked",
        }
    }

    fn description(&self) -> String {
        match self {
            Self::Degree => "limits every point to two connections".to_owned(),
            Self::Adjacency => "only connects 8-directionally adjacent points".to_owned(),
            Self::Unlinked => "forbids connecting points that are already linked".to_owned(),
        }
    }

    fn validate(&self, _grid: &Grid, p1: &Point, p2: &Point) -> bool {
        match self {
            Self::Degree => p1.can_accept_connection() && p2.can_accept_connection(),
            Self::Adjacency => p1.is_adjacent_to(p2),
            Self::Unlinked => !p1.is_linked_to(p2.position()),
        }
    }
}

/// One constraint that rejected a candidate connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Name of the rejecting constraint.
    pub constraint: String,
    /// Why it rejected the connection.
    pub reason: String,
}

/// Outcome of a full constraint evaluation.
///
/// Lists every enabled constraint that rejected the candidate, in
/// registration order. Used for diagnostics; the builder's hot path uses
/// the boolean [`ConstraintEngine::allows`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    failures: Vec<ValidationFailure>,
}

impl ValidationResult {
    /// Returns `true` if no enabled constraint rejected the candidate.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Rejecting constraints in registration order.
    #[must_use]
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Names of the rejecting constraints.
    pub fn failed_constraints(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.constraint.as_str())
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return f.write_str("all constraints passed");
        }
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.constraint, failure.reason)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct ConstraintEntry {
    constraint: Box<dyn ConnectionConstraint>,
    enabled: bool,
}

/// Ordered registry of constraints with per-entry enabled flags.
///
/// Entries are evaluated in registration order, so cheap predicates
/// should be added before expensive geometric ones.
#[derive(Debug, Default)]
pub struct ConstraintEngine {
    entries: Vec<ConstraintEntry>,
}

impl ConstraintEngine {
    /// Create an empty engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create the engine described by `config`.
    ///
    /// Registration order: [`BasicConstraint::ALL`], then the distance
    /// bounds that are configured, then [`NonCrossingConstraint`] (always
    /// registered, enabled per `config.non_crossing`).
    #[must_use]
    pub fn from_config(config: &GridConfig) -> Self {
        let mut entries: Vec<ConstraintEntry> = BasicConstraint::ALL
            .into_iter()
            .map(|c| ConstraintEntry {
                constraint: Box::new(c),
                enabled: true,
            })
            .collect();
        if let Some(max) = config.max_distance {
            entries.push(ConstraintEntry {
                constraint: Box::new(MaxDistanceConstraint::new(max)),
                enabled: true,
            });
        }
        if let Some(min) = config.min_distance {
            entries.push(ConstraintEntry {
                constraint: Box::new(MinDistanceConstraint::new(min)),
                enabled: true,
            });
        }
        entries.push(ConstraintEntry {
            constraint: Box::new(NonCrossingConstraint::new()),
            enabled: config.non_crossing,
        });
        Self { entries }
    }

    /// Append a constraint to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DuplicateConstraint`] if a constraint with the
    /// same name is already registered.
    pub fn add(
        &mut self,
        constraint: Box<dyn ConnectionConstraint>,
        enabled: bool,
    ) -> Result<(), GridError> {
        if self.position(constraint.name()).is_some() {
            return Err(GridError::DuplicateConstraint(constraint.name().to_owned()));
        }
        self.entries.push(ConstraintEntry {
            constraint,
            enabled,
        });
        Ok(())
    }

    /// Remove a constraint by name, returning it if it was registered.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn ConnectionConstraint>> {
        let index = self.position(name)?;
        Some(self.entries.remove(index).constraint)
    }

    /// Look up a constraint by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn ConnectionConstraint> {
        self.entries
            .iter()
            .find(|e| e.constraint.name() == name)
            .map(|e| e.constraint.as_ref())
    }

    /// Set the enabled flag. Returns `false` if no such constraint exists.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.position(name) {
            Some(index) => {
                self.entries[index].enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Enable a constraint. Returns `false` if no such constraint exists.
    pub fn enable(&mut self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    /// Disable a constraint. Returns `false` if no such constraint exists.
    pub fn disable(&mut self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    /// Returns `true` if the constraint exists and is enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.position(name).is_some_and(|i| self.entries[i].enabled)
    }

    /// Registered names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.constraint.name())
    }

    /// Number of registered constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of enabled constraints.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled).count()
    }

    /// Remove every constraint.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Fast path: `true` iff every enabled constraint accepts.
    ///
    /// Stops at the first rejection.
    #[must_use]
    pub fn allows(&self, grid: &Grid, p1: &Point, p2: &Point) -> bool {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .all(|e| e.constraint.validate(grid, p1, p2))
    }

    /// Full evaluation listing every rejecting enabled constraint.
    #[must_use]
    pub fn evaluate(&self, grid: &Grid, p1: &Point, p2: &Point) -> ValidationResult {
        let failures = self
            .entries
            .iter()
            .filter(|e| e.enabled && !e.constraint.validate(grid, p1, p2))
            .map(|e| ValidationFailure {
                constraint: e.constraint.name().to_owned(),
                reason: format!(
                    "connection {} violates: {}",
                    Segment::new(p1.position(), p2.position()),
                    e.constraint.description()
                ),
            })
            .collect();
        ValidationResult { failures }
    }

    /// Forward a committed connection to every constraint.
    pub(crate) fn record_connection(&mut self, segment: Segment) {
        for entry in &mut self.entries {
            entry.constraint.record_connection(segment);
        }
    }

    /// Clear tracked state on every constraint.
    pub(crate) fn clear_tracking(&mut self) {
        for entry in &mut self.entries {
            entry.constraint.clear();
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.constraint.name() == name)
    }
}
