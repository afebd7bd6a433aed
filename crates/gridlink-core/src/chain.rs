//! Capacity-bounded linear chains of grid points.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{GridError, Position, Segment};

/// Identifies a chain within one build. Assigned in creation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChainId(pub u32);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which end of a chain to extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEnd {
    /// The first point.
    Front,
    /// The last point.
    Back,
}

/// A simple path of points, grown only at its two endpoints.
///
/// The chain stores positions; connection state lives on the grid's
/// points. `connection_count() == len() - 1` never exceeds the capacity
/// fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    id: ChainId,
    max_connection_count: u32,
    points: VecDeque<Position>,
}

impl Chain {
    /// Create an empty chain.
    #[must_use]
    pub const fn new(id: ChainId, max_connection_count: u32) -> Self {
        Self {
            id,
            max_connection_count,
            points: VecDeque::new(),
        }
    }

    /// The chain identifier.
    #[must_use]
    pub const fn id(&self) -> ChainId {
        self.id
    }

    /// Maximum number of connections this chain may hold.
    #[must_use]
    pub const fn max_connection_count(&self) -> u32 {
        self.max_connection_count
    }

    /// Number of member points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the chain has no points yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of connections (`len() - 1`, or 0 when empty).
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Returns `true` once the chain holds its maximum connections.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.connection_count() >= self.max_connection_count as usize
    }

    /// Returns `true` if `p` is a member.
    #[must_use]
    pub fn contains(&self, p: Position) -> bool {
        self.points.contains(&p)
    }

    /// Member positions from front to back.
    pub fn points(&self) -> impl ExactSizeIterator<Item = Position> + '_ {
        self.points.iter().copied()
    }

    /// The point at `end`, if the chain is non-empty.
    #[must_use]
    pub fn end(&self, end: ChainEnd) -> Option<Position> {
        match end {
            ChainEnd::Front => self.points.front().copied(),
            ChainEnd::Back => self.points.back().copied(),
        }
    }

    /// Points eligible for extension, each paired with its end.
    ///
    /// A single-point chain has one endpoint; longer chains have two,
    /// front first.
    #[must_use]
    pub fn endpoints(&self) -> Vec<(ChainEnd, Position)> {
        match (self.points.front(), self.points.back()) {
            (Some(&front), Some(&back)) if self.points.len() > 1 => {
                vec![(ChainEnd::Front, front), (ChainEnd::Back, back)]
            }
            (Some(&only), _) => vec![(ChainEnd::Back, only)],
            _ => Vec::new(),
        }
    }

    /// Consecutive connections as normalized segments.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.points
            .iter()
            .zip(self.points.iter().skip(1))
            .map(|(&a, &b)| Segment::new(a, b))
    }

    /// Append `p` at whichever endpoint it is adjacent to (back first).
    ///
    /// # Errors
    ///
    /// See [`add_point_at`](Self::add_point_at); additionally returns
    /// [`GridError::NotAdjacent`] if `p` touches neither endpoint.
    pub fn add_point(&mut self, p: Position) -> Result<ChainEnd, GridError> {
        let end = match (self.points.back(), self.points.front()) {
            (None, _) => ChainEnd::Back,
            (Some(&back), _) if back.is_adjacent_to(p) => ChainEnd::Back,
            (_, Some(&front)) if front.is_adjacent_to(p) => ChainEnd::Front,
            (Some(&back), _) => return Err(GridError::NotAdjacent(back, p)),
        };
        self.add_point_at(end, p)?;
        Ok(end)
    }

    /// Extend the chain at `end` with `p`.
    ///
    /// The first point of an empty chain may be added at either end.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ChainFull`] if the chain is at capacity,
    /// [`GridError::AlreadyInChain`] if `p` is already a member, or
    /// [`GridError::NotAdjacent`] if `p` is not adjacent to that end.
    pub fn add_point_at(&mut self, end: ChainEnd, p: Position) -> Result<(), GridError> {
        if self.contains(p) {
            return Err(GridError::AlreadyInChain(p));
        }
        let Some(anchor) = self.end(end) else {
            self.points.push_back(p);
            return Ok(());
        };
        if self.is_full() {
            return Err(GridError::ChainFull(self.id));
        }
        if !anchor.is_adjacent_to(p) {
            return Err(GridError::NotAdjacent(anchor, p));
        }
        match end {
            ChainEnd::Front => self.points.push_front(p),
            ChainEnd::Back => self.points.push_back(p),
        }
        Ok(())
    }

    /// Structural check: adjacent consecutive members, no repeats, and
    /// within capacity.
    #[must_use]
    pub fn is_valid_chain(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.points.len());
        let unique = self.points.iter().all(|p| seen.insert(*p));
        let adjacent = self
            .points
            .iter()
            .zip(self.points.iter().skip(1))
            .all(|(a, b)| a.is_adjacent_to(*b));
        unique && adjacent && self.connection_count() <= self.max_connection_count as usize
    }
}
