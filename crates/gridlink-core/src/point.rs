//! Grid points and their symmetric neighbor links.

use serde::{Deserialize, Serialize};

use crate::chain::ChainId;
use crate::types::{GridError, Position, Segment};

/// Maximum number of connections a point may hold.
pub const MAX_DEGREE: usize = 2;

/// A single grid cell.
///
/// Points are owned by the [`Grid`](crate::Grid); neighbor links are stored
/// as [`Position`]s and only ever traversed through the grid. Links are
/// symmetric: if `a` lists `b`, then `b` lists `a`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    position: Position,
    chain: Option<ChainId>,
    links: Vec<Position>,
}

impl Point {
    /// Create an unconnected point at `position`.
    #[must_use]
    pub const fn new(position: Position) -> Self {
        Self {
            position,
            chain: None,
            links: Vec::new(),
        }
    }

    /// The point's coordinate.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Column index.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.position.x
    }

    /// Row index.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.position.y
    }

    /// Returns `true` once the point belongs to a chain.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.chain.is_some()
    }

    /// The chain this point belongs to, if any.
    #[must_use]
    pub const fn chain(&self) -> Option<ChainId> {
        self.chain
    }

    /// Number of direct connections.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.links.len()
    }

    /// Linked neighbor positions in connection order.
    #[must_use]
    pub fn links(&self) -> &[Position] {
        &self.links
    }

    /// Returns `true` if another connection would fit.
    #[must_use]
    pub fn can_accept_connection(&self) -> bool {
        self.links.len() < MAX_DEGREE
    }

    /// Returns `true` if the point is a path endpoint (degree ≤ 1).
    #[must_use]
    pub fn is_endpoint(&self) -> bool {
        self.links.len() <= 1
    }

    /// Returns `true` if this point is directly linked to `other`.
    #[must_use]
    pub fn is_linked_to(&self, other: Position) -> bool {
        self.links.contains(&other)
    }

    /// Returns `true` if `other` is one of the 8 surrounding cells.
    #[must_use]
    pub const fn is_adjacent_to(&self, other: &Self) -> bool {
        self.position.is_adjacent_to(other.position)
    }

    /// Link two points symmetrically.
    ///
    /// Either both points gain the link or neither does.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DegreeExceeded`] if either point already has
    /// [`MAX_DEGREE`] connections, or [`GridError::DuplicateConnection`]
    /// if the two are already linked.
    pub fn add_connection(&mut self, other: &mut Self) -> Result<(), GridError> {
        if self.is_linked_to(other.position) {
            return Err(GridError::DuplicateConnection(Segment::new(
                self.position,
                other.position,
            )));
        }
        for point in [&*self, &*other] {
            if !point.can_accept_connection() {
                return Err(GridError::DegreeExceeded(point.position));
            }
        }
        self.links.push(other.position);
        other.links.push(self.position);
        Ok(())
    }

    /// Record chain membership.
    pub(crate) const fn set_chain(&mut self, chain: ChainId) {
        self.chain = Some(chain);
    }

    /// Clear all links and chain membership.
    pub fn reset(&mut self) {
        self.links.clear();
        self.chain = None;
    }
}
