//! Bounded exhaustive search for path covers of small point sets.
//!
//! The builder's lookahead asks whether a set of unconnected points can
//! still be split into chains of at most the chain capacity. The search
//! tries paths from the first free point in row-major order, growing
//! either end through adjacent points the caller accepts. It gives up
//! after [`SEARCH_BUDGET`] nodes and then answers optimistically, so a
//! `false` answer is always exact.

use crate::chain::ChainEnd;
use crate::non_crossing::segments_cross;
use crate::types::{Position, Segment};

/// Search nodes one query may visit before it assumes a cover exists.
pub const SEARCH_BUDGET: usize = 20_000;

/// A path that is already in progress and may keep growing into the set
/// before any new path starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPath {
    pub front: Position,
    pub back: Position,
    pub connections: usize,
}

/// Marker for a search that ran out of budget.
struct BudgetExhausted;

/// One cover query over a fixed point set.
pub struct PathCover<F> {
    points: Vec<Position>,
    used: Vec<bool>,
    segments: Vec<Segment>,
    capacity: usize,
    check_crossing: bool,
    compatible: F,
    budget: usize,
}

impl<F> PathCover<F>
where
    F: Fn(Position, Position) -> bool,
{
    /// Prepare a query over `points`.
    ///
    /// `compatible(a, b)` decides whether a connection between two
    /// adjacent points is allowed at all. With `check_crossing`, paths
    /// found by the search must also not cross each other.
    pub fn new(
        mut points: Vec<Position>,
        capacity: usize,
        check_crossing: bool,
        compatible: F,
    ) -> Self {
        points.sort_by_key(|p| (p.y, p.x));
        let used = vec![false; points.len()];
        Self {
            points,
            used,
            segments: Vec::new(),
            capacity,
            check_crossing,
            compatible,
            budget: SEARCH_BUDGET,
        }
    }

    /// Whether every point can be placed on a path of at most `capacity`
    /// connections.
    ///
    /// With a `seed`, the seed path may first absorb points from the set
    /// (its own points are not part of the set). Answers `true` when the
    /// budget runs out.
    pub fn is_coverable(mut self, seed: Option<SeedPath>) -> bool {
        let result = match seed {
            Some(seed) => self.grow(seed.front, seed.back, seed.connections, false),
            None => self.cover_rest(),
        };
        result.unwrap_or(true)
    }

    /// Start a new path at the first free point and cover everything.
    fn cover_rest(&mut self) -> Result<bool, BudgetExhausted> {
        let Some(start) = self.used.iter().position(|used| !used) else {
            return Ok(true);
        };
        self.used[start] = true;
        let p = self.points[start];
        let covered = self.grow(p, p, 0, true)?;
        if !covered {
            self.used[start] = false;
        }
        Ok(covered)
    }

    /// Extend the path `front..back`, or close it and cover the rest.
    ///
    /// A fresh path needs one connection before it may close; a seed may
    /// close at once.
    fn grow(
        &mut self,
        front: Position,
        back: Position,
        connections: usize,
        fresh: bool,
    ) -> Result<bool, BudgetExhausted> {
        self.budget = self.budget.checked_sub(1).ok_or(BudgetExhausted)?;

        if (connections >= 1 || !fresh) && self.cover_rest()? {
            return Ok(true);
        }
        if connections >= self.capacity {
            return Ok(false);
        }

        let ends = [
            (front != back).then_some((ChainEnd::Front, front)),
            Some((ChainEnd::Back, back)),
        ];
        for (end, endpoint) in ends.into_iter().flatten() {
            for i in 0..self.points.len() {
                let q = self.points[i];
                if self.used[i] || !endpoint.is_adjacent_to(q) || !self.allows(endpoint, q) {
                    continue;
                }
                self.used[i] = true;
                self.segments.push(Segment::new(endpoint, q));
                let covered = match end {
                    ChainEnd::Front => self.grow(q, back, connections + 1, fresh)?,
                    ChainEnd::Back => self.grow(front, q, connections + 1, fresh)?,
                };
                if covered {
                    return Ok(true);
                }
                self.used[i] = false;
                self.segments.pop();
            }
        }
        Ok(false)
    }

    fn allows(&self, a: Position, b: Position) -> bool {
        if !(self.compatible)(a, b) {
            return false;
        }
        let segment = Segment::new(a, b);
        !(self.check_crossing && self.segments.iter().any(|s| segments_cross(&segment, s)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const fn pos(x: u32, y: u32) -> Position {
        Position::new(x, y)
    }

    fn block(cols: u32, rows: u32) -> Vec<Position> {
        (0..rows)
            .flat_map(|y| (0..cols).map(move |x| pos(x, y)))
            .collect()
    }

    fn any_pair(_: Position, _: Position) -> bool {
        true
    }

    fn diagonal_only(a: Position, b: Position) -> bool {
        a.x != b.x && a.y != b.y
    }

    // --- Unseeded covers ---

    #[test]
    fn empty_set_is_covered() {
        assert!(PathCover::new(Vec::new(), 1, true, any_pair).is_coverable(None));
    }

    #[test]
    fn single_point_is_not_covered() {
        assert!(!PathCover::new(vec![pos(0, 0)], 3, true, any_pair).is_coverable(None));
    }

    #[test]
    fn pairs_need_an_even_count() {
        assert!(PathCover::new(block(4, 1), 1, true, any_pair).is_coverable(None));
        assert!(!PathCover::new(block(3, 1), 1, true, any_pair).is_coverable(None));
        assert!(PathCover::new(block(3, 1), 2, true, any_pair).is_coverable(None));
    }

    #[test]
    fn star_is_not_covered_by_paths() {
        // (1,1) with three diagonal leaves: a path takes at most two.
        let star = vec![pos(1, 1), pos(0, 0), pos(2, 0), pos(0, 2)];
        assert!(!PathCover::new(star, 5, false, diagonal_only).is_coverable(None));
    }

    #[test]
    fn crossing_paths_are_rejected_when_checked() {
        // Two diagonals of a square, nothing else allowed.
        let square = block(2, 2);
        assert!(PathCover::new(square.clone(), 1, false, diagonal_only).is_coverable(None));
        assert!(!PathCover::new(square, 1, true, diagonal_only).is_coverable(None));
    }

    // --- Seeded covers ---

    #[test]
    fn seed_absorbs_remaining_point() {
        let seed = SeedPath {
            front: pos(0, 0),
            back: pos(1, 0),
            connections: 1,
        };
        assert!(PathCover::new(vec![pos(2, 0)], 2, true, any_pair).is_coverable(Some(seed)));
    }

    #[test]
    fn full_seed_cannot_absorb() {
        let seed = SeedPath {
            front: pos(0, 0),
            back: pos(1, 0),
            connections: 2,
        };
        assert!(!PathCover::new(vec![pos(2, 0)], 2, true, any_pair).is_coverable(Some(seed)));
    }

    #[test]
    fn seed_may_stop_without_absorbing() {
        let seed = SeedPath {
            front: pos(0, 0),
            back: pos(1, 0),
            connections: 2,
        };
        assert!(
            PathCover::new(vec![pos(2, 0), pos(3, 0)], 2, true, any_pair)
                .is_coverable(Some(seed))
        );
    }
}
