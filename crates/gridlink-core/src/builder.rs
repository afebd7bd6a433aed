//! Greedy chain covering.
//!
//! # Algorithm
//!
//! 1. **Start selection:** among unconnected points (row-major order),
//!    count each point's valid candidates: unconnected neighbors it could
//!    connect to under every enabled constraint. Points with no candidate
//!    are skipped. The point with the fewest candidates starts the next
//!    chain; ties go to the first in row-major order. If no unconnected
//!    point remains the build is complete; if none has a candidate the
//!    build is stuck.
//! 2. **Extension:** for each chain endpoint (front, then back) and each
//!    neighbor in [`NEIGHBOR_OFFSETS`](crate::grid::NEIGHBOR_OFFSETS)
//!    order, an unconnected neighbor that passes the constraints scores
//!    the number of its own unconnected neighbors. The lowest score is
//!    committed; ties go to the first enumerated. Points with few free
//!    neighbors are consumed before they become isolated.
//!
//!    Before scoring, each candidate is checked for stranding: whether
//!    committing it would leave a nearby unconnected point with no
//!    possible partner, or a small component of unconnected points that
//!    no set of capacity-bounded chains could cover (a bounded exhaustive
//!    search, with the current chain allowed to absorb the points it can
//!    reach). Stranding candidates are never committed once the chain has
//!    a connection; the chain is finalized early instead, so a shorter
//!    chain leaves room for its neighbors.
//! 3. **Finalization:** a chain stops growing when it is full or no
//!    candidate remains, then step 1 repeats.
//!
//! The whole procedure is deterministic. [`ChainBuilder::build_step`]
//! performs one state transition so callers can pace the build;
//! [`ChainBuilder::build_all`] runs it to completion.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use web_time::Instant;

use crate::chain::{Chain, ChainEnd, ChainId};
use crate::cover::{PathCover, SeedPath};
use crate::diagnostics::BuildDiagnostics;
use crate::grid::Grid;
use crate::non_crossing::{NonCrossingConstraint, segments_cross};
use crate::point::Point;
use crate::types::{BuildOutcome, CoverageStats, GridConfig, GridError, Position, Segment};

/// Where the builder is in its state machine.
///
/// ```text
/// Idle -> SelectingStart -> ExtendingChain -> ChainComplete -> SelectingStart ...
///                                          \-> AllCovered | Stuck
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildState {
    /// No build in progress.
    Idle,
    /// The next step picks a start point.
    SelectingStart,
    /// The next step extends the current chain.
    ExtendingChain,
    /// A chain was just finalized; the next step picks a start point.
    ChainComplete,
    /// Every point belongs to a chain.
    AllCovered,
    /// Unconnected points remain but none can start a chain.
    Stuck,
}

impl BuildState {
    /// Returns `true` for [`AllCovered`](Self::AllCovered) and
    /// [`Stuck`](Self::Stuck).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::AllCovered | Self::Stuck)
    }
}

/// Outcome of a start-point search.
enum StartSelection {
    Start(Position),
    AllCovered,
    Stuck,
}

/// A scored extension candidate.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    end: ChainEnd,
    endpoint: Position,
    point: Position,
    score: usize,
    strands: bool,
}

/// Covers a [`Grid`] with chains, either in one call or step by step.
///
/// The builder owns its grid. Stopping between steps always leaves a
/// valid partial state: every committed connection satisfies every
/// invariant.
#[derive(Debug)]
pub struct ChainBuilder {
    grid: Grid,
    max_connection_count: u32,
    chains: Vec<Chain>,
    current: Option<Chain>,
    next_chain_id: u32,
    state: BuildState,
    diagnostics: BuildDiagnostics,
}

impl ChainBuilder {
    /// Create a builder over `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidChainCapacity`] if
    /// `max_connection_count` is zero.
    pub fn new(grid: Grid, max_connection_count: u32) -> Result<Self, GridError> {
        if max_connection_count == 0 {
            return Err(GridError::InvalidChainCapacity(max_connection_count));
        }
        Ok(Self {
            grid,
            max_connection_count,
            chains: Vec::new(),
            current: None,
            next_chain_id: 0,
            state: BuildState::Idle,
            diagnostics: BuildDiagnostics::default(),
        })
    }

    /// Create a grid from `config` and a builder over it.
    ///
    /// # Errors
    ///
    /// Returns any error from [`GridConfig::validate`].
    pub fn from_config(config: &GridConfig) -> Result<Self, GridError> {
        let grid = Grid::new(config)?;
        Self::new(grid, config.max_connection_count)
    }

    /// The grid being covered.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable grid access, for toggling constraints between builds.
    pub const fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Chain capacity in connections.
    #[must_use]
    pub const fn max_connection_count(&self) -> u32 {
        self.max_connection_count
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> BuildState {
        self.state
    }

    /// Finalized chains in creation order.
    #[must_use]
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// The chain being extended, if any.
    #[must_use]
    pub const fn current_chain(&self) -> Option<&Chain> {
        self.current.as_ref()
    }

    /// Counters and timing for the current build.
    #[must_use]
    pub const fn diagnostics(&self) -> &BuildDiagnostics {
        &self.diagnostics
    }

    /// Returns `true` once the build reached a terminal state.
    #[must_use]
    pub const fn is_animation_complete(&self) -> bool {
        self.state.is_terminal()
    }

    /// Uncovered points in row-major order when the build is
    /// [`Stuck`](BuildState::Stuck), otherwise `None`.
    #[must_use]
    pub fn residual(&self) -> Option<Vec<Position>> {
        (self.state == BuildState::Stuck).then(|| {
            self.grid
                .unconnected_points()
                .map(Point::position)
                .collect()
        })
    }

    /// The finalized chains and residual as a [`BuildOutcome`].
    #[must_use]
    pub fn outcome(&self) -> BuildOutcome {
        BuildOutcome {
            chains: self.chains.clone(),
            residual: self.residual(),
        }
    }

    /// Clear the grid and every chain and return to
    /// [`Idle`](BuildState::Idle). Constraint settings are kept.
    pub fn reset(&mut self) {
        self.grid.reset();
        self.chains.clear();
        self.current = None;
        self.next_chain_id = 0;
        self.state = BuildState::Idle;
        self.diagnostics = BuildDiagnostics::default();
    }

    /// Reset and prepare for step-wise building.
    pub fn start_animated_build(&mut self) {
        self.reset();
        self.state = BuildState::SelectingStart;
        debug!(
            rows = self.grid.rows(),
            cols = self.grid.cols(),
            max_connection_count = self.max_connection_count,
            "build started"
        );
    }

    /// Run a fresh build to completion.
    pub fn build_all(&mut self) -> BuildOutcome {
        self.start_animated_build();
        while self.build_step() {}
        self.outcome()
    }

    /// Perform one state transition.
    ///
    /// A step is one start selection or one candidate commit. A commit
    /// that fills the chain also finalizes it in the same call, leaving
    /// the builder in [`ChainComplete`](BuildState::ChainComplete) (or
    /// [`AllCovered`](BuildState::AllCovered) if nothing is left). A step
    /// that finds no committable candidate finalizes the chain without
    /// committing.
    ///
    /// Returns `true` while more steps remain. Calling it in
    /// [`Idle`](BuildState::Idle) or a terminal state does nothing and
    /// returns `false`.
    pub fn build_step(&mut self) -> bool {
        let started = Instant::now();
        let result = match self.state {
            BuildState::Idle | BuildState::AllCovered | BuildState::Stuck => return false,
            BuildState::SelectingStart | BuildState::ChainComplete => self.start_chain(),
            BuildState::ExtendingChain => self.extend_chain(),
        };
        if let Err(err) = result {
            // Candidates are pre-validated, so this only fires if the
            // grid and the chains disagree.
            warn!(%err, "build step failed; stopping");
            if let Some(chain) = self.current.take() {
                self.finalize(chain);
            }
            self.state = BuildState::Stuck;
        }
        self.diagnostics.steps += 1;
        self.diagnostics.duration += started.elapsed();
        if self.state.is_terminal() {
            self.diagnostics.final_state = Some(self.state);
        }
        !self.state.is_terminal()
    }

    /// Coverage summary for the current grid state.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage_stats(&self) -> CoverageStats {
        let total_points = self.grid.total_points();
        let connected_points = self.grid.connected_count();
        let coverage_percentage = if total_points > 0 {
            connected_points as f64 / total_points as f64 * 100.0
        } else {
            0.0
        };
        let average_chain_length = if self.chains.is_empty() {
            0.0
        } else {
            let connections: usize = self.chains.iter().map(Chain::connection_count).sum();
            connections as f64 / self.chains.len() as f64
        };
        CoverageStats {
            total_points,
            connected_points,
            unconnected_points: total_points - connected_points,
            coverage_percentage,
            total_chains: self.chains.len(),
            average_chain_length,
        }
    }

    /// Returns `true` if every point is covered, every chain is
    /// structurally valid, and no point appears in two chains.
    #[must_use]
    pub fn validate_solution(&self) -> bool {
        if self.grid.unconnected_points().next().is_some() {
            return false;
        }
        if !self.chains.iter().all(Chain::is_valid_chain) {
            return false;
        }
        let mut seen = HashSet::with_capacity(self.grid.total_points());
        self.chains
            .iter()
            .flat_map(|c| c.points())
            .all(|p| seen.insert(p))
    }

    // --- Start selection ---

    /// Unconnected neighbors of `p` that `p` may connect to.
    fn valid_candidate_count(&self, p: Position) -> usize {
        self.grid
            .neighbors(p)
            .filter(|&q| self.is_unconnected(q) && self.grid.allows_connection(p, q))
            .count()
    }

    fn is_unconnected(&self, p: Position) -> bool {
        self.grid.point(p).is_some_and(|point| !point.is_connected())
    }

    fn select_start(&self) -> StartSelection {
        let mut any_unconnected = false;
        let mut best: Option<(usize, Position)> = None;
        for point in self.grid.unconnected_points() {
            any_unconnected = true;
            let count = self.valid_candidate_count(point.position());
            if count == 0 {
                continue;
            }
            if best.is_none_or(|(best_count, _)| count < best_count) {
                best = Some((count, point.position()));
                // Nothing can beat a single candidate.
                if count == 1 {
                    break;
                }
            }
        }
        match best {
            Some((_, p)) => StartSelection::Start(p),
            None if any_unconnected => StartSelection::Stuck,
            None => StartSelection::AllCovered,
        }
    }

    fn start_chain(&mut self) -> Result<(), GridError> {
        match self.select_start() {
            StartSelection::AllCovered => {
                debug!(chains = self.chains.len(), "all points covered");
                self.state = BuildState::AllCovered;
            }
            StartSelection::Stuck => {
                debug!(
                    chains = self.chains.len(),
                    uncovered = self.grid.total_points() - self.grid.connected_count(),
                    "no unconnected point can start a chain"
                );
                self.state = BuildState::Stuck;
            }
            StartSelection::Start(p) => {
                let id = ChainId(self.next_chain_id);
                let mut chain = Chain::new(id, self.max_connection_count);
                chain.add_point_at(ChainEnd::Back, p)?;
                self.grid.assign_chain(p, id)?;
                self.next_chain_id += 1;
                self.diagnostics.start_selections += 1;
                debug!(chain = %id, start = %p, "chain started");
                self.current = Some(chain);
                self.state = BuildState::ExtendingChain;
            }
        }
        Ok(())
    }

    // --- Extension ---

    /// Valid extension candidates, best first, plus the number of
    /// constraint rejections seen.
    ///
    /// Candidates that would strand a neighbor sort after those that
    /// would not; within each group the lower score wins and ties keep
    /// enumeration order.
    fn extension_candidates(&self, chain: &Chain) -> (Vec<Candidate>, usize) {
        let mut candidates = Vec::new();
        let mut rejected = 0;
        for (end, endpoint) in chain.endpoints() {
            for point in self.grid.neighbors(endpoint) {
                if !self.is_unconnected(point) {
                    continue;
                }
                if !self.grid.allows_connection(endpoint, point) {
                    rejected += 1;
                    continue;
                }
                let mut candidate = Candidate {
                    end,
                    endpoint,
                    point,
                    score: self.grid.unconnected_neighbor_count(point),
                    strands: false,
                };
                candidate.strands = self.would_strand(chain, &candidate);
                candidates.push(candidate);
            }
        }
        candidates.sort_by_key(|c| (c.strands, c.score));
        (candidates, rejected)
    }

    /// Returns `true` if committing `candidate` would leave unconnected
    /// points near it that no set of chains could cover.
    fn would_strand(&self, chain: &Chain, candidate: &Candidate) -> bool {
        let lookahead = Lookahead::new(&self.grid, self.max_connection_count, chain, candidate);
        lookahead.isolates_neighbor() || lookahead.leaves_uncoverable_component()
    }

    fn extend_chain(&mut self) -> Result<(), GridError> {
        let Some(mut chain) = self.current.take() else {
            self.state = BuildState::SelectingStart;
            return Ok(());
        };

        let mut extended = false;
        if !chain.is_full() {
            let (candidates, rejected) = self.extension_candidates(&chain);
            self.diagnostics.rejected_candidates += rejected;
            // A fresh chain must make its first connection even if that
            // strands a neighbor; a longer chain stops instead.
            let must_extend = chain.connection_count() == 0;
            for candidate in candidates {
                if candidate.strands && !must_extend {
                    self.diagnostics.stranding_skips += 1;
                    continue;
                }
                match self.grid.add_connection(candidate.endpoint, candidate.point) {
                    Ok(segment) => {
                        if let Err(err) = self.attach(&mut chain, &candidate) {
                            self.current = Some(chain);
                            return Err(err);
                        }
                        self.diagnostics.commits += 1;
                        trace!(
                            chain = %chain.id(),
                            %segment,
                            score = candidate.score,
                            "connection committed"
                        );
                        extended = true;
                        break;
                    }
                    Err(err) => {
                        self.diagnostics.rejected_candidates += 1;
                        trace!(%err, "candidate rejected at commit");
                    }
                }
            }
        }

        if extended && !chain.is_full() {
            self.current = Some(chain);
            return Ok(());
        }

        self.finalize(chain);
        self.state = if self.grid.unconnected_points().next().is_none() {
            debug!(chains = self.chains.len(), "all points covered");
            BuildState::AllCovered
        } else {
            BuildState::ChainComplete
        };
        Ok(())
    }

    /// Record a committed candidate on the chain and the grid.
    fn attach(&mut self, chain: &mut Chain, candidate: &Candidate) -> Result<(), GridError> {
        chain.add_point_at(candidate.end, candidate.point)?;
        self.grid.assign_chain(candidate.point, chain.id())
    }

    fn finalize(&mut self, chain: Chain) {
        debug!(
            chain = %chain.id(),
            points = chain.len(),
            connections = chain.connection_count(),
            "chain finalized"
        );
        self.diagnostics.chains_finalized += 1;
        self.chains.push(chain);
    }
}

// --- Lookahead ---

/// Components larger than this are not searched for a cover.
const MAX_SEARCHED_COMPONENT: usize = 24;

/// The unconnected points around a candidate, as they would stand after
/// the candidate is committed.
///
/// Two connections are compatible when the grid allows them and, with
/// the non-crossing constraint enabled, they do not cross the candidate's
/// segment.
struct Lookahead<'a> {
    grid: &'a Grid,
    capacity: usize,
    check_crossing: bool,
    new_segment: Segment,
    end: ChainEnd,
    endpoint: Position,
    point: Position,
    other_end: Position,
    connections_after: usize,
}

impl<'a> Lookahead<'a> {
    fn new(grid: &'a Grid, capacity: u32, chain: &Chain, candidate: &Candidate) -> Self {
        let opposite = match candidate.end {
            ChainEnd::Front => ChainEnd::Back,
            ChainEnd::Back => ChainEnd::Front,
        };
        Self {
            grid,
            capacity: capacity as usize,
            check_crossing: grid.constraints().is_enabled(NonCrossingConstraint::NAME),
            new_segment: Segment::new(candidate.endpoint, candidate.point),
            end: candidate.end,
            endpoint: candidate.endpoint,
            point: candidate.point,
            other_end: chain.end(opposite).unwrap_or(candidate.endpoint),
            connections_after: chain.connection_count() + 1,
        }
    }

    fn is_unconnected(&self, p: Position) -> bool {
        p != self.point && self.grid.point(p).is_some_and(|point| !point.is_connected())
    }

    fn compatible(&self, a: Position, b: Position) -> bool {
        self.grid.allows_connection(a, b)
            && !(self.check_crossing && segments_cross(&Segment::new(a, b), &self.new_segment))
    }

    /// Whether the chain, not yet full, could take `r` at one of its ends.
    fn is_absorbable(&self, r: Position) -> bool {
        self.connections_after < self.capacity
            && [self.point, self.other_end]
                .into_iter()
                .any(|end| end.is_adjacent_to(r) && self.compatible(end, r))
    }

    /// A neighbor of the new segment would have no compatible unconnected
    /// partner and could not join the chain either.
    fn isolates_neighbor(&self) -> bool {
        self.grid
            .neighbors(self.point)
            .chain(self.grid.neighbors(self.endpoint))
            .filter(|&r| self.is_unconnected(r))
            .any(|r| {
                let has_partner = self
                    .grid
                    .neighbors(r)
                    .any(|t| self.is_unconnected(t) && self.compatible(r, t));
                !has_partner && !self.is_absorbable(r)
            })
    }

    /// A component of unconnected points next to the chain could not be
    /// covered by chains of the capacity.
    ///
    /// Components the chain could reach are merged and searched together
    /// with the chain as a seed path. Any component larger than
    /// [`MAX_SEARCHED_COMPONENT`] ends the check with `false`.
    fn leaves_uncoverable_component(&self) -> bool {
        let mut seen = HashSet::new();
        let mut reachable = Vec::new();
        let around = self
            .grid
            .neighbors(self.point)
            .chain(self.grid.neighbors(self.endpoint))
            .chain(self.grid.neighbors(self.other_end));
        for r in around {
            if !self.is_unconnected(r) || seen.contains(&r) {
                continue;
            }
            let Some(component) = self.component(r, &mut seen) else {
                return false;
            };
            if component.iter().any(|&p| self.is_absorbable(p)) {
                reachable.extend(component);
            } else if !self.path_cover(component).is_coverable(None) {
                return true;
            }
        }

        if reachable.is_empty() || reachable.len() > MAX_SEARCHED_COMPONENT {
            return false;
        }
        let (front, back) = match self.end {
            ChainEnd::Front => (self.point, self.other_end),
            ChainEnd::Back => (self.other_end, self.point),
        };
        let seed = SeedPath {
            front,
            back,
            connections: self.connections_after,
        };
        !self.path_cover(reachable).is_coverable(Some(seed))
    }

    /// The unconnected points joined to `start` by compatible connections,
    /// or `None` once there are more than [`MAX_SEARCHED_COMPONENT`].
    fn component(&self, start: Position, seen: &mut HashSet<Position>) -> Option<Vec<Position>> {
        let mut component = Vec::new();
        let mut stack = vec![start];
        seen.insert(start);
        while let Some(a) = stack.pop() {
            component.push(a);
            if component.len() > MAX_SEARCHED_COMPONENT {
                return None;
            }
            for b in self.grid.neighbors(a) {
                if self.is_unconnected(b) && !seen.contains(&b) && self.compatible(a, b) {
                    seen.insert(b);
                    stack.push(b);
                }
            }
        }
        Some(component)
    }

    fn path_cover(
        &self,
        points: Vec<Position>,
    ) -> PathCover<impl Fn(Position, Position) -> bool + '_> {
        PathCover::new(points, self.capacity, self.check_crossing, |a, b| {
            self.compatible(a, b)
        })
    }
}
