//! Resumable A* search over a [`Grid`].
//!
//! [`PathSearch`] owns all per-cell scratch state (costs, parent links,
//! open-queue membership) in an arena keyed by flat cell index, so repeated
//! searches incur no allocations after warm-up. Scratch from an earlier
//! episode is invalidated lazily by a generation counter; no state leaks
//! between episodes.
//!
//! A search is an explicit task: [`start`](PathSearch::start) begins an
//! episode and [`step`](PathSearch::step) advances it by a bounded number of
//! expansions, so a host driver can interleave unrelated work between
//! chunks. [`run`](PathSearch::run) is the call-to-completion convenience.

use std::mem;

use thiserror::Error;

use wayline_core::{Grid, Point, WorldPoint};

use crate::distance::octile;
use crate::heap::{HeapFull, SlotHeap};

const NO_PARENT: usize = usize::MAX;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Open-queue ordering key: ascending total cost F; on equal F the larger
/// accumulated G (the path that has traveled farther) outranks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Priority {
    pub(crate) f: i32,
    pub(crate) g: i32,
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.f.cmp(&other.f).then_with(|| other.g.cmp(&self.g))
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Scratch node
// ---------------------------------------------------------------------------

/// Per-cell search scratch. Valid only while `generation` matches the
/// search's current episode.
#[derive(Clone)]
struct Node {
    g: i32,
    h: i32,
    parent: usize,
    closed: bool,
    generation: u32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            g: 0,
            h: 0,
            parent: NO_PARENT,
            closed: false,
            generation: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A route produced by a successful search.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FoundPath {
    /// Simplified polyline of world-space waypoints, origin cell excluded,
    /// destination cell center last.
    pub waypoints: Vec<WorldPoint>,
    /// Accumulated traversal cost of the full (unsimplified) route.
    pub cost: i32,
}

/// Outcome of a finished search episode.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    /// A route exists; waypoints and cost attached.
    Found(FoundPath),
    /// The open queue was exhausted before reaching the destination.
    NoPath { from: WorldPoint, to: WorldPoint },
}

/// Result of advancing a search by one [`step`](PathSearch::step) call.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// The expansion budget ran out; call `step` again to continue.
    Suspended,
    /// The episode finished. Stepping a finished task reports the same
    /// outcome again.
    Done(SearchOutcome),
}

/// Externally observable task state.
///
/// A task is only ever *running* inside a `step` call; by the time control
/// returns to the driver it is suspended or done, so no running state is
/// observable here.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// No episode has been started.
    Idle,
    /// An episode was started but not yet stepped.
    Pending,
    /// The episode yielded mid-search.
    Suspended,
    /// The episode finished; the outcome is available via `step`.
    Done,
}

/// A search-layer failure. Domain outcomes (no route) are not errors; see
/// [`SearchOutcome::NoPath`].
#[derive(Debug, Error, PartialEq)]
pub enum SearchError {
    /// `step` was called with no episode started.
    #[error("no search episode in progress")]
    Idle,
    /// The open queue overflowed its fixed capacity: the queue was sized
    /// below the grid's cell count. Fatal; not retried.
    #[error(transparent)]
    QueueCapacity(#[from] HeapFull),
}

// ---------------------------------------------------------------------------
// PathSearch
// ---------------------------------------------------------------------------

struct Episode {
    from: WorldPoint,
    to: WorldPoint,
    start: usize,
    goal: usize,
    seeded: bool,
    outcome: Option<SearchOutcome>,
}

/// A* search task with reusable scratch arenas.
///
/// The arena and open queue are sized once, to the cell count of the grid
/// handed to [`new`](Self::new); every call must be driven with that same
/// grid. At most one episode exists per instance — starting a new episode
/// replaces the previous one — and the scratch state is exclusively owned
/// by that episode, which is why callers must serialize searches (see
/// [`RequestSerializer`](crate::RequestSerializer)).
pub struct PathSearch {
    nodes: Vec<Node>,
    generation: u32,
    open: SlotHeap<Priority>,
    nbuf: Vec<Point>,
    episode: Option<Episode>,
}

impl PathSearch {
    /// Create a search sized for `grid`: the open queue holds every cell at
    /// once, so capacity can never be exceeded by a conforming caller.
    pub fn new(grid: &Grid) -> Self {
        Self {
            nodes: vec![Node::default(); grid.len()],
            generation: 0,
            open: SlotHeap::with_capacity(grid.len()),
            nbuf: Vec::with_capacity(8),
            episode: None,
        }
    }

    /// Current task state.
    pub fn state(&self) -> TaskState {
        match &self.episode {
            None => TaskState::Idle,
            Some(ep) if ep.outcome.is_some() => TaskState::Done,
            Some(ep) if !ep.seeded => TaskState::Pending,
            Some(_) => TaskState::Suspended,
        }
    }

    /// Begin a new episode from `from` to `to`, replacing any previous one.
    ///
    /// Both endpoints are clamped to the grid (nearest edge cell) exactly
    /// like [`Grid::locate`]. All scratch state of earlier episodes is
    /// invalidated here; nothing they wrote can influence this search.
    pub fn start(&mut self, grid: &Grid, from: WorldPoint, to: WorldPoint) {
        debug_assert_eq!(self.nodes.len(), grid.len());
        self.generation = self.generation.wrapping_add(1);
        self.open.clear();
        self.episode = match (grid.idx(grid.locate(from)), grid.idx(grid.locate(to))) {
            (Some(start), Some(goal)) => Some(Episode {
                from,
                to,
                start,
                goal,
                seeded: false,
                outcome: None,
            }),
            // Unreachable for a built grid; an empty grid has no routes.
            _ => Some(Episode {
                from,
                to,
                start: 0,
                goal: 0,
                seeded: true,
                outcome: Some(SearchOutcome::NoPath { from, to }),
            }),
        };
    }

    /// Advance the current episode by at most `budget` expansions.
    ///
    /// A budget of `usize::MAX` runs to completion; a budget of 0 makes no
    /// progress. Heap overflow surfaces as the fatal
    /// [`SearchError::QueueCapacity`].
    pub fn step(&mut self, grid: &Grid, budget: usize) -> Result<Step, SearchError> {
        debug_assert_eq!(self.nodes.len(), grid.len());
        let Some(ep) = self.episode.as_mut() else {
            return Err(SearchError::Idle);
        };
        if let Some(outcome) = &ep.outcome {
            return Ok(Step::Done(outcome.clone()));
        }

        if !ep.seeded {
            let h = octile(grid.point(ep.start), grid.point(ep.goal));
            let node = &mut self.nodes[ep.start];
            node.g = 0;
            node.h = h;
            node.parent = NO_PARENT;
            node.closed = false;
            node.generation = self.generation;
            self.open.push(ep.start, Priority { f: h, g: 0 })?;
            ep.seeded = true;
            log::debug!("search started: {} -> {}", ep.from, ep.to);
        }

        let goal_point = grid.point(ep.goal);
        let mut nbuf = mem::take(&mut self.nbuf);
        let mut expanded = 0usize;

        let outcome = loop {
            if expanded >= budget {
                self.nbuf = nbuf;
                return Ok(Step::Suspended);
            }
            let Some((current, _)) = self.open.pop() else {
                break SearchOutcome::NoPath {
                    from: ep.from,
                    to: ep.to,
                };
            };
            if current == ep.goal {
                break SearchOutcome::Found(reconstruct(grid, &self.nodes, ep.start, ep.goal));
            }

            expanded += 1;
            self.nodes[current].closed = true;
            let current_g = self.nodes[current].g;
            let current_point = grid.point(current);

            grid.neighbors(current_point, &mut nbuf);
            for &np in nbuf.iter() {
                let Some(ni) = grid.idx(np) else {
                    continue;
                };
                let Some(cell) = grid.cell(np) else {
                    continue;
                };
                if !cell.walkable() {
                    continue;
                }
                let node = &mut self.nodes[ni];
                let visited = node.generation == self.generation;
                if visited && node.closed {
                    continue;
                }

                let tentative = current_g + octile(current_point, np) + cell.weight();
                if !visited {
                    let h = octile(np, goal_point);
                    node.g = tentative;
                    node.h = h;
                    node.parent = current;
                    node.closed = false;
                    node.generation = self.generation;
                    self.open.push(
                        ni,
                        Priority {
                            f: tentative + h,
                            g: tentative,
                        },
                    )?;
                } else if tentative < node.g {
                    node.g = tentative;
                    node.parent = current;
                    let f = tentative + node.h;
                    self.open.update(
                        ni,
                        Priority {
                            f,
                            g: tentative,
                        },
                    );
                }
            }
        };

        self.nbuf = nbuf;
        match &outcome {
            SearchOutcome::Found(path) => {
                log::debug!(
                    "search finished: {} waypoint(s), cost {}",
                    path.waypoints.len(),
                    path.cost
                );
            }
            SearchOutcome::NoPath { from, to } => {
                log::debug!("search exhausted: no path between {from} and {to}");
            }
        }
        ep.outcome = Some(outcome.clone());
        Ok(Step::Done(outcome))
    }

    /// Start and run an episode to completion.
    pub fn run(
        &mut self,
        grid: &Grid,
        from: WorldPoint,
        to: WorldPoint,
    ) -> Result<SearchOutcome, SearchError> {
        self.start(grid, from, to);
        loop {
            if let Step::Done(outcome) = self.step(grid, usize::MAX)? {
                return Ok(outcome);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reconstruction & simplification
// ---------------------------------------------------------------------------

fn reconstruct(grid: &Grid, nodes: &[Node], start: usize, goal: usize) -> FoundPath {
    let mut chain = Vec::new();
    let mut idx = goal;
    loop {
        chain.push(idx);
        if idx == start {
            break;
        }
        idx = nodes[idx].parent;
    }
    chain.reverse();

    let cells: Vec<(Point, WorldPoint)> = chain
        .iter()
        .filter_map(|&i| {
            let p = grid.point(i);
            grid.cell(p).map(|c| (p, c.world()))
        })
        .collect();

    FoundPath {
        waypoints: simplify(&cells),
        cost: nodes[goal].g,
    }
}

/// Collapse runs of colinear steps into a minimal polyline: keep the world
/// position of every cell where the travel direction changes, plus the
/// final endpoint. Directions compare the grid displacement between
/// consecutive positions.
fn simplify(cells: &[(Point, WorldPoint)]) -> Vec<WorldPoint> {
    match cells {
        [] => Vec::new(),
        [(_, world)] => vec![*world],
        _ => {
            let mut waypoints = Vec::new();
            let mut prev_dir = cells[1].0 - cells[0].0;
            for i in 2..cells.len() {
                let dir = cells[i].0 - cells[i - 1].0;
                if dir != prev_dir {
                    waypoints.push(cells[i - 1].1);
                }
                prev_dir = dir;
            }
            waypoints.push(cells[cells.len() - 1].1);
            waypoints
        }
    }
}
