//! Single-flight request serialization over a [`PathSearch`].
//!
//! A [`RequestSerializer`] queues route requests and runs them one at a
//! time: the per-cell scratch arena inside its search is exclusively owned
//! by the in-flight episode, so admitting a second search before the first
//! completes would corrupt it. Serialization is enforced structurally — the
//! serializer owns exactly one search and one in-flight slot — not with
//! locks.
//!
//! Completion callbacks fire in exact submission order, because the next
//! queued request only starts after the previous request's callback has
//! returned.

use std::collections::VecDeque;

use wayline_core::{Grid, WorldPoint};

use crate::search::{PathSearch, SearchError, SearchOutcome, Step};

/// Completion callback: the simplified waypoint polyline and a success
/// flag. A failed search delivers an empty slice and `false`.
pub type Callback = Box<dyn FnOnce(&[WorldPoint], bool)>;

/// A queued route request; consumed when its callback fires.
struct PathRequest {
    from: WorldPoint,
    to: WorldPoint,
    callback: Callback,
}

/// FIFO queue of route requests with single-flight execution.
///
/// Owned by whoever issues requests; independent serializers (each with
/// their own grid and search) do not affect each other.
pub struct RequestSerializer {
    queue: VecDeque<PathRequest>,
    in_flight: Option<Callback>,
    search: PathSearch,
}

impl RequestSerializer {
    /// Create a serializer whose search is sized for `grid`. Every
    /// subsequent call must be driven with that same grid.
    pub fn new(grid: &Grid) -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: None,
            search: PathSearch::new(grid),
        }
    }

    /// Queue a request. If nothing is in flight, the oldest queued request
    /// starts immediately; otherwise it waits its turn. The search itself
    /// advances on [`step`](Self::step) / [`drain`](Self::drain).
    pub fn submit(
        &mut self,
        grid: &Grid,
        from: WorldPoint,
        to: WorldPoint,
        callback: impl FnOnce(&[WorldPoint], bool) + 'static,
    ) {
        self.queue.push_back(PathRequest {
            from,
            to,
            callback: Box::new(callback),
        });
        log::debug!("request queued: {from} -> {to} ({} waiting)", self.queue.len());
        if self.in_flight.is_none() {
            self.start_next(grid);
        }
    }

    /// Advance the in-flight search by at most `budget` expansions.
    ///
    /// When the search finishes, the owning request's callback fires —
    /// `NoPath` becomes `(&[], false)` here and never escapes as an error —
    /// and the next queued request (if any) starts immediately after the
    /// callback returns. Idle calls are no-ops. The only error out of this
    /// layer is the fatal [`SearchError::QueueCapacity`].
    pub fn step(&mut self, grid: &Grid, budget: usize) -> Result<(), SearchError> {
        if self.in_flight.is_none() {
            return Ok(());
        }
        match self.search.step(grid, budget)? {
            Step::Suspended => Ok(()),
            Step::Done(outcome) => {
                if let Some(callback) = self.in_flight.take() {
                    match outcome {
                        SearchOutcome::Found(path) => callback(&path.waypoints, true),
                        SearchOutcome::NoPath { .. } => callback(&[], false),
                    }
                }
                self.start_next(grid);
                Ok(())
            }
        }
    }

    /// Step until every queued request has completed and dispatched.
    pub fn drain(&mut self, grid: &Grid) -> Result<(), SearchError> {
        while self.in_flight.is_some() {
            self.step(grid, usize::MAX)?;
        }
        Ok(())
    }

    /// Whether a search is currently running.
    #[inline]
    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Number of requests waiting behind the in-flight one.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Whether there is neither an in-flight nor a waiting request.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    fn start_next(&mut self, grid: &Grid) {
        if let Some(request) = self.queue.pop_front() {
            self.search.start(grid, request.from, request.to);
            self.in_flight = Some(request.callback);
        }
    }
}
