//! The [`Cell`] type — a single grid location.

use crate::geom::{Point, WorldPoint};

/// One location on the terrain grid.
///
/// Grid coordinates and the world-space center are fixed at construction.
/// The walkable flag is decided once by the collision source at build time;
/// the movement weight comes from the terrain source and is only rewritten
/// by [`Grid::smooth_weights`](crate::Grid::smooth_weights).
///
/// Search bookkeeping (G/H costs, parent links, queue slots) deliberately
/// does not live here; searches keep that state in their own arenas so a
/// cell snapshot is stable while a search runs.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    grid: Point,
    world: WorldPoint,
    walkable: bool,
    weight: i32,
}

impl Cell {
    #[inline]
    pub(crate) const fn new(grid: Point, world: WorldPoint, walkable: bool, weight: i32) -> Self {
        Self {
            grid,
            world,
            walkable,
            weight,
        }
    }

    /// Grid coordinates of this cell.
    #[inline]
    pub const fn grid(&self) -> Point {
        self.grid
    }

    /// World-space center of this cell.
    #[inline]
    pub const fn world(&self) -> WorldPoint {
        self.world
    }

    /// Whether agents may enter this cell.
    #[inline]
    pub const fn walkable(&self) -> bool {
        self.walkable
    }

    /// Additive traversal cost for entering this cell.
    #[inline]
    pub const fn weight(&self) -> i32 {
        self.weight
    }

    #[inline]
    pub(crate) const fn set_weight(&mut self, weight: i32) {
        self.weight = weight;
    }
}
