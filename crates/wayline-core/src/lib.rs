//! **wayline-core** — Terrain grid and geometry types for grid-based route
//! planning.
//!
//! This crate provides the foundational types used across the *wayline*
//! workspace: geometry primitives, the per-location [`Cell`], and the
//! [`Grid`] that projects a world-space bounding volume onto a fixed 2D
//! array of cells with walkability and movement weights.

pub mod cell;
pub mod geom;
pub mod grid;

pub use cell::Cell;
pub use geom::{Bounds, Point, WorldPoint};
pub use grid::{BuildError, CollisionSource, Grid, TerrainClass, TerrainSource};
