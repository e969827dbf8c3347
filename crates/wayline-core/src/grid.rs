//! The [`Grid`] type — an owned 2D array of [`Cell`]s projected onto world
//! space.
//!
//! A `Grid` is built once from a world bounding volume and two external
//! collaborators: a collision source deciding walkability and a terrain
//! source classifying ground into weight categories. Topology never changes
//! after construction; only the weights may be rewritten, by the one-time
//! smoothing pass.

use thiserror::Error;

use crate::cell::Cell;
use crate::geom::{Bounds, Point, WorldPoint};

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Collision-query service consulted once per cell at build time.
///
/// The core never performs collision queries itself; implementations wrap
/// whatever physics or occupancy backend the host uses.
pub trait CollisionSource {
    /// Whether the axis-aligned box centered at `center` with the given
    /// half-extent overlaps an impassable obstacle.
    fn blocked(&self, center: WorldPoint, half_extent: f32) -> bool;
}

/// Terrain-classification service consulted once per cell at build time.
pub trait TerrainSource {
    /// The terrain category at a world position.
    fn classify(&self, at: WorldPoint) -> TerrainClass;
}

/// A terrain category produced by a [`TerrainSource`].
///
/// Categories are opaque to the grid; a weight table supplied at build time
/// maps each category to its movement weight.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TerrainClass(pub u32);

impl std::fmt::Display for TerrainClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BuildError
// ---------------------------------------------------------------------------

/// A grid-construction failure. Construction aborts immediately and is
/// never retried.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    /// Cell size must be a positive, finite number.
    #[error("cell size must be positive and finite (got {0})")]
    BadCellSize(f32),

    /// The bounding volume is too small to fit a single cell.
    #[error("bounds {width}x{height} fit no cell of size {cell_size}")]
    EmptyBounds {
        width: f32,
        height: f32,
        cell_size: f32,
    },

    /// A weight-table entry carries a negative movement weight.
    #[error("terrain class {class} maps to negative weight {weight}")]
    NegativeWeight { class: TerrainClass, weight: i32 },

    /// The terrain source produced a category missing from the weight table.
    #[error("no weight entry for terrain class {class} at cell {at}")]
    UnknownTerrain { class: TerrainClass, at: Point },
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A fixed 2D grid of [`Cell`]s keyed by (x, y), row-major.
///
/// Owns the world↔grid coordinate mapping: the grid covers `bounds`
/// starting at its min corner, with `width × height` cells of `cell_size`
/// world units each (dimensions truncate, so a partial trailing row or
/// column of the volume is not covered).
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Vec<Cell>,
    width: i32,
    height: i32,
    origin: WorldPoint,
    cell_size: f32,
}

impl Grid {
    /// Build a grid over `bounds`, querying `collision` for walkability and
    /// `terrain` + `weights` for the movement weight of every cell.
    ///
    /// Fails fast on a degenerate cell size or bounds, on a negative table
    /// weight, and on a terrain category missing from `weights`.
    pub fn build<C, T>(
        bounds: Bounds,
        cell_size: f32,
        collision: &C,
        terrain: &T,
        weights: &[(TerrainClass, i32)],
    ) -> Result<Self, BuildError>
    where
        C: CollisionSource + ?Sized,
        T: TerrainSource + ?Sized,
    {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(BuildError::BadCellSize(cell_size));
        }
        for &(class, weight) in weights {
            if weight < 0 {
                return Err(BuildError::NegativeWeight { class, weight });
            }
        }

        let width = (bounds.width() / cell_size) as i32;
        let height = (bounds.height() / cell_size) as i32;
        if width <= 0 || height <= 0 {
            return Err(BuildError::EmptyBounds {
                width: bounds.width(),
                height: bounds.height(),
                cell_size,
            });
        }

        let half = cell_size / 2.0;
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let world = bounds.min
                    + WorldPoint::new(x as f32 * cell_size + half, y as f32 * cell_size + half);
                let class = terrain.classify(world);
                let weight = weights
                    .iter()
                    .find(|&&(c, _)| c == class)
                    .map(|&(_, w)| w)
                    .ok_or(BuildError::UnknownTerrain {
                        class,
                        at: Point::new(x, y),
                    })?;
                let walkable = !collision.blocked(world, half);
                cells.push(Cell::new(Point::new(x, y), world, walkable, weight));
            }
        }

        Ok(Self {
            cells,
            width,
            height,
            origin: bounds.min,
            cell_size,
        })
    }

    /// Width in cells.
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in cells.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Total cell count.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells. Never true for a built grid.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Edge length of a cell in world units.
    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Whether `p` is a valid cell coordinate.
    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0 && p.x < self.width && p.y >= 0 && p.y < self.height
    }

    /// The cell at `p`, or `None` outside the grid.
    #[inline]
    pub fn cell(&self, p: Point) -> Option<&Cell> {
        self.idx(p).map(|i| &self.cells[i])
    }

    /// Convert a cell coordinate to its row-major flat index.
    ///
    /// Search scratch arenas are keyed by this index.
    #[inline]
    pub fn idx(&self, p: Point) -> Option<usize> {
        if !self.contains(p) {
            return None;
        }
        Some((p.y * self.width + p.x) as usize)
    }

    /// Convert a flat index back to a cell coordinate.
    #[inline]
    pub fn point(&self, idx: usize) -> Point {
        Point::new(idx as i32 % self.width, idx as i32 / self.width)
    }

    /// The grid coordinate of the cell containing `world`.
    ///
    /// Positions outside the covered volume clamp to the nearest edge cell;
    /// no error is raised.
    pub fn locate(&self, world: WorldPoint) -> Point {
        let local = (world - self.origin) / self.cell_size;
        let x = (local.x as i32).clamp(0, self.width - 1);
        let y = (local.y as i32).clamp(0, self.height - 1);
        Point::new(x, y)
    }

    /// Append the in-bounds neighbors of `p` into `buf`, clearing it first.
    ///
    /// All eight offsets (dx, dy) ∈ {-1, 0, 1}² except (0, 0); offsets
    /// falling outside the grid are clipped.
    pub fn neighbors(&self, p: Point, buf: &mut Vec<Point>) {
        buf.clear();
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let n = p.shift(dx, dy);
                if self.contains(n) {
                    buf.push(n);
                }
            }
        }
    }

    /// Row-major iterator over all cells; the read-only snapshot offered to
    /// external consumers such as debug visualization.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.cells.iter()
    }

    /// Smooth the movement weights with a box blur of the given brush
    /// radius.
    ///
    /// Each weight becomes the integer-truncated average over the
    /// (2r+1)×(2r+1) window around its cell, computed as two separable
    /// moving-sum passes (O(cells) regardless of radius). Samples falling
    /// outside the grid replicate the nearest edge cell. Radius 0 leaves
    /// every weight unchanged. Intended to run once, after construction.
    pub fn smooth_weights(&mut self, radius: i32) {
        if radius <= 0 || self.cells.is_empty() {
            return;
        }
        let w = self.width as usize;
        let h = self.height as usize;
        let kernel = 2 * radius as i64 + 1;
        let area = kernel * kernel;

        // Horizontal pass: windowed sums per row.
        let mut sums = vec![0i64; self.cells.len()];
        for y in 0..h {
            let row = y * w;
            let mut sum: i64 = 0;
            for i in -radius..=radius {
                let xi = i.clamp(0, self.width - 1) as usize;
                sum += self.cells[row + xi].weight() as i64;
            }
            sums[row] = sum;
            for x in 1..w {
                let removed = (x as i32 - radius - 1).clamp(0, self.width - 1) as usize;
                let added = (x as i32 + radius).clamp(0, self.width - 1) as usize;
                sum += self.cells[row + added].weight() as i64
                    - self.cells[row + removed].weight() as i64;
                sums[row + x] = sum;
            }
        }

        // Vertical pass over the horizontal sums, writing back averages.
        for x in 0..w {
            let mut sum: i64 = 0;
            for i in -radius..=radius {
                let yi = i.clamp(0, self.height - 1) as usize;
                sum += sums[yi * w + x];
            }
            self.cells[x].set_weight((sum / area) as i32);
            for y in 1..h {
                let removed = (y as i32 - radius - 1).clamp(0, self.height - 1) as usize;
                let added = (y as i32 + radius).clamp(0, self.height - 1) as usize;
                sum += sums[added * w + x] - sums[removed * w + x];
                self.cells[y * w + x].set_weight((sum / area) as i32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// No obstacles anywhere.
    struct OpenField;

    impl CollisionSource for OpenField {
        fn blocked(&self, _center: WorldPoint, _half_extent: f32) -> bool {
            false
        }
    }

    /// Obstacles wherever the predicate says so.
    struct Walls(fn(WorldPoint) -> bool);

    impl CollisionSource for Walls {
        fn blocked(&self, center: WorldPoint, _half_extent: f32) -> bool {
            (self.0)(center)
        }
    }

    /// A single terrain category everywhere.
    struct Flat;

    impl TerrainSource for Flat {
        fn classify(&self, _at: WorldPoint) -> TerrainClass {
            TerrainClass(0)
        }
    }

    /// Two categories split down the vertical world axis.
    struct Split {
        boundary: f32,
    }

    impl TerrainSource for Split {
        fn classify(&self, at: WorldPoint) -> TerrainClass {
            if at.x < self.boundary {
                TerrainClass(0)
            } else {
                TerrainClass(1)
            }
        }
    }

    const FLAT: &[(TerrainClass, i32)] = &[(TerrainClass(0), 0)];

    fn open_grid(w: f32, h: f32, cell_size: f32) -> Grid {
        Grid::build(Bounds::new(0.0, 0.0, w, h), cell_size, &OpenField, &Flat, FLAT).unwrap()
    }

    #[test]
    fn build_dimensions_truncate() {
        let g = open_grid(10.5, 4.9, 1.0);
        assert_eq!((g.width(), g.height()), (10, 4));
        assert_eq!(g.len(), 40);
    }

    #[test]
    fn build_rejects_bad_cell_size() {
        let b = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(
            Grid::build(b, 0.0, &OpenField, &Flat, FLAT).unwrap_err(),
            BuildError::BadCellSize(0.0)
        );
        assert!(matches!(
            Grid::build(b, -1.0, &OpenField, &Flat, FLAT),
            Err(BuildError::BadCellSize(_))
        ));
    }

    #[test]
    fn build_rejects_empty_bounds() {
        let b = Bounds::new(0.0, 0.0, 0.5, 10.0);
        assert!(matches!(
            Grid::build(b, 1.0, &OpenField, &Flat, FLAT),
            Err(BuildError::EmptyBounds { .. })
        ));
    }

    #[test]
    fn build_rejects_unknown_terrain() {
        let b = Bounds::new(0.0, 0.0, 4.0, 4.0);
        // Table only knows class 0; the right half classifies as 1.
        let err = Grid::build(b, 1.0, &OpenField, &Split { boundary: 2.0 }, FLAT).unwrap_err();
        assert_eq!(
            err,
            BuildError::UnknownTerrain {
                class: TerrainClass(1),
                at: Point::new(2, 0),
            }
        );
    }

    #[test]
    fn build_rejects_negative_weight() {
        let b = Bounds::new(0.0, 0.0, 4.0, 4.0);
        let table = &[(TerrainClass(0), -5)];
        assert_eq!(
            Grid::build(b, 1.0, &OpenField, &Flat, table).unwrap_err(),
            BuildError::NegativeWeight {
                class: TerrainClass(0),
                weight: -5,
            }
        );
    }

    #[test]
    fn cells_are_center_aligned() {
        let g = open_grid(3.0, 3.0, 1.0);
        let c = g.cell(Point::new(1, 2)).unwrap();
        assert_eq!(c.world(), WorldPoint::new(1.5, 2.5));
        assert!(c.walkable());
        assert_eq!(c.weight(), 0);
    }

    #[test]
    fn origin_offset_respected() {
        let b = Bounds::new(-5.0, 10.0, -1.0, 14.0);
        let g = Grid::build(b, 2.0, &OpenField, &Flat, FLAT).unwrap();
        assert_eq!((g.width(), g.height()), (2, 2));
        assert_eq!(g.cell(Point::ZERO).unwrap().world(), WorldPoint::new(-4.0, 11.0));
        assert_eq!(g.locate(WorldPoint::new(-1.1, 13.9)), Point::new(1, 1));
    }

    #[test]
    fn locate_clamps_to_edges() {
        let g = open_grid(5.0, 5.0, 1.0);
        assert_eq!(g.locate(WorldPoint::new(2.5, 2.5)), Point::new(2, 2));
        assert_eq!(g.locate(WorldPoint::new(-100.0, 2.5)), Point::new(0, 2));
        assert_eq!(g.locate(WorldPoint::new(100.0, 100.0)), Point::new(4, 4));
        assert_eq!(g.locate(WorldPoint::new(2.5, -0.01)), Point::new(2, 0));
    }

    #[test]
    fn walkability_from_collision_source() {
        fn wall(p: WorldPoint) -> bool {
            p.x > 2.0 && p.x < 3.0
        }
        let g = Grid::build(
            Bounds::new(0.0, 0.0, 5.0, 1.0),
            1.0,
            &Walls(wall),
            &Flat,
            FLAT,
        )
        .unwrap();
        let walkable: Vec<bool> = g.iter().map(|c| c.walkable()).collect();
        assert_eq!(walkable, vec![true, true, false, true, true]);
    }

    #[test]
    fn neighbors_interior_and_corner() {
        let g = open_grid(4.0, 4.0, 1.0);
        let mut buf = Vec::new();

        g.neighbors(Point::new(1, 1), &mut buf);
        assert_eq!(buf.len(), 8);
        assert!(!buf.contains(&Point::new(1, 1)));

        g.neighbors(Point::new(0, 0), &mut buf);
        assert_eq!(buf.len(), 3);
        assert!(buf.contains(&Point::new(1, 1)));

        g.neighbors(Point::new(3, 0), &mut buf);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn idx_point_round_trip() {
        let g = open_grid(7.0, 3.0, 1.0);
        for (i, cell) in g.iter().enumerate() {
            assert_eq!(g.idx(cell.grid()), Some(i));
            assert_eq!(g.point(i), cell.grid());
        }
        assert_eq!(g.idx(Point::new(7, 0)), None);
        assert_eq!(g.idx(Point::new(0, -1)), None);
    }

    // -----------------------------------------------------------------------
    // Smoothing
    // -----------------------------------------------------------------------

    /// Weight classes in a checkered-ish pattern for blur tests.
    struct Patterned;

    impl TerrainSource for Patterned {
        fn classify(&self, at: WorldPoint) -> TerrainClass {
            TerrainClass(((at.x as u32) * 7 + (at.y as u32) * 13) % 3)
        }
    }

    const PATTERNED: &[(TerrainClass, i32)] = &[
        (TerrainClass(0), 0),
        (TerrainClass(1), 10),
        (TerrainClass(2), 25),
    ];

    fn patterned_grid(n: f32) -> Grid {
        Grid::build(
            Bounds::new(0.0, 0.0, n, n),
            1.0,
            &OpenField,
            &Patterned,
            PATTERNED,
        )
        .unwrap()
    }

    /// Reference blur: direct O(cells · r²) window average with edge clamp.
    fn naive_blur(g: &Grid, radius: i32) -> Vec<i32> {
        let area = (2 * radius as i64 + 1).pow(2);
        let mut out = Vec::with_capacity(g.len());
        for y in 0..g.height() {
            for x in 0..g.width() {
                let mut sum: i64 = 0;
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let sx = (x + dx).clamp(0, g.width() - 1);
                        let sy = (y + dy).clamp(0, g.height() - 1);
                        sum += g.cell(Point::new(sx, sy)).unwrap().weight() as i64;
                    }
                }
                out.push((sum / area) as i32);
            }
        }
        out
    }

    #[test]
    fn smooth_radius_zero_is_identity() {
        let mut g = patterned_grid(6.0);
        let before: Vec<i32> = g.iter().map(|c| c.weight()).collect();
        g.smooth_weights(0);
        let after: Vec<i32> = g.iter().map(|c| c.weight()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn smooth_matches_naive_reference() {
        for radius in [1, 2, 3] {
            let mut g = patterned_grid(8.0);
            let expected = naive_blur(&g, radius);
            g.smooth_weights(radius);
            let got: Vec<i32> = g.iter().map(|c| c.weight()).collect();
            assert_eq!(got, expected, "radius {radius}");
        }
    }

    #[test]
    fn smooth_radius_beyond_extent_matches_naive_reference() {
        let mut g = patterned_grid(5.0);
        let expected = naive_blur(&g, 12);
        g.smooth_weights(12);
        let got: Vec<i32> = g.iter().map(|c| c.weight()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn smooth_uniform_weights_stay_uniform() {
        let table = &[(TerrainClass(0), 9)];
        let mut g = Grid::build(Bounds::new(0.0, 0.0, 6.0, 6.0), 1.0, &OpenField, &Flat, table)
            .unwrap();
        g.smooth_weights(2);
        assert!(g.iter().all(|c| c.weight() == 9));
    }
}
