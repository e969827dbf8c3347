//! Grid distance metrics.

use wayline_core::Point;

/// Octile distance between two grid points: 10 per orthogonal step, 14 per
/// diagonal step (`10·max(|dx|, |dy|) + 4·min(|dx|, |dy|)`).
///
/// Admissible and consistent for 8-directional movement, and exact between
/// adjacent cells, so the same function serves as both the A* heuristic and
/// the base step cost.
#[inline]
pub fn octile(a: Point, b: Point) -> i32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    10 * dx.max(dy) + 4 * dx.min(dy)
}
