//! Route a few agents across an ASCII terrain map.
//!
//! The map plays the external collaborators: `#` cells are obstacles
//! (collision source) and `.`/`~`/`^` are terrain categories with rising
//! movement weight (terrain source). A host drive loop advances the
//! serializer a few expansions per tick, the way a frame-based scheduler
//! would.

use wayline_core::{Bounds, CollisionSource, Grid, TerrainClass, TerrainSource, WorldPoint};
use wayline_paths::RequestSerializer;

const MAP: &[&str] = &[
    "....~~~~....#...",
    "....~~~~....#...",
    "........^^..#...",
    "..######^^..#...",
    "..#.....^^......",
    "..#.....^^..####",
    "..#..~~.....#...",
    ".....~~.....#...",
];

const GROUND: TerrainClass = TerrainClass(0);
const MARSH: TerrainClass = TerrainClass(1);
const SCREE: TerrainClass = TerrainClass(2);

struct AsciiMap {
    rows: Vec<Vec<char>>,
}

impl AsciiMap {
    fn new(rows: &[&str]) -> Self {
        Self {
            rows: rows.iter().map(|r| r.chars().collect()).collect(),
        }
    }

    fn glyph(&self, at: WorldPoint) -> char {
        let y = (at.y as usize).min(self.rows.len() - 1);
        let x = (at.x as usize).min(self.rows[y].len() - 1);
        self.rows[y][x]
    }
}

impl CollisionSource for AsciiMap {
    fn blocked(&self, center: WorldPoint, _half_extent: f32) -> bool {
        self.glyph(center) == '#'
    }
}

impl TerrainSource for AsciiMap {
    fn classify(&self, at: WorldPoint) -> TerrainClass {
        match self.glyph(at) {
            '~' => MARSH,
            '^' => SCREE,
            _ => GROUND,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let map = AsciiMap::new(MAP);
    let width = MAP[0].len() as f32;
    let height = MAP.len() as f32;

    let weights = [(GROUND, 0), (MARSH, 8), (SCREE, 20)];
    let mut grid = Grid::build(
        Bounds::new(0.0, 0.0, width, height),
        1.0,
        &map,
        &map,
        &weights,
    )?;
    grid.smooth_weights(1);

    let mut serializer = RequestSerializer::new(&grid);
    let requests = [
        ("scout", WorldPoint::new(0.5, 0.5), WorldPoint::new(15.5, 0.5)),
        ("hauler", WorldPoint::new(0.5, 7.5), WorldPoint::new(10.5, 0.5)),
        ("stray", WorldPoint::new(3.5, 4.5), WorldPoint::new(13.5, 0.5)),
    ];
    for (name, from, to) in requests {
        serializer.submit(&grid, from, to, move |waypoints, success| {
            if success {
                let polyline: Vec<String> = waypoints.iter().map(|w| w.to_string()).collect();
                println!("{name}: {}", polyline.join(" -> "));
            } else {
                println!("{name}: no route");
            }
        });
    }

    // Host scheduler: a few expansions per tick.
    let mut ticks = 0;
    while !serializer.is_idle() {
        serializer.step(&grid, 8)?;
        ticks += 1;
    }
    println!("done in {ticks} tick(s)");
    Ok(())
}
