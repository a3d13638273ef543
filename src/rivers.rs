//! Hydrology module
//!
//! Connects the lakes the terrain pass left behind with rivers. Lakes that
//! share a flat valley are linked through a minimum spanning tree; each
//! tree edge is carved as a winding, valley-following channel with a
//! random width, then stray water artifacts are smoothed away.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::generator::{GenContext, GenError, GeneratorModule};
use crate::grid::{flood_fill, Coord, Grid};
use crate::pathfind::astar4;
use crate::room::Room;
use crate::room_graph::RoomGraph;
use crate::tile::{Tile, TileKind};

/// Direct-path tiles between lateral re-centerings.
const WAYPOINT_INTERVAL: usize = 6;
/// How far a lateral probe looks for the valley wall.
const MAX_LATERAL_PROBE: i32 = 12;
/// Relative jitter on the re-centering shift.
const LATERAL_JITTER: f32 = 0.025;

pub struct RiverModule;

impl GeneratorModule for RiverModule {
    fn name(&self) -> &'static str {
        "rivers"
    }

    fn apply(&self, ctx: &mut GenContext) -> Result<(), GenError> {
        let min_height = ctx.param.min_height;
        let mut rng = ctx.stage_rng("rivers");

        let lakes: Vec<Room> = flood_fill(&ctx.grid, |t| t.kind == TileKind::Water)
            .into_iter()
            .map(Room::from_tiles)
            .collect();
        debug!(lakes = lakes.len(), "detected lakes");

        if lakes.len() >= 2 {
            connect_lakes(ctx, &lakes, min_height, &mut rng)?;
        }

        ctx.ensure_not_cancelled()?;
        smooth_water(&mut ctx.grid);

        // The carved channels changed the water layout; rebuild the water
        // rooms from the final tiles.
        ctx.waters = flood_fill(&ctx.grid, |t| t.kind == TileKind::Water)
            .into_iter()
            .map(Room::from_tiles)
            .collect();

        Ok(())
    }
}

/// Two lakes are connectable when they sit in the same maximal flat region
/// at the water level. Each connectable set gets its own minimal river
/// topology.
fn connect_lakes(
    ctx: &mut GenContext,
    lakes: &[Room],
    min_height: i32,
    rng: &mut ChaCha8Rng,
) -> Result<(), GenError> {
    let valleys = flood_fill(&ctx.grid, |t| {
        t.max_height() == min_height && t.is_flat()
    });

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for valley in &valleys {
        let members: Vec<usize> = lakes
            .iter()
            .enumerate()
            .filter(|(_, lake)| valley.contains(&lake.middle_point()))
            .map(|(i, _)| i)
            .collect();
        if members.len() >= 2 {
            groups.push(members);
        }
    }

    for group in groups {
        ctx.ensure_not_cancelled()?;

        // Complete graph weighted by walkable path length; each unordered
        // pair is searched once. Unreachable pairs get no edge.
        let grid = &ctx.grid;
        let graph = RoomGraph::connect_all_with(group.len(), |a, b| {
            astar4(
                grid,
                lakes[group[a]].middle_point(),
                lakes[group[b]].middle_point(),
                |t: &Tile| t.max_height() == min_height && t.is_flat(),
                |_| 1.0,
                false,
            )
            .map(|path| path.len() as f32)
        });

        let mst = graph.minimum_spanning_tree();
        for (a, b, _) in mst.edges() {
            ctx.ensure_not_cancelled()?;
            carve_river(
                &mut ctx.grid,
                min_height,
                lakes[group[a]].middle_point(),
                lakes[group[b]].middle_point(),
                rng,
            );
        }
    }

    Ok(())
}

/// Distance from `from` along a lateral direction to the valley wall
/// (terrain above the water level) or the map edge, clamped.
fn probe_wall(grid: &Grid<Tile>, min_height: i32, from: Coord, dx: f32, dy: f32) -> f32 {
    for step in 1..=MAX_LATERAL_PROBE {
        let c = Coord::new(
            from.x + (dx * step as f32).round() as i32,
            from.y + (dy * step as f32).round() as i32,
        );
        if !grid.in_bounds(c) || grid.get(c).max_height() > min_height {
            return step as f32;
        }
    }
    MAX_LATERAL_PROBE as f32
}

/// Resample the direct path into waypoints re-centered between the valley
/// walls, with a small jitter so rivers don't run geometrically straight.
fn synthesize_waypoints(
    grid: &Grid<Tile>,
    min_height: i32,
    path: &[Coord],
    rng: &mut ChaCha8Rng,
) -> Vec<Coord> {
    let mut waypoints = vec![path[0]];

    let mut i = WAYPOINT_INTERVAL;
    while i + 1 < path.len() {
        let p = path[i];
        let dx = (path[i + 1].x - path[i - 1].x) as f32;
        let dy = (path[i + 1].y - path[i - 1].y) as f32;
        let len = (dx * dx + dy * dy).sqrt();

        if len > 0.0 {
            // Right-hand perpendicular to the travel direction.
            let (rx, ry) = (dy / len, -dx / len);
            let right = probe_wall(grid, min_height, p, rx, ry);
            let left = probe_wall(grid, min_height, p, -rx, -ry);

            let mut shift = (right - left) * 0.5;
            shift *= 1.0 + (rng.gen::<f32>() * 2.0 - 1.0) * LATERAL_JITTER;

            let wp = Coord::new(
                p.x + (rx * shift).round() as i32,
                p.y + (ry * shift).round() as i32,
            );
            if grid.in_bounds(wp) && grid.get(wp).max_height() == min_height && grid.get(wp).is_flat()
            {
                waypoints.push(wp);
            } else {
                waypoints.push(p);
            }
        } else {
            waypoints.push(p);
        }

        i += WAYPOINT_INTERVAL;
    }

    waypoints.push(*path.last().expect("non-empty path"));
    waypoints
}

/// Carve one river between two lake middle points.
fn carve_river(
    grid: &mut Grid<Tile>,
    min_height: i32,
    source: Coord,
    target: Coord,
    rng: &mut ChaCha8Rng,
) {
    let walkable = |t: &Tile| t.max_height() == min_height && t.is_flat();

    let Some(direct) = astar4(grid, source, target, walkable, |_| 1.0, true) else {
        warn!(%source, %target, "no route between lakes, skipping river");
        return;
    };

    let waypoints = synthesize_waypoints(grid, min_height, &direct, rng);

    // Random even channel width 2..=8.
    let half_width = rng.gen_range(1..=4);

    for pair in waypoints.windows(2) {
        let Some(segment) = astar4(grid, pair[0], pair[1], walkable, |_| 1.0, true) else {
            warn!(from = %pair[0], to = %pair[1], "river segment unreachable, skipping");
            continue;
        };

        for (k, &c) in segment.iter().enumerate() {
            grid.get_mut(c).kind = TileKind::Water;

            // Widen perpendicular to the local travel direction.
            let next = segment.get(k + 1).or_else(|| segment.get(k)).copied();
            let prev = if k > 0 { segment[k - 1] } else { c };
            let (dx, dy) = match next {
                Some(n) => (n.x - prev.x, n.y - prev.y),
                None => (0, 0),
            };
            let (px, py) = if dx.abs() >= dy.abs() { (0, 1) } else { (1, 0) };
            for offset in 1..=half_width {
                for side in [-1, 1] {
                    let w = Coord::new(c.x + px * offset * side, c.y + py * offset * side);
                    if grid.in_bounds(w) && walkable(grid.get(w)) {
                        grid.get_mut(w).kind = TileKind::Water;
                    }
                }
            }
        }
    }
}

/// Two passes removing stray artifacts: a flat tile mostly surrounded by
/// water joins it, a water tile with almost no water around it dries up.
fn smooth_water(grid: &mut Grid<Tile>) {
    for _ in 0..2 {
        for c in grid.coords() {
            if !grid.get(c).is_flat() {
                continue;
            }
            let kind = grid.get(c).kind;
            let water_neighbors = grid
                .neighbors8(c)
                .iter()
                .filter(|&&n| grid.get(n).kind == TileKind::Water)
                .count();

            if kind != TileKind::Water && water_neighbors >= 5 {
                grid.get_mut(c).kind = TileKind::Water;
            } else if kind == TileKind::Water && water_neighbors <= 2 {
                grid.get_mut(c).kind = TileKind::Empty;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::DefaultAppearance;
    use crate::generator::CancelToken;
    use crate::params::GeneratorParameter;

    const MIN_H: i32 = 5;

    /// A flat valley at the water level with two square lakes.
    fn two_lake_grid() -> Grid<Tile> {
        let mut grid = Grid::from_fn(48, 24, |c| Tile::new(c, MIN_H));
        for (cx, cy) in [(6, 12), (40, 12)] {
            for dy in -2..=2 {
                for dx in -2..=2 {
                    grid.get_mut(Coord::new(cx + dx, cy + dy)).kind = TileKind::Water;
                }
            }
        }
        grid
    }

    fn run_rivers(grid: Grid<Tile>, param: &GeneratorParameter) -> (Grid<Tile>, Vec<Room>) {
        let mut ctx = GenContext {
            param,
            grid,
            cities: Vec::new(),
            waters: Vec::new(),
            appearance: &DefaultAppearance,
            cancel: CancelToken::new(),
        };
        RiverModule.apply(&mut ctx).unwrap();
        (ctx.grid, ctx.waters)
    }

    fn test_param() -> GeneratorParameter {
        GeneratorParameter {
            width: 48,
            height: 24,
            min_height: MIN_H,
            random_seed: 21,
            ..GeneratorParameter::default()
        }
    }

    #[test]
    fn test_lakes_in_same_valley_get_connected() {
        let param = test_param();
        let (grid, waters) = run_rivers(two_lake_grid(), &param);

        // After carving, both lakes belong to one connected water body.
        let components = flood_fill(&grid, |t| t.kind == TileKind::Water);
        assert_eq!(components.len(), 1, "river should join the two lakes");
        assert_eq!(waters.len(), 1);
        assert!(waters[0].len() > 2 * 25, "channel tiles were added");
    }

    #[test]
    fn test_river_carving_is_deterministic() {
        let param = test_param();
        let (a, _) = run_rivers(two_lake_grid(), &param);
        let (b, _) = run_rivers(two_lake_grid(), &param);
        assert!(a == b);
    }

    #[test]
    fn test_separated_valleys_stay_separate() {
        // A high ridge splits the map; no river may cross it.
        let mut grid = two_lake_grid();
        for y in 0..24 {
            grid.get_mut(Coord::new(24, y)).set_all_heights(MIN_H + 3);
        }
        let param = test_param();
        let (grid, waters) = run_rivers(grid, &param);

        for y in 0..24 {
            assert_ne!(grid.get(Coord::new(24, y)).kind, TileKind::Water);
        }
        assert_eq!(waters.len(), 2);
    }

    #[test]
    fn test_smoothing_removes_stray_water() {
        let mut grid = Grid::from_fn(16, 16, |c| Tile::new(c, MIN_H));
        // A lone water tile with no water neighbors dries up.
        grid.get_mut(Coord::new(8, 8)).kind = TileKind::Water;
        smooth_water(&mut grid);
        assert_eq!(grid.get(Coord::new(8, 8)).kind, TileKind::Empty);
    }

    #[test]
    fn test_smoothing_fills_enclosed_gaps() {
        let mut grid = Grid::from_fn(16, 16, |c| Tile::new(c, MIN_H));
        // A hole in the middle of a water block gets flooded.
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx != 0 || dy != 0 {
                    grid.get_mut(Coord::new(8 + dx, 8 + dy)).kind = TileKind::Water;
                }
            }
        }
        smooth_water(&mut grid);
        assert_eq!(grid.get(Coord::new(8, 8)).kind, TileKind::Water);
    }
}
