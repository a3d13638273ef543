//! Terrain module
//!
//! Produces the initial heightfield from fractal noise, clamps the lowlands
//! (optionally flooding them), smooths outliers and derives the per-tile
//! corner-slope shape every later module depends on.

use noise::{NoiseFn, Perlin};

use crate::generator::{stage_seed, CancelToken, GenContext, GenError, GeneratorModule};
use crate::grid::{Coord, Grid};
use crate::tile::{Tile, TileKind, SLOPE_E, SLOPE_N, SLOPE_S, SLOPE_W};

const NOISE_OCTAVES: u32 = 5;
const NOISE_LACUNARITY: f64 = 2.0;
const NOISE_PERSISTENCE: f64 = 0.25;
/// Lower = larger landforms.
const NOISE_FREQUENCY: f64 = 1.0 / 48.0;

pub struct TerrainModule;

impl GeneratorModule for TerrainModule {
    fn name(&self) -> &'static str {
        "terrain"
    }

    fn apply(&self, ctx: &mut GenContext) -> Result<(), GenError> {
        generate_heightfield(ctx)?;
        ctx.ensure_not_cancelled()?;
        smooth_heights(&mut ctx.grid);
        ctx.ensure_not_cancelled()?;
        let cancel = ctx.cancel.clone();
        create_slopes(&mut ctx.grid, &cancel)?;
        Ok(())
    }
}

/// Quadratic ease in/out, biasing elevations toward the midrange.
fn ease_quad_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u / 2.0
    }
}

/// Fractional Brownian motion over a Perlin base, normalized to [-1, 1].
fn fbm(noise: &Perlin, x: f64, y: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..NOISE_OCTAVES {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= NOISE_PERSISTENCE;
        frequency *= NOISE_LACUNARITY;
    }

    total / max_value
}

fn generate_heightfield(ctx: &mut GenContext) -> Result<(), GenError> {
    let param = ctx.param;
    let noise = Perlin::new(stage_seed(param.random_seed, "terrain") as u32);
    let top = param.max_height - 1;
    let water_height = param.min_height - param.water_min_diff;

    for y in 0..param.height {
        ctx.ensure_not_cancelled()?;
        for x in 0..param.width {
            let c = Coord::new(x, y);
            let n = fbm(&noise, x as f64 * NOISE_FREQUENCY, y as f64 * NOISE_FREQUENCY);
            let v = (n * 0.5 + 0.5).clamp(0.0, 1.0);
            let h = (ease_quad_in_out(v) * top as f64) as i32 + param.base_height;

            let mut tile = Tile::new(c, h);
            if h < param.min_height {
                tile.set_all_heights(param.min_height);
                if param.has_water && h < water_height {
                    tile.kind = TileKind::Water;
                }
            }
            ctx.grid.set(c, tile);
        }
    }

    Ok(())
}

/// Level out single-tile spikes and pits: a tile with more than five of its
/// eight neighbors strictly lower drops one step, with more than five
/// strictly higher it rises one step. Neighbor counts are read from a
/// snapshot of the pass-start heights, so the result does not depend on
/// scan order.
fn smooth_heights(grid: &mut Grid<Tile>) {
    let snapshot = Grid::from_fn(grid.width(), grid.height(), |c| grid.get(c).max_height());

    for c in snapshot.coords() {
        let h = *snapshot.get(c);
        let mut smaller = 0;
        let mut bigger = 0;
        for n in snapshot.neighbors8(c) {
            let nh = *snapshot.get(n);
            if nh < h {
                smaller += 1;
            } else if nh > h {
                bigger += 1;
            }
        }

        if smaller > 5 {
            grid.get_mut(c).set_all_heights(h - 1);
        } else if bigger > 5 {
            grid.get_mut(c).set_all_heights(h + 1);
        }
    }
}

/// True if the neighbor one step in `(dx, dy)` is one or two levels above
/// the tile with every one of its corners higher.
fn slopes_up(grid: &Grid<Tile>, c: Coord, dx: i32, dy: i32) -> bool {
    let n = c.offset(dx, dy);
    if !grid.in_bounds(n) {
        return false;
    }
    let h = grid.get(c).max_height();
    let neighbor = grid.get(n);
    let nh = neighbor.max_height();
    (nh == h + 1 || nh == h + 2) && neighbor.heights.iter().all(|&ch| ch > h)
}

/// Bitmask of the orthogonal directions the terrain steps up toward.
fn slope_up_directions(grid: &Grid<Tile>, c: Coord) -> i32 {
    let mut dirs = 0;
    if slopes_up(grid, c, 0, -1) {
        dirs += SLOPE_N;
    }
    if slopes_up(grid, c, 1, 0) {
        dirs += SLOPE_E;
    }
    if slopes_up(grid, c, 0, 1) {
        dirs += SLOPE_S;
    }
    if slopes_up(grid, c, -1, 0) {
        dirs += SLOPE_W;
    }
    dirs
}

/// Derive corner slopes in four passes, each re-scanning the grid state the
/// previous pass left behind.
fn create_slopes(grid: &mut Grid<Tile>, cancel: &CancelToken) -> Result<(), GenError> {
    let check = |cancel: &CancelToken| -> Result<(), GenError> {
        if cancel.is_cancelled() {
            Err(GenError::Cancelled)
        } else {
            Ok(())
        }
    };

    // Pass 1: flat tiles walled in on three or four orthogonal sides rise
    // one step so they don't form unclimbable pits.
    check(cancel)?;
    for c in grid.coords() {
        if !grid.get(c).is_flat() {
            continue;
        }
        let h = grid.get(c).max_height();
        let higher = grid
            .neighbors4(c)
            .iter()
            .filter(|&&n| grid.get(n).max_height() > h)
            .count();
        if higher >= 3 {
            for corner in &mut grid.get_mut(c).heights {
                *corner += 1;
            }
        }
    }

    // Pass 2: two perpendicular step-up directions make a diagonal
    // depression, keeping only the corner opposite the compound direction
    // at the original height.
    check(cancel)?;
    for c in grid.coords() {
        if !grid.get(c).is_flat() {
            continue;
        }
        let dirs = slope_up_directions(grid, c);
        if matches!(dirs, 3 | 6 | 9 | 12) {
            let tile = grid.get_mut(c);
            for corner in &mut tile.heights {
                *corner += 1;
            }
            match dirs {
                3 => tile.heights[3] -= 1,
                6 => tile.heights[0] -= 1,
                12 => tile.heights[1] -= 1,
                _ => tile.heights[2] -= 1,
            }
        }
    }

    // Pass 3: a single step-up direction becomes a ramp. Drop every corner
    // one step, then raise back the corner pairs on each side that does
    // not step up.
    check(cancel)?;
    for c in grid.coords() {
        let tile = grid.get(c);
        if !tile.is_flat() || tile.kind == TileKind::Water {
            continue;
        }

        let mut dirs = 0;
        if slopes_up(grid, c, 0, -1) {
            dirs = SLOPE_N;
        } else if slopes_up(grid, c, 1, 0) {
            dirs = SLOPE_E;
        } else if slopes_up(grid, c, 0, 1) {
            dirs = SLOPE_S;
        } else if slopes_up(grid, c, -1, 0) {
            dirs = SLOPE_W;
        }

        if dirs > 0 {
            let tile = grid.get_mut(c);
            for corner in &mut tile.heights {
                *corner -= 1;
            }
            if dirs & SLOPE_N == 0 {
                tile.heights[2] += 1;
                tile.heights[3] += 1;
            }
            if dirs & SLOPE_E == 0 {
                tile.heights[0] += 1;
                tile.heights[3] += 1;
            }
            if dirs & SLOPE_S == 0 {
                tile.heights[1] += 1;
                tile.heights[0] += 1;
            }
            if dirs & SLOPE_W == 0 {
                tile.heights[2] += 1;
                tile.heights[1] += 1;
            }
        }
    }

    // Pass 4: a lone higher diagonal neighbor lifts the corner that
    // touches it.
    check(cancel)?;
    for c in grid.coords() {
        let tile = grid.get(c);
        if !tile.is_flat() || tile.kind == TileKind::Water {
            continue;
        }
        let h = tile.max_height();

        // Diagonal direction to affected corner: NW->N, SW->W, SE->S, NE->E.
        for (dx, dy, corner) in [(-1, -1, 0), (-1, 1, 3), (1, 1, 2), (1, -1, 1)] {
            let n = c.offset(dx, dy);
            if !grid.in_bounds(n) {
                continue;
            }
            let neighbor = grid.get(n);
            let nh = neighbor.max_height();
            if (nh == h + 1 || nh == h + 2) && neighbor.heights.iter().all(|&ch| ch > h) {
                grid.get_mut(c).heights[corner] += 1;
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::DefaultAppearance;
    use crate::generator::CancelToken;
    use crate::params::GeneratorParameter;

    fn run_terrain(param: &GeneratorParameter) -> Grid<Tile> {
        let mut ctx = GenContext {
            param,
            grid: Grid::from_fn(param.width, param.height, |c| Tile::new(c, param.base_height)),
            cities: Vec::new(),
            waters: Vec::new(),
            appearance: &DefaultAppearance,
            cancel: CancelToken::new(),
        };
        TerrainModule.apply(&mut ctx).unwrap();
        ctx.grid
    }

    fn flat_grid(width: i32, height: i32, h: i32) -> Grid<Tile> {
        Grid::from_fn(width, height, |c| Tile::new(c, h))
    }

    #[test]
    fn test_terrain_is_deterministic() {
        let param = GeneratorParameter {
            width: 48,
            height: 48,
            random_seed: 42,
            ..GeneratorParameter::default()
        };
        let a = run_terrain(&param);
        let b = run_terrain(&param);
        assert!(a == b);
    }

    #[test]
    fn test_heights_stay_in_bounds() {
        let param = GeneratorParameter {
            width: 64,
            height: 64,
            random_seed: 9,
            ..GeneratorParameter::default()
        };
        let grid = run_terrain(&param);
        for (_, tile) in grid.iter() {
            for &h in &tile.heights {
                assert!(h >= 0);
                // Slope passes may push single corners one step past the
                // noise ceiling, never further.
                assert!(h <= param.base_height + param.max_height + 1);
            }
        }
    }

    #[test]
    fn test_water_only_in_clamped_lowland() {
        let param = GeneratorParameter {
            width: 64,
            height: 64,
            random_seed: 5,
            ..GeneratorParameter::default()
        };
        let grid = run_terrain(&param);
        for (_, tile) in grid.iter() {
            if tile.kind == TileKind::Water {
                assert_eq!(tile.max_height(), param.min_height);
                assert!(tile.is_flat());
            }
        }
    }

    #[test]
    fn test_corner_gaps_at_most_two() {
        let param = GeneratorParameter {
            width: 64,
            height: 64,
            random_seed: 123,
            ..GeneratorParameter::default()
        };
        let grid = run_terrain(&param);
        for (_, tile) in grid.iter() {
            for i in 0..4 {
                let gap = (tile.heights[i] - tile.heights[(i + 1) % 4]).abs();
                assert!(gap <= 2, "adjacent corner gap {gap} at {}", tile.coord);
            }
        }
    }

    #[test]
    fn test_smoothing_reads_pass_start_heights() {
        // C1 at (1,1) has seven strictly lower neighbors and must drop.
        // C2 at (2,1) has exactly five lower neighbors at pass start; had
        // the scan observed C1's drop in place, C2 would see six and drop
        // too. With snapshot semantics it stays put.
        let mut grid = flat_grid(5, 3, 5);
        grid.get_mut(Coord::new(1, 1)).set_all_heights(6);
        grid.get_mut(Coord::new(2, 1)).set_all_heights(6);
        grid.get_mut(Coord::new(3, 1)).set_all_heights(6);
        grid.get_mut(Coord::new(3, 2)).set_all_heights(6);

        smooth_heights(&mut grid);

        assert_eq!(grid.get(Coord::new(1, 1)).max_height(), 5);
        assert_eq!(grid.get(Coord::new(2, 1)).max_height(), 6);
    }

    #[test]
    fn test_ramp_slope_toward_step_up() {
        // A flat shelf two rows high: the row below the step becomes a
        // ramp with slope index 12 (S and W corners low).
        let mut grid = flat_grid(5, 5, 5);
        for x in 0..5 {
            grid.get_mut(Coord::new(x, 0)).set_all_heights(6);
        }
        create_slopes(&mut grid, &CancelToken::new()).unwrap();

        let ramp = grid.get(Coord::new(2, 1));
        assert_eq!(ramp.slope_index(), 12);
        assert!(ramp.is_road_placeable(false));
    }
}
