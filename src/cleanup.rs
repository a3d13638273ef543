//! Cleanup module
//!
//! Final pass over the finished map: compute the road auto-tiling bitmask,
//! strip roads from slopes they cannot legally sit on, promote L-turns with
//! diagonal continuations to dedicated diagonal appearance codes, and write
//! every room index back onto its tiles.

use crate::generator::{GenContext, GenError, GeneratorModule};
use crate::grid::{Coord, Grid};
use crate::room::Room;
use crate::tile::{RoomRef, Tile, TileKind};

/// Road direction bits: N=1, E=2, S=4, W=8 (neighbor in that direction is
/// also road).
const ROAD_N: i32 = 1;
const ROAD_E: i32 = 2;
const ROAD_S: i32 = 4;
const ROAD_W: i32 = 8;

/// The only (slope, road mask) pairs a road may occupy: straight roads
/// running up or down a ramp.
const LEGAL_SLOPE_ROADS: [(i32, i32); 4] = [(6, 10), (12, 5), (9, 10), (3, 5)];

/// The mask an L-turn's diagonal continuation is expected to carry.
fn connected_mask(mask: i32) -> i32 {
    match mask {
        9 => 6,
        6 => 9,
        3 => 12,
        _ => 3,
    }
}

/// L-turn mask to its diagonal appearance code.
fn diagonal_code(mask: i32) -> i32 {
    match mask {
        3 => 16,
        6 => 17,
        9 => 18,
        _ => 19,
    }
}

pub struct CleanupModule;

impl GeneratorModule for CleanupModule {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn apply(&self, ctx: &mut GenContext) -> Result<(), GenError> {
        compute_road_masks(&mut ctx.grid);
        ctx.ensure_not_cancelled()?;
        reclassify_diagonals(&mut ctx.grid);
        ctx.ensure_not_cancelled()?;
        assign_rooms_to_tiles(&mut ctx.grid, &ctx.cities, &ctx.waters);
        Ok(())
    }
}

fn is_road_like(kind: TileKind) -> bool {
    matches!(kind, TileKind::Road | TileKind::Bridge)
}

fn neighbor_mask(grid: &Grid<Tile>, c: Coord) -> i32 {
    let mut mask = 0;
    for (dx, dy, bit) in [
        (0, -1, ROAD_N),
        (1, 0, ROAD_E),
        (0, 1, ROAD_S),
        (-1, 0, ROAD_W),
    ] {
        let n = c.offset(dx, dy);
        if grid.in_bounds(n) && is_road_like(grid.get(n).kind) {
            mask += bit;
        }
    }
    mask
}

/// Classic four-bit auto-tiling. A sloped tile whose (slope, mask) pair is
/// not one of the whitelisted ramp roads loses its road.
fn compute_road_masks(grid: &mut Grid<Tile>) {
    for c in grid.coords() {
        if !is_road_like(grid.get(c).kind) {
            continue;
        }
        let mask = neighbor_mask(grid, c);
        let slope = grid.get(c).slope_index();

        if slope != 0 && !LEGAL_SLOPE_ROADS.contains(&(slope, mask)) {
            let tile = grid.get_mut(c);
            tile.kind = TileKind::Empty;
            tile.appearance = 0;
            continue;
        }
        grid.get_mut(c).appearance = mask;
    }
}

/// L-turn masks (3, 6, 9, 12) flanked by one or two matching diagonal
/// continuations are remapped to the diagonal codes 16..=19, used purely
/// for appearance selection.
fn reclassify_diagonals(grid: &mut Grid<Tile>) {
    for c in grid.coords() {
        if grid.get(c).kind != TileKind::Road {
            continue;
        }
        let mask = grid.get(c).appearance;
        if !matches!(mask, 3 | 6 | 9 | 12) {
            continue;
        }

        let expected = connected_mask(mask);
        let expected_diagonal = diagonal_code(expected);
        let matching = grid
            .neighbors4(c)
            .iter()
            .filter(|&&n| {
                let t = grid.get(n);
                t.kind == TileKind::Road
                    && (t.appearance == expected || t.appearance == expected_diagonal)
            })
            .count();

        if matching == 1 || matching == 2 {
            grid.get_mut(c).appearance = diagonal_code(mask);
        }
    }
}

/// Write each room's index onto its member tiles.
fn assign_rooms_to_tiles(grid: &mut Grid<Tile>, cities: &[Room], waters: &[Room]) {
    for (i, room) in cities.iter().enumerate() {
        for &c in room.tiles() {
            grid.get_mut(c).owner = Some(RoomRef::City(i as u16));
        }
    }
    for (i, room) in waters.iter().enumerate() {
        for &c in room.tiles() {
            grid.get_mut(c).owner = Some(RoomRef::Water(i as u16));
        }
    }
}
