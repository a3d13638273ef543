//! Resource module
//!
//! Mineral deposits (stone, coal, ore, oil) carved by cellular automata,
//! biased away from existing features and map edges by a proximity heat
//! map, and sliced into resource kinds by fixed proportions.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::cellular;
use crate::generator::{GenContext, GenError, GeneratorModule};
use crate::grid::{flood_fill, Grid};
use crate::room::Room;
use crate::tile::{Tile, TileKind};

const BLOCKING_PERC: i32 = 55;
const BLOCKING_PERC_DELTA: i32 = 5;
const SMOOTH_ITERATIONS: u32 = 5;

/// Re-roll the automata until at least this many deposit regions exist.
const MIN_RESOURCE_ROOMS: usize = 10;
/// Bounded re-roll budget; running out just means a sparser map.
const MAX_ATTEMPTS: u32 = 8;

const STONE_PERCENTAGE: f32 = 0.50;
const COAL_PERCENTAGE: f32 = 0.20;
const ORE_PERCENTAGE: f32 = 0.20;

/// Heat-map penalty subtracted around occupied tiles.
const NEAR_PENALTY: f32 = 0.25;
/// Chebyshev radius of the penalty stamp.
const NEAR_PENALTY_DIST: i32 = 3;
/// Cells below this heat never hold a resource.
const HEAT_THRESHOLD: f32 = 0.5;

pub struct ResourceModule;

impl GeneratorModule for ResourceModule {
    fn name(&self) -> &'static str {
        "resources"
    }

    fn apply(&self, ctx: &mut GenContext) -> Result<(), GenError> {
        let param = ctx.param;
        if param.resource_size <= 0.0 {
            return Ok(());
        }

        let mut rng = ctx.stage_rng("resources");
        let heat = build_heat_map(&ctx.grid);

        // The automata sometimes comes back with too few usable regions;
        // re-roll with fresh seeds a bounded number of times.
        let mut rooms: Vec<Room> = Vec::new();
        for attempt in 0..MAX_ATTEMPTS {
            ctx.ensure_not_cancelled()?;
            let block = BLOCKING_PERC - BLOCKING_PERC_DELTA / 2
                + ((1.0 - param.resource_size) * BLOCKING_PERC_DELTA as f32) as i32;
            let field = cellular::generate(
                param.width,
                param.height,
                SMOOTH_ITERATIONS,
                block as u32,
                false,
                rng.gen(),
            );

            // Open automata cells that are hot enough and flat qualify.
            let grid = &ctx.grid;
            let usable = Grid::from_fn(param.width, param.height, |c| {
                !*field.get(c) && *heat.get(c) >= HEAT_THRESHOLD && grid.get(c).is_flat()
            });
            rooms = flood_fill(&usable, |ok| *ok)
                .into_iter()
                .map(Room::from_tiles)
                .collect();

            if rooms.len() >= MIN_RESOURCE_ROOMS {
                break;
            }
            if attempt + 1 == MAX_ATTEMPTS {
                warn!(
                    rooms = rooms.len(),
                    "resource region budget exhausted, placing what exists"
                );
            }
        }
        debug!(rooms = rooms.len(), "placing resource regions");

        // Shuffle, then slice into kinds: 50% stone, 20% coal, 20% ore,
        // 10% oil.
        rooms.shuffle(&mut rng);
        for (i, room) in rooms.iter().enumerate() {
            let kind = resource_for_slot(i, rooms.len());

            for c in room.sorted_tiles() {
                if ctx.grid.get(c).kind == TileKind::Empty {
                    let index = ctx.appearance.variant_index(kind, &mut rng);
                    let tile = ctx.grid.get_mut(c);
                    tile.kind = kind;
                    tile.appearance = index;
                }
            }
        }

        Ok(())
    }
}

/// Resource kind for the i-th of `len` shuffled regions, slicing the list
/// by the fixed proportions.
fn resource_for_slot(i: usize, len: usize) -> TileKind {
    let coal_index = (STONE_PERCENTAGE * len as f32) as usize;
    let ore_index = ((STONE_PERCENTAGE + COAL_PERCENTAGE) * len as f32) as usize;
    let oil_index = ((STONE_PERCENTAGE + COAL_PERCENTAGE + ORE_PERCENTAGE) * len as f32) as usize;

    if i >= oil_index {
        TileKind::Oil
    } else if i >= ore_index {
        TileKind::Ore
    } else if i >= coal_index {
        TileKind::Coal
    } else {
        TileKind::Stone
    }
}

/// Placement probability per tile: 1.0 on open ground, 0 on and heavily
/// penalized near occupied tiles and map edges, so deposits cluster away
/// from cities, roads and water.
fn build_heat_map(grid: &Grid<Tile>) -> Grid<f32> {
    let mut heat = Grid::new_with(grid.width(), grid.height(), 1.0f32);

    for c in grid.coords() {
        let occupied = grid.get(c).kind != TileKind::Empty;
        let edge = c.x == 0 || c.y == 0 || c.x == grid.width() - 1 || c.y == grid.height() - 1;
        if occupied || edge {
            heat.set(c, 0.0);
            for dy in -NEAR_PENALTY_DIST..=NEAR_PENALTY_DIST {
                for dx in -NEAR_PENALTY_DIST..=NEAR_PENALTY_DIST {
                    let n = c.offset(dx, dy);
                    if heat.in_bounds(n) {
                        *heat.get_mut(n) -= NEAR_PENALTY;
                    }
                }
            }
        }
    }

    heat
}
