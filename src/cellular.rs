//! Cellular automata for organic region shapes
//!
//! Seeds a random binary field and smooths it with a majority rule over the
//! 8-neighborhood. Shared by the forest and resource modules; `true` cells
//! are "blocked", open cells form the blobs the callers carve regions from.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::grid::Grid;

/// Generate a smoothed binary field.
///
/// `blocking_percentage` (0..=100) is the chance a cell starts blocked.
/// Out-of-bounds neighbors count as blocked unless `open_edges`, which
/// lets blobs bleed off the map edge instead of sealing it.
pub fn generate(
    width: i32,
    height: i32,
    smooth_iterations: u32,
    blocking_percentage: u32,
    open_edges: bool,
    seed: u64,
) -> Grid<bool> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut field = Grid::from_fn(width, height, |_| {
        rng.gen_range(0..100) < blocking_percentage
    });

    for _ in 0..smooth_iterations {
        field = smooth(&field, open_edges);
    }

    field
}

/// One majority-rule pass over a snapshot of the field. A strict majority
/// of blocked neighbors blocks the cell, a strict majority of open
/// neighbors opens it, a 4:4 split keeps the current state.
fn smooth(field: &Grid<bool>, open_edges: bool) -> Grid<bool> {
    Grid::from_fn(field.width(), field.height(), |c| {
        let mut blocked = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let n = c.offset(dx, dy);
                if field.in_bounds(n) {
                    if *field.get(n) {
                        blocked += 1;
                    }
                } else if !open_edges {
                    blocked += 1;
                }
            }
        }
        match blocked {
            5.. => true,
            4 => *field.get(c),
            _ => false,
        }
    })
}
