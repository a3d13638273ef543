//! Forest module
//!
//! Cellular-automata blobs of forest on otherwise empty, flat ground. The
//! density knob steers the initial blocking percentage of the automata.

use crate::cellular;
use crate::generator::{stage_seed, GenContext, GenError, GeneratorModule};
use crate::tile::TileKind;

const BLOCKING_PERC_MIN: f32 = 48.0;
const BLOCKING_PERC_MAX: f32 = 55.0;
const SMOOTH_ITERATIONS: u32 = 3;

pub struct ForestModule;

impl GeneratorModule for ForestModule {
    fn name(&self) -> &'static str {
        "forest"
    }

    fn apply(&self, ctx: &mut GenContext) -> Result<(), GenError> {
        let param = ctx.param;
        if param.forest_size <= 0.0 {
            return Ok(());
        }

        // More forest = fewer initially blocked cells.
        let inverted = 1.0 - param.forest_size;
        let percentage =
            (BLOCKING_PERC_MIN + (BLOCKING_PERC_MAX - BLOCKING_PERC_MIN) * inverted) as u32;

        let field = cellular::generate(
            param.width,
            param.height,
            SMOOTH_ITERATIONS,
            percentage,
            true,
            stage_seed(param.random_seed, "forest"),
        );

        ctx.ensure_not_cancelled()?;
        let mut rng = ctx.stage_rng("forest");
        for c in ctx.grid.coords() {
            let open = !*field.get(c);
            let tile = ctx.grid.get(c);
            if open && tile.kind == TileKind::Empty && tile.is_flat() {
                let index = ctx.appearance.variant_index(TileKind::Forest, &mut rng);
                let tile = ctx.grid.get_mut(c);
                tile.kind = TileKind::Forest;
                tile.appearance = index;
            }
        }

        Ok(())
    }
}
