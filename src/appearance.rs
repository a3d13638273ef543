//! Appearance resolver interface
//!
//! Sprite-variant selection belongs to the rendering layer; the pipeline
//! only promises that every pick goes through its own seeded RNG so the
//! chosen indices are reproducible per seed. The default implementation
//! hands out indices from small fixed ranges.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::tile::{District, TileKind};

/// Picks sprite-variant indices for generated features. Implemented by the
/// rendering layer's tileset; the pipeline always calls it with the
/// generation RNG.
pub trait AppearanceResolver {
    /// A variant index for a house in the given district.
    fn house_index(&self, district: District, rng: &mut ChaCha8Rng) -> i32;

    /// A variant index for a non-house feature (forest, resources).
    fn variant_index(&self, kind: TileKind, rng: &mut ChaCha8Rng) -> i32;
}

/// Stand-in resolver with a handful of variants per feature, enough to run
/// the pipeline without a real tileset.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAppearance;

impl AppearanceResolver for DefaultAppearance {
    fn house_index(&self, district: District, rng: &mut ChaCha8Rng) -> i32 {
        let variants = match district {
            District::Business => 4,
            District::Industry => 3,
            _ => 6,
        };
        rng.gen_range(0..variants)
    }

    fn variant_index(&self, kind: TileKind, rng: &mut ChaCha8Rng) -> i32 {
        let variants = match kind {
            TileKind::Forest => 5,
            TileKind::Stone | TileKind::Coal | TileKind::Ore => 3,
            TileKind::Oil => 2,
            _ => 1,
        };
        rng.gen_range(0..variants)
    }
}
