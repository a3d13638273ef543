//! Pipeline orchestrator
//!
//! Builds the ordered module list from the parameters and runs each module
//! against the shared context. Generation is a pure batch transform:
//! parameters in, grid plus room lists out. Cancellation is cooperative —
//! modules poll the token at loop granularity and unwind without
//! publishing anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::appearance::{AppearanceResolver, DefaultAppearance};
use crate::city::CityModule;
use crate::city_connections::CityConnectionModule;
use crate::cleanup::CleanupModule;
use crate::forest::ForestModule;
use crate::grid::Grid;
use crate::params::GeneratorParameter;
use crate::resources::ResourceModule;
use crate::rivers::RiverModule;
use crate::room::Room;
use crate::terrain::TerrainModule;
use crate::tile::Tile;

/// Errors that can escape the pipeline. Everything else inside generation
/// is skip-and-log; the worst non-error outcome is a sparser map.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("generation was cancelled")]
    Cancelled,
}

/// Shared cancellation flag, safe to clone across threads.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything the modules share while a run is in flight. Passed
/// explicitly so no helper needs global state.
pub struct GenContext<'a> {
    pub param: &'a GeneratorParameter,
    pub grid: Grid<Tile>,
    pub cities: Vec<Room>,
    pub waters: Vec<Room>,
    pub appearance: &'a dyn AppearanceResolver,
    pub cancel: CancelToken,
}

impl GenContext<'_> {
    /// A dedicated RNG stream for one pipeline stage, derived from the
    /// master seed and the stage name. Editing one module's draws cannot
    /// perturb another module's randomness.
    pub fn stage_rng(&self, stage: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(stage_seed(self.param.random_seed, stage))
    }

    /// Cooperative cancellation check, called at loop granularity.
    pub fn ensure_not_cancelled(&self) -> Result<(), GenError> {
        if self.cancel.is_cancelled() {
            Err(GenError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Derive a stage seed from the master seed and a stage name.
pub fn stage_seed(master: u64, stage: &str) -> u64 {
    fxhash::hash64(&(master, stage))
}

/// One step of the generation pipeline.
pub trait GeneratorModule {
    fn name(&self) -> &'static str;
    fn apply(&self, ctx: &mut GenContext) -> Result<(), GenError>;
}

/// The finished product: the tile grid plus the city and water rooms the
/// tiles reference by index.
pub struct GeneratedMap {
    pub tiles: Grid<Tile>,
    pub cities: Vec<Room>,
    pub waters: Vec<Room>,
}

/// Builds the module list for a parameter set and runs it.
pub struct MapGenerator {
    param: GeneratorParameter,
    appearance: Box<dyn AppearanceResolver>,
}

impl MapGenerator {
    /// Validates the parameters; invalid configurations are rejected here,
    /// before any module runs.
    pub fn new(param: GeneratorParameter) -> Result<Self, GenError> {
        param.validate()?;
        Ok(Self {
            param,
            appearance: Box::new(DefaultAppearance),
        })
    }

    /// Swap in the rendering layer's appearance resolver.
    pub fn with_appearance(mut self, appearance: Box<dyn AppearanceResolver>) -> Self {
        self.appearance = appearance;
        self
    }

    pub fn param(&self) -> &GeneratorParameter {
        &self.param
    }

    fn modules(&self) -> Vec<Box<dyn GeneratorModule>> {
        let p = &self.param;
        let mut modules: Vec<Box<dyn GeneratorModule>> = vec![Box::new(TerrainModule)];
        if p.has_water && p.has_rivers {
            modules.push(Box::new(RiverModule));
        }
        if p.has_cities && p.cities_number > 0.0 {
            modules.push(Box::new(CityModule));
        }
        if p.has_city_connections {
            modules.push(Box::new(CityConnectionModule));
        }
        if p.forest_size > 0.0 {
            modules.push(Box::new(ForestModule));
        }
        if p.resource_size > 0.0 {
            modules.push(Box::new(ResourceModule));
        }
        modules.push(Box::new(CleanupModule));
        modules
    }

    /// Run the full pipeline to completion.
    pub fn generate(&self) -> Result<GeneratedMap, GenError> {
        self.generate_with(CancelToken::new())
    }

    /// Run the full pipeline, polling the given token. On cancellation the
    /// partial state is dropped; nothing is ever published early.
    pub fn generate_with(&self, cancel: CancelToken) -> Result<GeneratedMap, GenError> {
        let param = &self.param;
        let mut ctx = GenContext {
            param,
            grid: Grid::from_fn(param.width, param.height, |c| {
                Tile::new(c, param.base_height)
            }),
            cities: Vec::new(),
            waters: Vec::new(),
            appearance: self.appearance.as_ref(),
            cancel,
        };

        for module in self.modules() {
            ctx.ensure_not_cancelled()?;
            debug!(module = module.name(), "running generator module");
            module.apply(&mut ctx)?;
        }

        info!(
            cities = ctx.cities.len(),
            waters = ctx.waters.len(),
            "map generation finished"
        );

        Ok(GeneratedMap {
            tiles: ctx.grid,
            cities: ctx.cities,
            waters: ctx.waters,
        })
    }
}

/// Run generation on a background worker thread. The result arrives on the
/// returned channel exactly once; cancelling the token makes the worker
/// send `Err(Cancelled)` and exit. The caller owns last-writer-wins
/// orchestration across runs.
pub fn spawn_generation(
    param: GeneratorParameter,
    cancel: CancelToken,
) -> (
    thread::JoinHandle<()>,
    mpsc::Receiver<Result<GeneratedMap, GenError>>,
) {
    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || {
        let result = MapGenerator::new(param).and_then(|g| g.generate_with(cancel));
        // The receiver may have been dropped; that just means nobody wants
        // the map anymore.
        let _ = sender.send(result);
    });
    (handle, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileKind;

    fn small_param(seed: u64) -> GeneratorParameter {
        GeneratorParameter {
            width: 32,
            height: 32,
            random_seed: seed,
            ..GeneratorParameter::default()
        }
    }

    fn count_kind(map: &GeneratedMap, kind: TileKind) -> usize {
        map.tiles.iter().filter(|(_, t)| t.kind == kind).count()
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = MapGenerator::new(small_param(42)).unwrap().generate().unwrap();
        let b = MapGenerator::new(small_param(42)).unwrap().generate().unwrap();

        assert!(a.tiles == b.tiles);
        assert_eq!(a.cities.len(), b.cities.len());
        assert_eq!(a.waters.len(), b.waters.len());
        for (ra, rb) in a.cities.iter().zip(&b.cities) {
            assert_eq!(ra, rb);
        }
        for (ra, rb) in a.waters.iter().zip(&b.waters) {
            assert_eq!(ra, rb);
        }
    }

    #[test]
    fn test_water_count_reproduces_and_seed_diverges() {
        let a = MapGenerator::new(small_param(42)).unwrap().generate().unwrap();
        let b = MapGenerator::new(small_param(42)).unwrap().generate().unwrap();
        let c = MapGenerator::new(small_param(43)).unwrap().generate().unwrap();

        let water_a = count_kind(&a, TileKind::Water);
        let water_b = count_kind(&b, TileKind::Water);
        assert_eq!(water_a, water_b);

        // A different seed produces a different map; comparing the whole
        // grid is a much stronger signal than the water count alone.
        assert!(a.tiles != c.tiles);
    }

    #[test]
    fn test_invalid_parameters_rejected_at_boundary() {
        let mut p = small_param(1);
        p.max_height = 0;
        assert!(matches!(
            MapGenerator::new(p),
            Err(GenError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let result = MapGenerator::new(small_param(1))
            .unwrap()
            .generate_with(token);
        assert!(matches!(result, Err(GenError::Cancelled)));
    }

    #[test]
    fn test_background_worker_delivers_map() {
        let (handle, receiver) = spawn_generation(small_param(7), CancelToken::new());
        let result = receiver.recv().expect("worker dropped without sending");
        assert!(result.is_ok());
        handle.join().unwrap();
    }

    #[test]
    fn test_stage_seeds_differ_per_stage() {
        assert_ne!(stage_seed(42, "terrain"), stage_seed(42, "rivers"));
        assert_eq!(stage_seed(42, "terrain"), stage_seed(42, "terrain"));
        assert_ne!(stage_seed(42, "terrain"), stage_seed(43, "terrain"));
    }

    #[test]
    fn test_toggles_prune_modules() {
        let mut p = small_param(3);
        p.has_cities = false;
        p.has_city_connections = false;
        p.forest_size = 0.0;
        p.resource_size = 0.0;
        let map = MapGenerator::new(p).unwrap().generate().unwrap();
        assert!(map.cities.is_empty());
        assert_eq!(count_kind(&map, TileKind::Forest), 0);
        assert_eq!(count_kind(&map, TileKind::Stone), 0);
    }
}
