//! Generation parameters
//!
//! An immutable configuration snapshot handed to the pipeline. Validated
//! once at the boundary; modules assume the values are sane afterwards.

use serde::{Deserialize, Serialize};

use crate::generator::GenError;

/// All knobs for one generation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratorParameter {
    /// Grid width in tiles.
    pub width: i32,
    /// Grid height in tiles.
    pub height: i32,

    /// Elevation added to every tile before clamping.
    pub base_height: i32,
    /// Tiles below this elevation are clamped up to it.
    pub min_height: i32,
    /// Number of distinct elevation steps above the base.
    pub max_height: i32,
    /// Tiles that would land below `min_height - water_min_diff` become
    /// water. The gap leaves flat shoreline instead of flooding every
    /// lowland tile.
    pub water_min_diff: i32,

    pub has_water: bool,
    pub has_rivers: bool,
    pub has_cities: bool,
    pub has_city_connections: bool,

    /// Amount of forest on the map, 0.0 to 1.0.
    pub forest_size: f32,
    /// Amount of mineral resources on the map, 0.0 to 1.0.
    pub resource_size: f32,
    /// Number of cities relative to map area, 0.0 to 1.0.
    pub cities_number: f32,
    /// Average city size, 0.0 to 1.0.
    pub city_size: f32,
    /// Random downward offset applied per city to `city_size`.
    pub city_size_random_offset: f32,

    pub random_seed: u64,
}

impl Default for GeneratorParameter {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            base_height: 2,
            min_height: 5,
            max_height: 12,
            water_min_diff: 2,
            has_water: true,
            has_rivers: true,
            has_cities: true,
            has_city_connections: true,
            forest_size: 0.5,
            resource_size: 0.5,
            cities_number: 0.5,
            city_size: 0.5,
            city_size_random_offset: 0.25,
            random_seed: 0,
        }
    }
}

impl GeneratorParameter {
    /// Boundary validation. The pipeline itself never range-checks.
    pub fn validate(&self) -> Result<(), GenError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(GenError::InvalidParameter(format!(
                "map size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.base_height < 0 || self.min_height < 0 {
            return Err(GenError::InvalidParameter(
                "heights must be non-negative".into(),
            ));
        }
        if self.max_height < 1 {
            return Err(GenError::InvalidParameter(
                "max_height must be at least 1".into(),
            ));
        }
        if self.water_min_diff < 0 || self.water_min_diff > self.min_height {
            return Err(GenError::InvalidParameter(format!(
                "water_min_diff must be in 0..={}, got {}",
                self.min_height, self.water_min_diff
            )));
        }
        for (name, value) in [
            ("forest_size", self.forest_size),
            ("resource_size", self.resource_size),
            ("cities_number", self.cities_number),
            ("city_size", self.city_size),
            ("city_size_random_offset", self.city_size_random_offset),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GenError::InvalidParameter(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}
