//! Tile data model
//!
//! A tile stores elevation at its four corners (N, E, S, W), a terrain/
//! feature classification, a district for city houses, and an appearance
//! index consumed by the rendering layer.

use serde::{Deserialize, Serialize};

use crate::grid::Coord;

/// Slope bitmask values for the four corners.
pub const SLOPE_N: i32 = 1;
pub const SLOPE_E: i32 = 2;
pub const SLOPE_S: i32 = 4;
pub const SLOPE_W: i32 = 8;

/// The four slope indices roads can sit on (one-directional ramps).
pub const RAMP_SLOPES: [i32; 4] = [3, 6, 9, 12];

/// What occupies a tile. Mutually exclusive; later pipeline modules may
/// overwrite earlier classifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileKind {
    #[default]
    Empty,
    Water,
    House,
    Forest,
    Road,
    Bridge,
    PizzaStore,
    Stone,
    Coal,
    Ore,
    Oil,
}

impl TileKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            TileKind::Empty => "Empty",
            TileKind::Water => "Water",
            TileKind::House => "House",
            TileKind::Forest => "Forest",
            TileKind::Road => "Road",
            TileKind::Bridge => "Bridge",
            TileKind::PizzaStore => "Pizza Store",
            TileKind::Stone => "Stone",
            TileKind::Coal => "Coal",
            TileKind::Ore => "Ore",
            TileKind::Oil => "Oil",
        }
    }

    /// Resource kinds placed by the resource module.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            TileKind::Stone | TileKind::Coal | TileKind::Ore | TileKind::Oil
        )
    }
}

/// Population district classification, set only for House tiles inside a
/// city room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum District {
    #[default]
    None,
    Suburb,
    City,
    Business,
    Industry,
}

/// Index-based back-reference from a tile to the room that owns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomRef {
    City(u16),
    Water(u16),
}

/// One grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub coord: Coord,
    /// Corner elevations in order N, E, S, W.
    pub heights: [i32; 4],
    pub kind: TileKind,
    /// Opaque appearance index for the rendering layer. For roads this is
    /// the direction bitmask computed by the cleanup module.
    pub appearance: i32,
    pub district: District,
    pub owner: Option<RoomRef>,
}

impl Tile {
    /// A flat tile at elevation `h`.
    pub fn new(coord: Coord, h: i32) -> Self {
        Self {
            coord,
            heights: [h, h, h, h],
            kind: TileKind::Empty,
            appearance: 0,
            district: District::None,
            owner: None,
        }
    }

    pub fn set_all_heights(&mut self, h: i32) {
        self.heights = [h, h, h, h];
    }

    pub fn max_height(&self) -> i32 {
        self.heights.iter().copied().max().unwrap_or(0)
    }

    pub fn is_flat(&self) -> bool {
        self.heights.iter().all(|&h| h == self.heights[0])
    }

    /// Bitmask over corners lower than the tile's maximum height
    /// (N=1, E=2, S=4, W=8). Flat tiles have slope index 0.
    pub fn slope_index(&self) -> i32 {
        let m = self.max_height();
        let mut slope = 0;
        for (i, &h) in self.heights.iter().enumerate() {
            if h < m {
                slope += match i {
                    0 => SLOPE_N,
                    1 => SLOPE_E,
                    2 => SLOPE_S,
                    _ => SLOPE_W,
                };
            }
        }
        slope
    }

    /// Houses require flat, unoccupied ground.
    pub fn is_house_placeable(&self) -> bool {
        self.is_flat() && self.kind == TileKind::Empty
    }

    /// Roads go on flat tiles and on the four ramp slopes.
    pub fn is_road_placeable(&self, water_allowed: bool) -> bool {
        if self.kind == TileKind::Water && !water_allowed {
            return false;
        }
        if self.is_flat() {
            return true;
        }
        RAMP_SLOPES.contains(&self.slope_index())
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::new(Coord::new(0, 0), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_tile_has_zero_slope() {
        let t = Tile::new(Coord::new(0, 0), 5);
        assert!(t.is_flat());
        assert_eq!(t.slope_index(), 0);
        assert_eq!(t.max_height(), 5);
    }

    #[test]
    fn test_slope_index_bits() {
        let mut t = Tile::new(Coord::new(0, 0), 5);
        // S and W corners lowered: a north-east facing ramp.
        t.heights = [6, 6, 5, 5];
        assert_eq!(t.slope_index(), SLOPE_S + SLOPE_W);
        assert!(t.is_road_placeable(true));

        // Single corner lowered: not a ramp, no road.
        t.heights = [5, 6, 6, 6];
        assert_eq!(t.slope_index(), SLOPE_N);
        assert!(!t.is_road_placeable(true));
    }

    #[test]
    fn test_house_placement_requires_flat_empty() {
        let mut t = Tile::new(Coord::new(0, 0), 3);
        assert!(t.is_house_placeable());
        t.kind = TileKind::Road;
        assert!(!t.is_house_placeable());
        t.kind = TileKind::Empty;
        t.heights = [3, 3, 3, 4];
        assert!(!t.is_house_placeable());
    }

    #[test]
    fn test_water_blocks_roads_unless_allowed() {
        let mut t = Tile::new(Coord::new(0, 0), 3);
        t.kind = TileKind::Water;
        assert!(t.is_road_placeable(true));
        assert!(!t.is_road_placeable(false));
    }
}
