//! PNG export of generated maps
//!
//! Writes a top-down overview image: one pixel per tile, colored by feature
//! kind and shaded by elevation so the terrain relief stays readable.

use image::{ImageBuffer, Rgb, RgbImage};

use crate::grid::Grid;
use crate::tile::{Tile, TileKind};

/// Export the map overview as a PNG.
pub fn export_overview(grid: &Grid<Tile>, path: &str) -> Result<(), image::ImageError> {
    let mut img: RgbImage = ImageBuffer::new(grid.width() as u32, grid.height() as u32);

    let mut max_height = 1;
    for (_, tile) in grid.iter() {
        max_height = max_height.max(tile.max_height());
    }

    for (c, tile) in grid.iter() {
        let color = tile_color(tile, max_height);
        img.put_pixel(c.x as u32, c.y as u32, Rgb(color));
    }

    img.save(path)
}

/// Base color by feature kind, shaded by elevation for open terrain.
fn tile_color(tile: &Tile, max_height: i32) -> [u8; 3] {
    let base: [u8; 3] = match tile.kind {
        TileKind::Empty => [110, 160, 80],    // Grassland
        TileKind::Water => [60, 110, 190],    // Water
        TileKind::House => [200, 170, 120],   // Buildings
        TileKind::Forest => [40, 100, 50],    // Forest
        TileKind::Road => [90, 90, 90],       // Asphalt
        TileKind::Bridge => [140, 120, 100],  // Wooden bridge
        TileKind::PizzaStore => [220, 60, 60],
        TileKind::Stone => [150, 150, 150],
        TileKind::Coal => [50, 50, 50],
        TileKind::Ore => [170, 110, 60],
        TileKind::Oil => [80, 60, 100],
    };

    match tile.kind {
        TileKind::Empty | TileKind::Forest => {
            // 60%..100% brightness from low to high ground.
            let t = tile.max_height() as f32 / max_height as f32;
            let shade = 0.6 + 0.4 * t.clamp(0.0, 1.0);
            [
                (base[0] as f32 * shade) as u8,
                (base[1] as f32 * shade) as u8,
                (base[2] as f32 * shade) as u8,
            ]
        }
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Coord;

    #[test]
    fn test_higher_ground_is_brighter() {
        let mut low = Tile::new(Coord::new(0, 0), 2);
        let mut high = Tile::new(Coord::new(0, 0), 10);
        low.kind = TileKind::Empty;
        high.kind = TileKind::Empty;
        let c_low = tile_color(&low, 10);
        let c_high = tile_color(&high, 10);
        assert!(c_high[1] > c_low[1]);
    }

    #[test]
    fn test_feature_colors_ignore_height() {
        let mut a = Tile::new(Coord::new(0, 0), 2);
        let mut b = Tile::new(Coord::new(0, 0), 9);
        a.kind = TileKind::Road;
        b.kind = TileKind::Road;
        assert_eq!(tile_color(&a, 10), tile_color(&b, 10));
    }
}
