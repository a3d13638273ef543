//! ASCII rendering of generated maps
//!
//! A terminal preview for inspecting generation output without the game's
//! renderer: one glyph per tile, either by feature kind or by elevation.

use crate::grid::Grid;
use crate::tile::{Tile, TileKind};

/// ASCII rendering modes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsciiMode {
    /// Show feature kinds
    Kind,
    /// Show elevation digits
    Height,
}

/// Get the ASCII character for a tile's feature kind.
pub fn kind_char(tile: &Tile) -> char {
    match tile.kind {
        TileKind::Empty => {
            if tile.is_flat() {
                '.'
            } else {
                '/'
            }
        }
        TileKind::Water => '~',
        TileKind::House => 'H',
        TileKind::Forest => 'T',
        TileKind::Road => '#',
        TileKind::Bridge => '=',
        TileKind::PizzaStore => 'P',
        TileKind::Stone => 's',
        TileKind::Coal => 'c',
        TileKind::Ore => 'o',
        TileKind::Oil => 'O',
    }
}

/// Get the ASCII character for a tile's elevation (last decimal digit).
pub fn height_char(tile: &Tile) -> char {
    char::from_digit((tile.max_height().max(0) as u32) % 10, 10).unwrap_or('?')
}

/// Render the whole grid as newline-separated rows.
pub fn render(grid: &Grid<Tile>, mode: AsciiMode) -> String {
    let mut out = String::with_capacity(((grid.width() + 1) * grid.height()) as usize);
    for (c, tile) in grid.iter() {
        out.push(match mode {
            AsciiMode::Kind => kind_char(tile),
            AsciiMode::Height => height_char(tile),
        });
        if c.x == grid.width() - 1 {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Coord;

    #[test]
    fn test_render_dimensions() {
        let grid = Grid::from_fn(6, 4, |c| Tile::new(c, 5));
        let text = render(&grid, AsciiMode::Kind);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| l.chars().count() == 6));
    }

    #[test]
    fn test_kind_glyphs() {
        let mut grid = Grid::from_fn(3, 1, |c| Tile::new(c, 5));
        grid.get_mut(Coord::new(0, 0)).kind = TileKind::Water;
        grid.get_mut(Coord::new(1, 0)).kind = TileKind::Road;
        let text = render(&grid, AsciiMode::Kind);
        assert_eq!(text, "~#.\n");
    }

    #[test]
    fn test_height_digits() {
        let mut grid = Grid::from_fn(2, 1, |c| Tile::new(c, 7));
        grid.get_mut(Coord::new(1, 0)).set_all_heights(12);
        assert_eq!(render(&grid, AsciiMode::Height), "72\n");
    }
}
