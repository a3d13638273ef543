//! Connected tile regions
//!
//! A `Room` is a connected set of grid coordinates produced by flood fill
//! or incremental growth (cities, water bodies, resource patches). Bounds
//! are maintained incrementally; the representative middle point is
//! computed lazily and cached.

use std::cell::OnceCell;

use fxhash::FxHashSet;

use crate::grid::Coord;

/// A connected set of tile coordinates with a bounding box and a cached
/// representative point.
#[derive(Clone, Debug)]
pub struct Room {
    tiles: FxHashSet<Coord>,
    x_min: i32,
    x_max: i32,
    y_min: i32,
    y_max: i32,
    middle: OnceCell<Coord>,
}

impl Room {
    pub fn new() -> Self {
        Self {
            tiles: FxHashSet::default(),
            x_min: i32::MAX,
            x_max: i32::MIN,
            y_min: i32::MAX,
            y_max: i32::MIN,
            middle: OnceCell::new(),
        }
    }

    pub fn from_tiles(tiles: FxHashSet<Coord>) -> Self {
        let mut room = Self::new();
        room.tiles = tiles;
        for &c in &room.tiles {
            room.x_min = room.x_min.min(c.x);
            room.x_max = room.x_max.max(c.x);
            room.y_min = room.y_min.min(c.y);
            room.y_max = room.y_max.max(c.y);
        }
        room
    }

    pub fn add(&mut self, c: Coord) {
        if self.tiles.insert(c) {
            self.x_min = self.x_min.min(c.x);
            self.x_max = self.x_max.max(c.x);
            self.y_min = self.y_min.min(c.y);
            self.y_max = self.y_max.max(c.y);
            self.middle = OnceCell::new();
        }
    }

    pub fn tiles(&self) -> &FxHashSet<Coord> {
        &self.tiles
    }

    /// Tiles in ascending coordinate order, for deterministic sampling.
    pub fn sorted_tiles(&self) -> Vec<Coord> {
        let mut v: Vec<Coord> = self.tiles.iter().copied().collect();
        v.sort();
        v
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, c: Coord) -> bool {
        self.tiles.contains(&c)
    }

    /// (x_min, y_min, x_max, y_max). Meaningless while the room is empty.
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        (self.x_min, self.y_min, self.x_max, self.y_max)
    }

    /// The tile nearest to the bounding-box center by Euclidean distance.
    ///
    /// Distances are compared in exact integer arithmetic on doubled
    /// coordinates; ties go to the smallest coordinate. Cached until the
    /// tile set changes.
    pub fn middle_point(&self) -> Coord {
        assert!(!self.tiles.is_empty(), "middle point of an empty room");
        *self.middle.get_or_init(|| {
            let cx2 = self.x_min + self.x_max;
            let cy2 = self.y_min + self.y_max;
            let mut best: Option<(i64, Coord)> = None;
            for &c in &self.tiles {
                let dx = (2 * c.x - cx2) as i64;
                let dy = (2 * c.y - cy2) as i64;
                let d = dx * dx + dy * dy;
                best = match best {
                    None => Some((d, c)),
                    Some((bd, bc)) if d < bd || (d == bd && c < bc) => Some((d, c)),
                    other => other,
                };
            }
            best.expect("non-empty room").1
        })
    }

    /// Squared distance between the two rooms' middle points.
    pub fn distance_sq_to(&self, other: &Room) -> i64 {
        self.middle_point().distance_sq(other.middle_point())
    }

    pub fn intersects(&self, other: &Room) -> bool {
        let (small, big) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.tiles.iter().any(|c| big.tiles.contains(c))
    }

    /// Union the other room's tiles into this one.
    pub fn merge(&mut self, other: &Room) {
        for &c in &other.tiles {
            self.add(c);
        }
    }

    /// Keep only tiles matching the predicate, recomputing bounds.
    pub fn retain(&mut self, pred: impl Fn(Coord) -> bool) {
        let kept: FxHashSet<Coord> = self.tiles.iter().copied().filter(|&c| pred(c)).collect();
        *self = Self::from_tiles(kept);
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.tiles == other.tiles
    }
}
