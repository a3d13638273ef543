//! Generic A* search over the grid
//!
//! Walkability, step cost and the neighbor relation are all supplied by the
//! caller, so the same engine serves river routing (flat valley tiles,
//! unit cost), inter-city roads (terrain-weighted cost) and gameplay agent
//! pathfinding (road tiles only).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use fxhash::{FxHashMap, FxHashSet};

use crate::grid::{Coord, Grid};

/// Entry in the open set. The heap is a max-heap, so the ordering is
/// inverted; ties resolve by insertion sequence for determinism.
struct OpenNode {
    priority: f32,
    seq: u64,
    coord: Coord,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Classic A* with a Euclidean heuristic.
///
/// `cost` is evaluated on the departure tile of each step. The target does
/// not need to be walkable to be reached; every other tile on the returned
/// path does. With `reverse_path` the result runs source→target, otherwise
/// target→source; both ends are included.
///
/// Returns `None` when the target is unreachable — a normal outcome the
/// caller is expected to handle by skipping the connection.
pub fn astar<T>(
    grid: &Grid<T>,
    source: Coord,
    target: Coord,
    is_walkable: impl Fn(&T) -> bool,
    cost: impl Fn(&T) -> f32,
    neighbors: impl Fn(Coord) -> Vec<Coord>,
    reverse_path: bool,
) -> Option<Vec<Coord>> {
    let mut open = BinaryHeap::new();
    let mut g_cost: FxHashMap<Coord, f32> = FxHashMap::default();
    let mut came_from: FxHashMap<Coord, Coord> = FxHashMap::default();
    let mut closed: FxHashSet<Coord> = FxHashSet::default();
    let mut seq = 0u64;

    g_cost.insert(source, 0.0);
    open.push(OpenNode {
        priority: 0.0,
        seq,
        coord: source,
    });

    while let Some(node) = open.pop() {
        let current = node.coord;

        if current == target {
            return Some(reconstruct(&came_from, source, target, reverse_path));
        }
        if closed.contains(&current) {
            continue;
        }
        if !is_walkable(grid.get(current)) {
            continue;
        }
        closed.insert(current);

        let step_cost = cost(grid.get(current));
        let current_g = g_cost[&current];

        for n in neighbors(current) {
            if closed.contains(&n) {
                continue;
            }
            let tentative = current_g + step_cost;
            if tentative >= *g_cost.get(&n).unwrap_or(&f32::INFINITY) {
                continue;
            }
            came_from.insert(n, current);
            g_cost.insert(n, tentative);
            seq += 1;
            open.push(OpenNode {
                priority: tentative + n.distance(target),
                seq,
                coord: n,
            });
        }
    }

    None
}

/// A* over the orthogonal neighbor relation, which is what every pipeline
/// caller uses.
pub fn astar4<T>(
    grid: &Grid<T>,
    source: Coord,
    target: Coord,
    is_walkable: impl Fn(&T) -> bool,
    cost: impl Fn(&T) -> f32,
    reverse_path: bool,
) -> Option<Vec<Coord>> {
    astar(
        grid,
        source,
        target,
        is_walkable,
        cost,
        |c| grid.neighbors4(c),
        reverse_path,
    )
}

fn reconstruct(
    came_from: &FxHashMap<Coord, Coord>,
    source: Coord,
    target: Coord,
    reverse_path: bool,
) -> Vec<Coord> {
    let mut path = vec![target];
    let mut current = target;
    while current != source {
        current = came_from[&current];
        path.push(current);
    }
    if reverse_path {
        path.reverse();
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(w: i32, h: i32) -> Grid<i32> {
        Grid::new(w, h)
    }

    #[test]
    fn test_path_endpoints_and_adjacency() {
        let grid = open_grid(10, 10);
        let source = Coord::new(1, 1);
        let target = Coord::new(7, 4);
        let path = astar4(&grid, source, target, |_| true, |_| 1.0, true).unwrap();

        assert_eq!(*path.first().unwrap(), source);
        assert_eq!(*path.last().unwrap(), target);
        for pair in path.windows(2) {
            assert_eq!(
                (pair[0].x - pair[1].x).abs() + (pair[0].y - pair[1].y).abs(),
                1
            );
        }
        // Unit cost on an open grid: path length equals Manhattan distance.
        assert_eq!(path.len() as i32, 6 + 3 + 1);
    }

    #[test]
    fn test_unreversed_path_runs_target_to_source() {
        let grid = open_grid(5, 5);
        let source = Coord::new(0, 0);
        let target = Coord::new(3, 0);
        let path = astar4(&grid, source, target, |_| true, |_| 1.0, false).unwrap();
        assert_eq!(*path.first().unwrap(), target);
        assert_eq!(*path.last().unwrap(), source);
    }

    #[test]
    fn test_walls_force_detour() {
        // A vertical wall of 1s with a single gap at y=4.
        let mut grid = open_grid(9, 9);
        for y in 0..9 {
            if y != 4 {
                grid.set(Coord::new(4, y), 1);
            }
        }
        let path = astar4(
            &grid,
            Coord::new(0, 0),
            Coord::new(8, 0),
            |v| *v == 0,
            |_| 1.0,
            true,
        )
        .unwrap();

        // Every interior tile of the path is walkable.
        for &c in &path[..path.len() - 1] {
            assert_eq!(*grid.get(c), 0);
        }
        // The path must pass through the gap.
        assert!(path.contains(&Coord::new(4, 4)));
    }

    #[test]
    fn test_unreachable_returns_none() {
        let mut grid = open_grid(7, 7);
        for y in 0..7 {
            grid.set(Coord::new(3, y), 1);
        }
        let path = astar4(
            &grid,
            Coord::new(0, 3),
            Coord::new(6, 3),
            |v| *v == 0,
            |_| 1.0,
            true,
        );
        assert!(path.is_none());
    }

    #[test]
    fn test_cost_function_steers_path() {
        // Row y=1 is cheap, everything else expensive: the path should
        // drop into the cheap row between the endpoints.
        let mut grid = open_grid(8, 3);
        for x in 0..8 {
            grid.set(Coord::new(x, 1), -1);
        }
        let path = astar4(
            &grid,
            Coord::new(0, 0),
            Coord::new(7, 0),
            |_| true,
            |v| if *v == -1 { 1.0 } else { 10.0 },
            true,
        )
        .unwrap();
        let cheap = path.iter().filter(|c| c.y == 1).count();
        assert!(cheap >= 6, "expected the path to use the cheap row");
    }

    #[test]
    fn test_deterministic_for_equal_cost_ties() {
        let grid = open_grid(12, 12);
        let a = astar4(&grid, Coord::new(0, 0), Coord::new(9, 9), |_| true, |_| 1.0, true);
        let b = astar4(&grid, Coord::new(0, 0), Coord::new(9, 9), |_| true, |_| 1.0, true);
        assert_eq!(a, b);
    }
}
