//! City connection module
//!
//! Lays the inter-city road network: a minimum spanning tree over the city
//! rooms plus redundant shortcut edges where the tree detour is much longer
//! than the crow flies, each edge realized with terrain-aware A* and
//! painted as road (bridges where it crosses water).

use tracing::{debug, warn};

use crate::generator::{GenContext, GenError, GeneratorModule};
use crate::grid::{Coord, Grid};
use crate::pathfind::astar4;
use crate::room::Room;
use crate::room_graph::RoomGraph;
use crate::tile::{Tile, TileKind};

/// Rooms below this size don't participate in the network.
const CONNECTABLE_MIN_TILES: usize = 5;
/// A pair gets a shortcut when the tree detour exceeds the direct distance
/// by this factor.
const SHORTCUT_FACTOR: f32 = 1.5;
/// Search window around a middle point for a road endpoint.
const ROAD_SEARCH_RADIUS: i32 = 2;

pub struct CityConnectionModule;

impl GeneratorModule for CityConnectionModule {
    fn name(&self) -> &'static str {
        "city_connections"
    }

    fn apply(&self, ctx: &mut GenContext) -> Result<(), GenError> {
        let cancel = ctx.cancel.clone();
        let rooms: Vec<&Room> = ctx
            .cities
            .iter()
            .filter(|r| r.len() >= CONNECTABLE_MIN_TILES)
            .collect();
        if rooms.len() < 2 {
            return Ok(());
        }

        // Complete graph on squared center distances, reduced to its MST.
        let graph = RoomGraph::connect_all_with(rooms.len(), |a, b| {
            Some(rooms[a].distance_sq_to(rooms[b]) as f32)
        });
        let mst = graph.minimum_spanning_tree();

        // Shortcuts: compare direct distance against the path through the
        // tree, both in plain (unsquared) units.
        let metric = mst.clone().map_weights(f32::sqrt);
        let mut edges = mst.edges();
        for a in 0..rooms.len() {
            for b in (a + 1)..rooms.len() {
                if mst.has_edge(a, b) {
                    continue;
                }
                let direct = (rooms[a].distance_sq_to(rooms[b]) as f32).sqrt();
                if let Some(via_tree) = metric.path_distance(a, b) {
                    if direct * SHORTCUT_FACTOR < via_tree {
                        edges.push((a, b, direct));
                    }
                }
            }
        }
        debug!(
            cities = rooms.len(),
            connections = edges.len(),
            "connecting city road network"
        );

        let grid = &mut ctx.grid;
        for (a, b, _) in edges {
            if cancel.is_cancelled() {
                return Err(GenError::Cancelled);
            }
            connect_rooms(grid, rooms[a], rooms[b]);
        }

        Ok(())
    }
}

/// A road tile at or near the room's middle point.
fn road_near_middle(grid: &Grid<Tile>, room: &Room) -> Option<Coord> {
    let mid = room.middle_point();
    if grid.get(mid).kind == TileKind::Road {
        return Some(mid);
    }
    for x in (mid.x - ROAD_SEARCH_RADIUS)..=(mid.x + ROAD_SEARCH_RADIUS) {
        for y in (mid.y - ROAD_SEARCH_RADIUS)..=(mid.y + ROAD_SEARCH_RADIUS) {
            let c = Coord::new(x, y);
            if grid.in_bounds(c) && grid.get(c).kind == TileKind::Road {
                return Some(c);
            }
        }
    }
    None
}

/// The road tile of `room` nearest to `from`; ties pinned to the smallest
/// coordinate.
fn nearest_road_tile(grid: &Grid<Tile>, room: &Room, from: Coord) -> Option<Coord> {
    let mut best: Option<(i64, Coord)> = None;
    for &c in room.tiles() {
        if grid.get(c).kind != TileKind::Road {
            continue;
        }
        let d = from.distance_sq(c);
        best = match best {
            None => Some((d, c)),
            Some((bd, bc)) if d < bd || (d == bd && c < bc) => Some((d, c)),
            other => other,
        };
    }
    best.map(|(_, c)| c)
}

/// Route one road between two city rooms and paint it onto the grid.
/// Unreachable pairs are skipped; a partially connected network is fine.
fn connect_rooms(grid: &mut Grid<Tile>, a: &Room, b: &Room) {
    let Some(start) = road_near_middle(grid, a) else {
        warn!(middle = %a.middle_point(), "no road near city middle, skipping connection");
        return;
    };
    let target = match nearest_road_tile(grid, b, start).or_else(|| road_near_middle(grid, b)) {
        Some(t) => t,
        None => {
            warn!(middle = %b.middle_point(), "target city has no road tiles, skipping connection");
            return;
        }
    };

    let cost = |t: &Tile| match t.kind {
        TileKind::Road | TileKind::Bridge => 1.0,
        TileKind::Water => 7.0,
        TileKind::Forest => 3.0,
        TileKind::House => 20.0,
        _ => 2.0,
    };

    let Some(path) = astar4(grid, start, target, |t| t.is_road_placeable(true), cost, true)
    else {
        warn!(%start, %target, "cities unreachable, skipping connection");
        return;
    };

    for c in path {
        let tile = grid.get_mut(c);
        tile.kind = if tile.kind == TileKind::Water {
            TileKind::Bridge
        } else {
            TileKind::Road
        };
    }
}
