//! City module
//!
//! Places non-overlapping city sites, grows a road-and-house network out of
//! each via a queue of street intersections, merges cities that grew into
//! each other and assigns population districts with a multi-source
//! nearest-seed fill.

use std::collections::VecDeque;

use fxhash::FxHashSet;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::appearance::AppearanceResolver;
use crate::generator::{GenContext, GenError, GeneratorModule};
use crate::grid::{Coord, Grid};
use crate::room::Room;
use crate::tile::{District, Tile, TileKind};

/// Map area granted to one potential city.
const CHUNK: i32 = 32;
/// Base side length of a city's tile budget before size knobs.
const CHUNK_BASE_SIDE: i32 = CHUNK / 4;
/// Rooms smaller than this are dropped as degenerate.
const CITY_MIN_SIZE: usize = 15;
const ROAD_STEPS_MIN: i32 = 3;
const ROAD_STEPS_MAX: i32 = 5;
/// Chance each outgoing direction of a new intersection stays open.
const DIRECTION_PROB: f64 = 0.75;
/// Push-apart rounds for overlapping placement rectangles.
const SEPARATION_ITERATIONS: usize = 64;
/// A rectangle clamped back into bounds more often than this is dropped.
const CLAMP_BUDGET: u32 = 10;
/// One district seed point per this many city tiles.
const TILES_PER_DISTRICT_POINT: usize = 30;

pub struct CityModule;

impl GeneratorModule for CityModule {
    fn name(&self) -> &'static str {
        "cities"
    }

    fn apply(&self, ctx: &mut GenContext) -> Result<(), GenError> {
        let mut rng = ctx.stage_rng("cities");

        let (sites, mut unplaceable) = place_sites(&ctx.grid, ctx.param, &mut rng);

        let cancel = ctx.cancel.clone();
        for site in &sites {
            ctx.ensure_not_cancelled()?;
            let Some(start) = walk_to_flat(&ctx.grid, site.center()) else {
                unplaceable += 1;
                continue;
            };
            let room = grow_city(
                &mut ctx.grid,
                ctx.appearance,
                &mut rng,
                start,
                site.target,
                &cancel,
            )?;
            ctx.cities.push(room);
        }
        debug!(
            placed = ctx.cities.len(),
            unplaceable, "city growth finished"
        );

        merge_overlapping(&mut ctx.cities);

        ctx.cities.retain(|room| {
            if room.len() >= CITY_MIN_SIZE {
                true
            } else {
                debug!(tiles = room.len(), "dropping degenerate city room");
                false
            }
        });

        ctx.ensure_not_cancelled()?;
        assign_districts(&mut ctx.grid, &ctx.cities, &mut rng);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Site placement
// ---------------------------------------------------------------------------

/// A square placement rectangle plus the tile budget its city grows to.
#[derive(Clone, Copy, Debug)]
struct CitySite {
    x: i32,
    y: i32,
    side: i32,
    target: usize,
    clamps: u32,
}

impl CitySite {
    fn center(&self) -> Coord {
        Coord::new(self.x + self.side / 2, self.y + self.side / 2)
    }

    fn overlaps(&self, other: &CitySite) -> bool {
        self.x < other.x + other.side
            && other.x < self.x + self.side
            && self.y < other.y + other.side
            && other.y < self.y + self.side
    }

    fn clamp_into(&mut self, width: i32, height: i32) {
        let mut clamped = false;
        if self.x < 0 {
            self.x = 0;
            clamped = true;
        }
        if self.x + self.side > width {
            self.x = width - self.side;
            clamped = true;
        }
        if self.y < 0 {
            self.y = 0;
            clamped = true;
        }
        if self.y + self.side > height {
            self.y = height - self.side;
            clamped = true;
        }
        if clamped {
            self.clamps += 1;
        }
    }
}

/// Tile budget for one city: the chunk base area adjusted by the size knob
/// minus a random per-city offset.
fn city_target_tiles(
    param: &crate::params::GeneratorParameter,
    rng: &mut ChaCha8Rng,
) -> usize {
    let base = (CHUNK_BASE_SIDE * CHUNK_BASE_SIDE) as f32;
    let size_factor = param.city_size - rng.gen::<f32>() * param.city_size_random_offset;
    let grow = (base * size_factor) as i32;
    ((base as i32 + grow).max(CITY_MIN_SIZE as i32)) as usize
}

/// Scatter square placement rectangles, push overlapping pairs apart along
/// their dominant separation axis, and discard rectangles that fell off
/// the map too often or sit mostly in water. Returns the surviving sites
/// and the number abandoned.
fn place_sites(
    grid: &Grid<Tile>,
    param: &crate::params::GeneratorParameter,
    rng: &mut ChaCha8Rng,
) -> (Vec<CitySite>, usize) {
    let (width, height) = (param.width, param.height);
    let chunks = (width / CHUNK).max(1) * (height / CHUNK).max(1);
    let wanted = (chunks as f32 * param.cities_number + 0.5) as usize;

    let mut sites = Vec::with_capacity(wanted);
    for _ in 0..wanted {
        let target = city_target_tiles(param, rng);
        let side = ((target as f32).sqrt().ceil() as i32).clamp(4, (width.min(height) - 2).max(4));
        let x = rng.gen_range(0..(width - side).max(1));
        let y = rng.gen_range(0..(height - side).max(1));
        sites.push(CitySite {
            x,
            y,
            side,
            target,
            clamps: 0,
        });
    }

    for _ in 0..SEPARATION_ITERATIONS {
        let mut moved = false;
        for i in 0..sites.len() {
            for j in (i + 1)..sites.len() {
                if !sites[i].overlaps(&sites[j]) {
                    continue;
                }
                let (ci, cj) = (sites[i].center(), sites[j].center());
                let dx = cj.x - ci.x;
                let dy = cj.y - ci.y;

                let ox = (sites[i].x + sites[i].side).min(sites[j].x + sites[j].side)
                    - sites[i].x.max(sites[j].x);
                let oy = (sites[i].y + sites[i].side).min(sites[j].y + sites[j].side)
                    - sites[i].y.max(sites[j].y);

                if dx.abs() >= dy.abs() {
                    let push = ox / 2 + 1;
                    let sign = if dx >= 0 { 1 } else { -1 };
                    sites[i].x -= push * sign;
                    sites[j].x += push * sign;
                } else {
                    let push = oy / 2 + 1;
                    let sign = if dy >= 0 { 1 } else { -1 };
                    sites[i].y -= push * sign;
                    sites[j].y += push * sign;
                }
                sites[i].clamp_into(width, height);
                sites[j].clamp_into(width, height);
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }

    let before = sites.len();
    sites.retain(|site| {
        if site.clamps > CLAMP_BUDGET {
            warn!("abandoning city rectangle pushed out of bounds repeatedly");
            return false;
        }
        let area = (site.side * site.side) as usize;
        let mut water = 0usize;
        for y in site.y..(site.y + site.side) {
            for x in site.x..(site.x + site.side) {
                if grid.get(Coord::new(x, y)).kind == TileKind::Water {
                    water += 1;
                }
            }
        }
        if water * 2 > area {
            debug!("discarding city rectangle mostly covered by water");
            return false;
        }
        true
    });

    let dropped = before - sites.len();
    (sites, dropped)
}

/// Nearest flat, non-water tile reachable from `start`, breadth first.
fn walk_to_flat(grid: &Grid<Tile>, start: Coord) -> Option<Coord> {
    if !grid.in_bounds(start) {
        return None;
    }
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(c) = queue.pop_front() {
        let tile = grid.get(c);
        if tile.is_flat() && tile.kind != TileKind::Water {
            return Some(c);
        }
        for n in grid.neighbors4(c) {
            if visited.insert(n) {
                queue.push_back(n);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Growth
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    fn reverse(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Direction::Up => 1,
            Direction::Right => 2,
            Direction::Down => 4,
            Direction::Left => 8,
        }
    }

    /// The two tiles flanking `pos` perpendicular to this direction.
    fn side_neighbors(self, pos: Coord) -> [Coord; 2] {
        match self {
            Direction::Up | Direction::Down => {
                [Coord::new(pos.x - 1, pos.y), Coord::new(pos.x + 1, pos.y)]
            }
            Direction::Right | Direction::Left => {
                [Coord::new(pos.x, pos.y - 1), Coord::new(pos.x, pos.y + 1)]
            }
        }
    }
}

/// A pending street intersection with its open outgoing directions.
struct Intersection {
    pos: Coord,
    dirs: u8,
}

impl Intersection {
    fn has(&self, d: Direction) -> bool {
        self.dirs & d.bit() != 0
    }
}

/// Interim district for a freshly placed house; the nearest-seed fill
/// overwrites it once the city is finished.
fn placeholder_district(rng: &mut ChaCha8Rng) -> District {
    let r: f64 = rng.gen();
    if r < 0.50 {
        District::Suburb
    } else if r < 0.80 {
        District::City
    } else if r < 0.92 {
        District::Business
    } else {
        District::Industry
    }
}

/// Grow one city from `start` until the tile budget is reached or the
/// intersection queue runs dry.
fn grow_city(
    grid: &mut Grid<Tile>,
    appearance: &dyn AppearanceResolver,
    rng: &mut ChaCha8Rng,
    start: Coord,
    target: usize,
    cancel: &crate::generator::CancelToken,
) -> Result<Room, GenError> {
    let mut room = Room::new();
    let mut count = 0usize;
    let mut queue: VecDeque<Intersection> = VecDeque::with_capacity(64);
    queue.push_back(Intersection {
        pos: start,
        dirs: 0b1111,
    });

    // One axis of the street grid uses short blocks, the other mixes in
    // longer ones.
    let left_right_is_short = rng.gen_bool(0.5);

    while let Some(intersection) = queue.pop_front() {
        if cancel.is_cancelled() {
            return Err(GenError::Cancelled);
        }
        if count >= target {
            break;
        }
        let pos = intersection.pos;
        if !grid.in_bounds(pos) {
            continue;
        }
        grid.get_mut(pos).kind = TileKind::Road;
        room.add(pos);

        for d in Direction::ALL {
            if !intersection.has(d) {
                continue;
            }

            let short_axis = match d {
                Direction::Left | Direction::Right => left_right_is_short,
                Direction::Up | Direction::Down => !left_right_is_short,
            };
            let steps = if short_axis {
                ROAD_STEPS_MIN
            } else {
                rng.gen_range(ROAD_STEPS_MIN..=ROAD_STEPS_MAX)
            };

            // Don't run a street directly alongside an existing one.
            let (dx, dy) = d.delta();
            let first = pos.offset(dx, dy);
            let parallel_road = d
                .side_neighbors(first)
                .into_iter()
                .any(|n| grid.in_bounds(n) && grid.get(n).kind == TileKind::Road);
            if parallel_road {
                continue;
            }

            let mut p = pos;
            let mut aborted = false;
            for _ in 0..steps {
                p = p.offset(dx, dy);
                // Slope gating: only flat tiles and road-legal ramps.
                if !grid.in_bounds(p) || !grid.get(p).is_road_placeable(false) {
                    aborted = true;
                    break;
                }

                for n in d.side_neighbors(p) {
                    if grid.in_bounds(n) && grid.get(n).is_house_placeable() {
                        let district = placeholder_district(rng);
                        let index = appearance.house_index(district, rng);
                        let tile = grid.get_mut(n);
                        tile.kind = TileKind::House;
                        tile.district = district;
                        tile.appearance = index;
                        room.add(n);
                        count += 1;
                    }
                }

                grid.get_mut(p).kind = TileKind::Road;
                room.add(p);
                count += 1;
            }

            if aborted {
                continue;
            }

            let mut dirs = 0u8;
            for nd in Direction::ALL {
                let prob = if nd == d.reverse() { 0.0 } else { DIRECTION_PROB };
                if rng.gen_bool(prob) {
                    dirs |= nd.bit();
                }
            }
            queue.push_back(Intersection { pos: p, dirs });
        }
    }

    Ok(room)
}

/// Merge any two rooms whose tile sets intersect (cities that grew into
/// each other).
fn merge_overlapping(rooms: &mut Vec<Room>) {
    loop {
        let mut merged = None;
        'search: for i in 0..rooms.len() {
            for j in (i + 1)..rooms.len() {
                if rooms[i].intersects(&rooms[j]) {
                    merged = Some((i, j));
                    break 'search;
                }
            }
        }
        match merged {
            Some((i, j)) => {
                let other = rooms.remove(j);
                rooms[i].merge(&other);
            }
            None => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Districts
// ---------------------------------------------------------------------------

/// Compute district seed points for every city and run the nearest-seed
/// fill. Quotas: Suburb 40%, City 30%, Business 12%, Industry 18% of one
/// point per 30 tiles; cities at or above the mean size always get at
/// least one Business and one Industry point; rounding loss goes back into
/// Suburb and City.
fn assign_districts(grid: &mut Grid<Tile>, cities: &[Room], rng: &mut ChaCha8Rng) {
    if cities.is_empty() {
        return;
    }
    let avg = cities.iter().map(Room::len).sum::<usize>() / cities.len();

    for room in cities {
        let total = room.len();
        let points = (total / TILES_PER_DISTRICT_POINT).max(1);

        let mut suburb = (points as f32 * 0.40).round() as usize;
        let mut city = (points as f32 * 0.30).round() as usize;
        let mut business = (points as f32 * 0.12).round() as usize;
        let mut industry = (points as f32 * 0.18).round() as usize;

        if total >= avg {
            business = business.max(1);
            industry = industry.max(1);
        }
        let assigned = suburb + city + business + industry;
        if assigned < points {
            let missing = points - assigned;
            suburb += missing / 2 + missing % 2;
            city += missing / 2;
        }

        let sorted = room.sorted_tiles();
        let mut seeds: Vec<(Coord, District)> = vec![(room.middle_point(), District::City)];
        for (district, quota) in [
            (District::Suburb, suburb),
            (District::City, city),
            (District::Business, business),
            (District::Industry, industry),
        ] {
            for _ in 0..quota {
                let c = sorted[rng.gen_range(0..sorted.len())];
                seeds.push((c, district));
            }
        }

        fill_districts(grid, room, &seeds);
    }
}

/// Assign every House tile in the room the district of its nearest seed by
/// squared Euclidean distance; ties go to the earlier seed.
fn fill_districts(grid: &mut Grid<Tile>, room: &Room, seeds: &[(Coord, District)]) {
    for c in room.sorted_tiles() {
        let mut best: Option<(i64, usize)> = None;
        for (i, &(seed, _)) in seeds.iter().enumerate() {
            let d = c.distance_sq(seed);
            best = match best {
                None => Some((d, i)),
                Some((bd, _)) if d < bd => Some((d, i)),
                other => other,
            };
        }
        if let Some((_, idx)) = best {
            let tile = grid.get_mut(c);
            if tile.kind == TileKind::House {
                tile.district = seeds[idx].1;
            }
        }
    }
}
