use std::time::Instant;

use clap::Parser;

use map_generator::ascii::{self, AsciiMode};
use map_generator::export;
use map_generator::generator::MapGenerator;
use map_generator::params::GeneratorParameter;
use map_generator::tile::TileKind;

#[derive(Parser, Debug)]
#[command(name = "map_generator")]
#[command(about = "Generate procedural city maps with terrain, rivers and road networks")]
struct Args {
    /// Map width in tiles
    #[arg(short = 'W', long, default_value = "256")]
    width: i32,

    /// Map height in tiles
    #[arg(short = 'H', long, default_value = "256")]
    height: i32,

    /// Random seed (uses a random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Load parameters from a JSON file (other flags override it)
    #[arg(long)]
    params: Option<String>,

    /// Number of cities relative to map area (0.0-1.0)
    #[arg(long, default_value = "0.5")]
    cities: f32,

    /// Average city size (0.0-1.0)
    #[arg(long, default_value = "0.5")]
    city_size: f32,

    /// Amount of forest (0.0-1.0)
    #[arg(long, default_value = "0.5")]
    forest: f32,

    /// Amount of mineral resources (0.0-1.0)
    #[arg(long, default_value = "0.5")]
    resources: f32,

    /// Disable water and rivers
    #[arg(long)]
    no_water: bool,

    /// Disable inter-city road connections
    #[arg(long)]
    no_connections: bool,

    /// Print the map as ASCII (kind or height)
    #[arg(long)]
    ascii: Option<String>,

    /// Export a PNG overview to this path
    #[arg(long)]
    png: Option<String>,

    /// Save the effective parameters to a JSON file
    #[arg(long)]
    save_params: Option<String>,
}

fn build_params(args: &Args) -> Result<GeneratorParameter, Box<dyn std::error::Error>> {
    let mut param = match &args.params {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => GeneratorParameter::default(),
    };

    param.width = args.width;
    param.height = args.height;
    param.random_seed = args.seed.unwrap_or_else(rand::random);
    param.cities_number = args.cities;
    param.city_size = args.city_size;
    param.forest_size = args.forest;
    param.resource_size = args.resources;
    if args.no_water {
        param.has_water = false;
        param.has_rivers = false;
    }
    if args.no_connections {
        param.has_city_connections = false;
    }

    Ok(param)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let param = build_params(&args)?;

    println!(
        "Generating {}x{} map with seed {}...",
        param.width, param.height, param.random_seed
    );

    let start = Instant::now();
    let map = MapGenerator::new(param.clone())?.generate()?;
    let elapsed = start.elapsed();

    if let Some(mode) = &args.ascii {
        let mode = match mode.as_str() {
            "height" => AsciiMode::Height,
            _ => AsciiMode::Kind,
        };
        print!("{}", ascii::render(&map.tiles, mode));
    }

    // Summary statistics
    let mut water = 0usize;
    let mut roads = 0usize;
    let mut houses = 0usize;
    let mut forest = 0usize;
    let mut resources = 0usize;
    for (_, tile) in map.tiles.iter() {
        match tile.kind {
            TileKind::Water => water += 1,
            TileKind::Road | TileKind::Bridge => roads += 1,
            TileKind::House => houses += 1,
            TileKind::Forest => forest += 1,
            k if k.is_resource() => resources += 1,
            _ => {}
        }
    }

    println!("Generated in {:.2?}", elapsed);
    println!("  Cities: {}", map.cities.len());
    for (i, city) in map.cities.iter().enumerate() {
        println!(
            "    #{i}: {} tiles, middle at {}",
            city.len(),
            city.middle_point()
        );
    }
    println!("  Water bodies: {}", map.waters.len());
    println!(
        "  Tiles: {water} water, {roads} road, {houses} house, {forest} forest, {resources} resource"
    );

    if let Some(path) = &args.png {
        export::export_overview(&map.tiles, path)?;
        println!("Overview written to {path}");
    }

    if let Some(path) = &args.save_params {
        std::fs::write(path, serde_json::to_string_pretty(&param)?)?;
        println!("Parameters written to {path}");
    }

    Ok(())
}
