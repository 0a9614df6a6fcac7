use std::error::Error;

use clap::Parser;

use terrain_tiles::chunk::ChunkSession;
use terrain_tiles::config::GeneratorConfig;
use terrain_tiles::export;
use terrain_tiles::fetch::{FileRasterSource, HttpTileSource, RasterSource};
use terrain_tiles::mesh::{ChunkOffset, HeightMode};

#[derive(Parser, Debug)]
#[command(name = "terrain_tiles")]
#[command(about = "Generate terrain chunk meshes from terrain-RGB elevation tiles")]
struct Args {
    /// JSON config file (command line flags override its values)
    #[arg(short, long)]
    config: Option<String>,

    /// Anchor location as "latitude, longitude"
    #[arg(long)]
    coordinates: Option<String>,

    /// Zoom level (0-13)
    #[arg(short, long)]
    zoom: Option<u8>,

    /// Quad cells per mesh edge (16-512)
    #[arg(short, long)]
    size: Option<usize>,

    /// Chunk column offset from the anchor tile
    #[arg(long, allow_hyphen_values = true)]
    cx: Option<i32>,

    /// Chunk row offset from the anchor tile
    #[arg(long, allow_hyphen_values = true)]
    cy: Option<i32>,

    /// Drive vertex height from decoded elevation instead of base height plus noise
    #[arg(long)]
    elevation: bool,

    /// Read the raster from a local PNG instead of the tile server
    #[arg(long)]
    raster: Option<String>,

    /// Tile server API key (defaults to $TERRAIN_TILES_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Output OBJ path
    #[arg(short, long, default_value = "chunk.obj")]
    output: String,

    /// Also write decoded elevations as a grayscale PNG
    #[arg(long)]
    elevation_png: Option<String>,

    /// Skip normal recalculation
    #[arg(long)]
    no_normals: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<GeneratorConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::load(path)?,
            None => GeneratorConfig::default(),
        };

        if let Some(coordinates) = &self.coordinates {
            config.coordinates = coordinates.clone();
        }
        if let Some(zoom) = self.zoom {
            config.zoom = zoom;
        }
        if let Some(size) = self.size {
            config.size = size;
        }
        if let Some(cx) = self.cx {
            config.chunk.cx = cx;
        }
        if let Some(cy) = self.cy {
            config.chunk.cy = cy;
        }
        if self.elevation {
            config.height_mode = HeightMode::Elevation;
        }
        if let Some(key) = &self.api_key {
            config.source.api_key = Some(key.clone());
        }

        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = args.resolve_config()?;

    let session = ChunkSession::from_config(&config)?;
    let offset = ChunkOffset::new(config.chunk.cx, config.chunk.cy);
    let tile = session.tile_for_chunk(offset)?;

    println!("Generating chunk ({}, {}) at zoom {}", offset.cx, offset.cy, config.zoom);
    println!("Anchor tile: {}", session.anchor());
    println!("Chunk tile:  {}", tile);
    println!("Grid: {}x{} cells, height mode: {}", config.size, config.size, config.height_mode);

    let source: Box<dyn RasterSource> = match &args.raster {
        Some(path) => Box::new(FileRasterSource::new(path)),
        None => Box::new(HttpTileSource::new(config.source.clone())?),
    };

    let start = std::time::Instant::now();
    let mut chunk = session.generate(offset, source.as_ref())?;
    println!("Built mesh in {:?}", start.elapsed());

    if !args.no_normals {
        chunk.mesh.recalculate_normals();
    }

    let mesh = &chunk.mesh;
    println!("Vertices: {}, triangles: {}", mesh.vertex_count(), mesh.triangle_count());
    if let Some((lo, hi)) = mesh.bounds() {
        println!("Bounds: ({:.1}, {:.1}, {:.1}) to ({:.1}, {:.1}, {:.1})", lo[0], lo[1], lo[2], hi[0], hi[1], hi[2]);
    }

    let mut min_h = f32::MAX;
    let mut max_h = f32::MIN;
    for &h in &mesh.elevations {
        if h < min_h { min_h = h; }
        if h > max_h { max_h = h; }
    }
    println!("Decoded elevation range: {:.1}m to {:.1}m", min_h, max_h);

    export::export_obj(mesh, &args.output)?;
    println!("Wrote {}", args.output);

    if let Some(path) = &args.elevation_png {
        export::export_elevation_png(mesh, config.size, path)?;
        println!("Wrote {}", path);
    }

    Ok(())
}
