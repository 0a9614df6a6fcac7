//! Chunk generation sessions.
//!
//! A session pins the zoom level, grid resolution and anchor tile, then turns
//! chunk offsets into meshes: resolve the tile, acquire its raster, build.

use crate::config::{ConfigError, GeneratorConfig};
use crate::fetch::{FetchError, RasterSource};
use crate::mesh::{ChunkOffset, GridMesh, GridMeshBuilder, HeightMode, MeshParams};
use crate::tiles::{tiles_per_axis, TileAddress};

/// Errors while generating a chunk
#[derive(Debug)]
pub enum ChunkError {
    Config(ConfigError),
    /// Offset addresses a tile outside the zoom level
    OutOfRange { anchor: TileAddress, offset: ChunkOffset },
    Fetch(FetchError),
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkError::Config(e) => write!(f, "{}", e),
            ChunkError::OutOfRange { anchor, offset } => write!(
                f,
                "Chunk ({}, {}) from tile {} leaves the {}x{} tile grid",
                offset.cx, offset.cy, anchor, tiles_per_axis(anchor.zoom), tiles_per_axis(anchor.zoom)
            ),
            ChunkError::Fetch(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ChunkError {}

impl From<ConfigError> for ChunkError {
    fn from(e: ConfigError) -> Self {
        ChunkError::Config(e)
    }
}

impl From<FetchError> for ChunkError {
    fn from(e: FetchError) -> Self {
        ChunkError::Fetch(e)
    }
}

/// Generated chunk handed to the renderer
#[derive(Clone, Debug)]
pub struct ChunkMesh {
    pub tile: TileAddress,
    pub offset: ChunkOffset,
    pub mesh: GridMesh,
}

/// Fixed settings shared by every chunk of one generation run
pub struct ChunkSession {
    anchor: TileAddress,
    size: usize,
    height_mode: HeightMode,
    builder: GridMeshBuilder,
}

impl ChunkSession {
    /// Session anchored at the tile containing (longitude, latitude)
    pub fn new(longitude: f64, latitude: f64, zoom: u8, size: usize) -> Self {
        let anchor = TileAddress::from_lon_lat(longitude, latitude, zoom);
        log::info!("Anchor tile {} for ({:.5}, {:.5})", anchor, latitude, longitude);

        Self {
            anchor,
            size,
            height_mode: HeightMode::default(),
            builder: GridMeshBuilder::new(),
        }
    }

    /// Session from a validated configuration
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ChunkError> {
        let point = config.validate()?;
        Ok(Self::new(point.longitude, point.latitude, config.zoom, config.size)
            .with_height_mode(config.height_mode))
    }

    pub fn with_height_mode(mut self, height_mode: HeightMode) -> Self {
        self.height_mode = height_mode;
        self
    }

    pub fn with_builder(mut self, builder: GridMeshBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn anchor(&self) -> TileAddress {
        self.anchor
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tile addressed by a chunk offset.
    ///
    /// Chunk columns step tile rows and chunk rows step tile columns:
    /// `x = anchor.x + cy`, `y = anchor.y - cx`.
    pub fn tile_for_chunk(&self, offset: ChunkOffset) -> Result<TileAddress, ChunkError> {
        self.anchor
            .offset(offset.cy as i64, -(offset.cx as i64))
            .ok_or(ChunkError::OutOfRange { anchor: self.anchor, offset })
    }

    pub fn mesh_params(&self, offset: ChunkOffset) -> MeshParams {
        MeshParams::new(self.size, self.anchor.zoom, offset).with_height_mode(self.height_mode)
    }

    /// Resolve, acquire and build one chunk
    pub fn generate(&self, offset: ChunkOffset, source: &dyn RasterSource) -> Result<ChunkMesh, ChunkError> {
        let tile = self.tile_for_chunk(offset)?;
        let raster = source.fetch(&tile)?;

        let params = self.mesh_params(offset);
        let mesh = self.builder.build(&raster, &params);
        log::info!(
            "Chunk ({}, {}) from tile {}: {} vertices, {} triangles",
            offset.cx, offset.cy, tile, mesh.vertex_count(), mesh.triangle_count()
        );

        Ok(ChunkMesh { tile, offset, mesh })
    }
}
