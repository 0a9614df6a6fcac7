//! Raster acquisition.
//!
//! Rasters are resolved before any mesh work starts; the builder only ever
//! sees a fully materialized `ElevationRaster`. Sources implement
//! `RasterSource` so sessions can run against HTTP tile servers, local
//! files, or in-memory rasters in tests.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::raster::{ElevationRaster, RasterError};
use crate::tiles::TileAddress;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "TERRAIN_TILES_API_KEY";

/// Tile server settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSourceConfig {
    /// URL with `{z}`, `{x}`, `{y}` and `{key}` placeholders
    pub url_template: String,
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TileSourceConfig {
    fn default() -> Self {
        Self {
            url_template: "https://api.tomtom.com/map/1/tile/hill/main/{z}/{x}/{y}.png?key={key}".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl TileSourceConfig {
    /// Configured key, falling back to the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    pub fn tile_url(&self, tile: &TileAddress, api_key: &str) -> String {
        self.url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
            .replace("{key}", api_key)
    }
}

/// Errors that can occur while acquiring a raster
#[derive(Debug)]
pub enum FetchError {
    NetworkError(String),
    HttpStatus { tile: TileAddress, status: u16 },
    Io(std::io::Error),
    Raster(RasterError),
    MissingTile(TileAddress),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::NetworkError(e) => write!(f, "Network error: {}", e),
            FetchError::HttpStatus { tile, status } => write!(f, "Tile {} returned status {}", tile, status),
            FetchError::Io(e) => write!(f, "I/O error: {}", e),
            FetchError::Raster(e) => write!(f, "Raster error: {}", e),
            FetchError::MissingTile(tile) => write!(f, "No raster for tile {}", tile),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<RasterError> for FetchError {
    fn from(e: RasterError) -> Self {
        FetchError::Raster(e)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Io(e)
    }
}

/// Anything that can hand over the raster for a tile
pub trait RasterSource {
    fn fetch(&self, tile: &TileAddress) -> Result<ElevationRaster, FetchError>;
}

/// Blocking HTTP client for a slippy tile server
pub struct HttpTileSource {
    config: TileSourceConfig,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HttpTileSource {
    pub fn new(config: TileSourceConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let api_key = config.resolved_api_key().unwrap_or_else(|| {
            log::warn!("No API key configured (set {}), requesting tiles without one", API_KEY_ENV);
            String::new()
        });

        Ok(Self { config, api_key, client })
    }

    fn fetch_bytes(&self, tile: &TileAddress) -> Result<Vec<u8>, FetchError> {
        let url = self.config.tile_url(tile, &self.api_key);
        log::info!("Fetching tile {}", tile);
        log::debug!("GET {}", self.config.tile_url(tile, "<key>"));

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus { tile: *tile, status: response.status().as_u16() });
        }

        let bytes = response
            .bytes()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl RasterSource for HttpTileSource {
    fn fetch(&self, tile: &TileAddress) -> Result<ElevationRaster, FetchError> {
        let bytes = self.fetch_bytes(tile)?;
        Ok(ElevationRaster::from_image_bytes(&bytes)?)
    }
}

/// One local image served for every tile
pub struct FileRasterSource {
    path: PathBuf,
}

impl FileRasterSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RasterSource for FileRasterSource {
    fn fetch(&self, tile: &TileAddress) -> Result<ElevationRaster, FetchError> {
        log::info!("Loading raster for tile {} from {}", tile, self.path.display());
        let bytes = std::fs::read(&self.path)?;
        Ok(ElevationRaster::from_image_bytes(&bytes)?)
    }
}

/// In-memory rasters keyed by tile
#[derive(Default)]
pub struct MemoryRasterSource {
    rasters: std::collections::HashMap<TileAddress, ElevationRaster>,
}

impl MemoryRasterSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tile: TileAddress, raster: ElevationRaster) {
        self.rasters.insert(tile, raster);
    }
}

impl RasterSource for MemoryRasterSource {
    fn fetch(&self, tile: &TileAddress) -> Result<ElevationRaster, FetchError> {
        self.rasters.get(tile).cloned().ok_or(FetchError::MissingTile(*tile))
    }
}
