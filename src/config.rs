//! Generator configuration.
//!
//! Loaded from a JSON file and overridden from the command line. Values are
//! validated once, up front, so the core can treat them as preconditions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fetch::TileSourceConfig;
use crate::mesh::{ChunkOffset, HeightMode, MAX_SIZE, MIN_SIZE};
use crate::tiles::{MAX_LATITUDE, MAX_ZOOM};

/// Everything needed to generate one chunk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Anchor location as "latitude, longitude"
    pub coordinates: String,
    pub zoom: u8,
    /// Quad cells per mesh edge
    pub size: usize,
    pub chunk: ChunkOffset,
    pub height_mode: HeightMode,
    pub source: TileSourceConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            coordinates: "37.7749, -122.4194".to_string(),
            zoom: 10,
            size: 512,
            chunk: ChunkOffset::default(),
            height_mode: HeightMode::default(),
            source: TileSourceConfig::default(),
        }
    }
}

/// Geographic anchor in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Errors loading or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Coordinates(String),
    Zoom(u8),
    Size(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Invalid config: {}", e),
            ConfigError::Coordinates(s) => write!(f, "Invalid coordinates {:?}, expected \"lat, lon\"", s),
            ConfigError::Zoom(z) => write!(f, "Zoom {} outside [0, {}]", z, MAX_ZOOM),
            ConfigError::Size(s) => write!(f, "Size {} outside [{}, {}]", s, MIN_SIZE, MAX_SIZE),
        }
    }
}

impl std::error::Error for ConfigError {}

impl GeneratorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Parse)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Check ranges and parse the anchor coordinates
    pub fn validate(&self) -> Result<GeoPoint, ConfigError> {
        if self.zoom > MAX_ZOOM {
            return Err(ConfigError::Zoom(self.zoom));
        }
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.size) {
            return Err(ConfigError::Size(self.size));
        }
        parse_coordinates(&self.coordinates)
    }
}

/// Parse "latitude, longitude"
pub fn parse_coordinates(text: &str) -> Result<GeoPoint, ConfigError> {
    let invalid = || ConfigError::Coordinates(text.to_string());

    let mut parts = text.split(',').map(str::trim);
    let latitude: f64 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(invalid)?;
    let longitude: f64 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(invalid)?;
    if parts.next().is_some() {
        return Err(invalid());
    }

    if !latitude.is_finite() || latitude.abs() >= MAX_LATITUDE {
        return Err(invalid());
    }
    if !longitude.is_finite() || !(-180.0..180.0).contains(&longitude) {
        return Err(invalid());
    }

    Ok(GeoPoint { latitude, longitude })
}
