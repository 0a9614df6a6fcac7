//! Terrain tile mesh synthesis
//!
//! Maps geographic coordinates to slippy-map tiles, decodes terrain-RGB
//! elevation rasters and builds chunk grid meshes in parallel.

pub mod chunk;
pub mod config;
pub mod export;
pub mod fetch;
pub mod mesh;
pub mod raster;
pub mod tiles;
