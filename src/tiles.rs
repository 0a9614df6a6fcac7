//! Slippy-map tile addressing.
//!
//! Converts geographic coordinates to integer tile indices under the
//! Web-Mercator tiling scheme and back. All functions are pure.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Highest zoom level the generator accepts
pub const MAX_ZOOM: u8 = 13;

/// Latitude limit of the Web-Mercator projection (degrees)
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Ground resolution of a 256 px tile at zoom 0, in meters per pixel
pub const METERS_PER_PIXEL_Z0: f32 = 156_543.0;

/// Address of one raster tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileAddress {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        debug_assert!(zoom <= MAX_ZOOM, "zoom {} above {}", zoom, MAX_ZOOM);
        debug_assert!(x < tiles_per_axis(zoom) && y < tiles_per_axis(zoom), "tile index out of range");
        Self { zoom, x, y }
    }

    /// Tile containing a geographic coordinate
    pub fn from_lon_lat(longitude: f64, latitude: f64, zoom: u8) -> Self {
        let (x, y) = lon_lat_to_tile(longitude, latitude, zoom);
        Self { zoom, x, y }
    }

    /// Tile displaced by signed steps, or None when it leaves the zoom level
    pub fn offset(&self, dx: i64, dy: i64) -> Option<Self> {
        let n = tiles_per_axis(self.zoom) as i64;
        let x = self.x as i64 + dx;
        let y = self.y as i64 + dy;
        if (0..n).contains(&x) && (0..n).contains(&y) {
            Some(Self { zoom: self.zoom, x: x as u32, y: y as u32 })
        } else {
            None
        }
    }

    /// North-west corner as (longitude, latitude)
    pub fn north_west(&self) -> (f64, f64) {
        tile_to_lon_lat(self.x, self.y, self.zoom)
    }

    pub fn meters_per_pixel(&self) -> f32 {
        meters_per_pixel(self.zoom)
    }
}

impl std::fmt::Display for TileAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one axis at a zoom level
pub fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Ground resolution at a zoom level
pub fn meters_per_pixel(zoom: u8) -> f32 {
    METERS_PER_PIXEL_Z0 / 2f32.powi(zoom as i32)
}

/// Tile indices containing (longitude, latitude).
///
/// Latitude must lie inside the Mercator range; outside it the result is
/// meaningless.
pub fn lon_lat_to_tile(longitude: f64, latitude: f64, zoom: u8) -> (u32, u32) {
    debug_assert!(zoom <= MAX_ZOOM, "zoom {} above {}", zoom, MAX_ZOOM);
    debug_assert!(latitude.abs() < MAX_LATITUDE, "latitude {} outside Mercator range", latitude);

    let n = tiles_per_axis(zoom) as f64;
    let x = ((longitude + 180.0) / 360.0 * n).floor();

    let lat_rad = latitude * PI / 180.0;
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    (x as u32, y as u32)
}

/// North-west corner of a tile as (longitude, latitude)
pub fn tile_to_lon_lat(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = tiles_per_axis(zoom) as f64;
    let longitude = x as f64 / n * 360.0 - 180.0;

    let m = PI - 2.0 * PI * y as f64 / n;
    let latitude = (180.0 / PI) * (0.5 * (m.exp() - (-m).exp())).atan();

    (longitude, latitude)
}
