//! Elevation rasters and the terrain-RGB sample decoder.
//!
//! A raster is 512×512 working pixels wrapped in a one pixel border, so
//! 514×514 samples of four bytes each. Three of the four channels pack a
//! 24-bit unsigned integer that decodes to meters.

use image::RgbaImage;

/// Usable raster edge in pixels
pub const RASTER_EDGE: usize = 512;

/// Border width around the usable area
pub const RASTER_BORDER: usize = 1;

/// Full raster edge including both borders
pub const RASTER_STRIDE: usize = RASTER_EDGE + 2 * RASTER_BORDER;

/// Bytes per sample
pub const CHANNELS: usize = 4;

// Terrain-RGB decoding
pub const ELEVATION_OFFSET: f32 = -10_000.0;
pub const ELEVATION_STEP: f32 = 0.1;

/// One raw raster sample. Channel `r` carries no elevation bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Sample {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Sample that decodes to the given height (nearest 0.1 m step)
    pub fn from_height(height: f32) -> Self {
        let packed = ((height - ELEVATION_OFFSET) / ELEVATION_STEP).round().clamp(0.0, 16_777_215.0) as u32;
        Self {
            r: 0,
            g: (packed >> 16) as u8,
            b: (packed >> 8) as u8,
            a: packed as u8,
        }
    }

    pub fn height(&self) -> f32 {
        decode(*self)
    }
}

/// Decode a sample to meters. Total over all byte values.
pub fn decode(sample: Sample) -> f32 {
    let packed = sample.g as u32 * 65_536 + sample.b as u32 * 256 + sample.a as u32;
    ELEVATION_OFFSET + packed as f32 * ELEVATION_STEP
}

/// Errors building a raster from external data
#[derive(Debug)]
pub enum RasterError {
    Image(image::ImageError),
    Dimensions { width: usize, height: usize },
    ByteLength { expected: usize, actual: usize },
}

impl std::fmt::Display for RasterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterError::Image(e) => write!(f, "Image decode error: {}", e),
            RasterError::Dimensions { width, height } => write!(
                f,
                "Raster is {}x{}, expected {}x{}",
                width, height, RASTER_STRIDE, RASTER_STRIDE
            ),
            RasterError::ByteLength { expected, actual } => {
                write!(f, "Raster has {} bytes, expected {}", actual, expected)
            }
        }
    }
}

impl std::error::Error for RasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RasterError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for RasterError {
    fn from(e: image::ImageError) -> Self {
        RasterError::Image(e)
    }
}

/// Immutable grid of raw samples, row-major, `RASTER_STRIDE` samples per row
#[derive(Clone, Debug)]
pub struct ElevationRaster {
    samples: Vec<Sample>,
}

impl ElevationRaster {
    /// Raster where every sample is the same
    pub fn filled(sample: Sample) -> Self {
        Self { samples: vec![sample; RASTER_STRIDE * RASTER_STRIDE] }
    }

    /// Raster built from a per-pixel function of (column, row)
    pub fn from_fn(mut f: impl FnMut(usize, usize) -> Sample) -> Self {
        let mut samples = Vec::with_capacity(RASTER_STRIDE * RASTER_STRIDE);
        for row in 0..RASTER_STRIDE {
            for column in 0..RASTER_STRIDE {
                samples.push(f(column, row));
            }
        }
        Self { samples }
    }

    /// Raster from raw bytes in sample channel order
    pub fn from_raw(bytes: &[u8]) -> Result<Self, RasterError> {
        let expected = RASTER_STRIDE * RASTER_STRIDE * CHANNELS;
        if bytes.len() != expected {
            return Err(RasterError::ByteLength { expected, actual: bytes.len() });
        }

        let samples = bytes
            .chunks_exact(CHANNELS)
            .map(|c| Sample::new(c[0], c[1], c[2], c[3]))
            .collect();
        Ok(Self { samples })
    }

    /// Raster from an encoded image (PNG as served by tile servers).
    ///
    /// Rows are stored bottom-up and each pixel as `[a, r, g, b]`, the raw
    /// texture layout the decoder's channel convention is defined against.
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, RasterError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Self::from_rgba_image(&image)
    }

    pub fn from_rgba_image(image: &RgbaImage) -> Result<Self, RasterError> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width != RASTER_STRIDE || height != RASTER_STRIDE {
            return Err(RasterError::Dimensions { width, height });
        }

        Ok(Self::from_fn(|column, row| {
            let [r, g, b, a] = image.get_pixel(column as u32, (RASTER_STRIDE - 1 - row) as u32).0;
            Sample::new(a, r, g, b)
        }))
    }

    /// Sample at (column, row)
    pub fn get(&self, column: usize, row: usize) -> Sample {
        debug_assert!(column < RASTER_STRIDE && row < RASTER_STRIDE, "raster access ({}, {}) out of bounds", column, row);
        self.samples[row * RASTER_STRIDE + column]
    }

    /// Decoded height at (column, row)
    pub fn height_at(&self, column: usize, row: usize) -> f32 {
        decode(self.get(column, row))
    }

    /// Pixel sampled for mesh vertex (x, y) at grid resolution `size`.
    ///
    /// Nearest-neighbour downsampling with an integer stride, shifted past
    /// the border.
    pub fn pixel_for_cell(x: usize, y: usize, size: usize) -> (usize, usize) {
        let stride = RASTER_EDGE / size;
        (y * stride + RASTER_BORDER, x * stride + RASTER_BORDER)
    }

    /// Decoded height for mesh vertex (x, y)
    pub fn cell_height(&self, x: usize, y: usize, size: usize) -> f32 {
        let (column, row) = Self::pixel_for_cell(x, y, size);
        self.height_at(column, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_decode_extremes() {
        assert_eq!(decode(Sample::new(0, 0, 0, 0)), -10_000.0);
        assert_eq!(decode(Sample::new(0, 255, 255, 255)), -10_000.0 + 16_777_215.0 * 0.1);
    }

    #[test]
    fn test_decode_ignores_first_channel() {
        for r in [0u8, 17, 128, 255] {
            assert_eq!(decode(Sample::new(r, 1, 134, 160)), decode(Sample::new(0, 1, 134, 160)));
        }
    }

    #[test]
    fn test_decode_sea_level() {
        // 100000 * 0.1 = 10000
        let packed = 100_000u32;
        let sample = Sample::new(0, (packed >> 16) as u8, (packed >> 8) as u8, packed as u8);
        assert!(decode(sample).abs() < 1e-3);
    }

    #[test]
    fn test_from_height_matches_decode() {
        for h in [-10_000.0f32, -432.1, 0.0, 200.0, 8848.8] {
            let decoded = Sample::from_height(h).height();
            assert!((decoded - h).abs() < 0.06, "{} decoded as {}", h, decoded);
        }
    }

    #[test]
    fn test_raw_length_checked() {
        assert!(matches!(
            ElevationRaster::from_raw(&[0u8; 16]),
            Err(RasterError::ByteLength { actual: 16, .. })
        ));
    }

    #[test]
    fn test_image_dimensions_checked() {
        let image = RgbaImage::new(256, 256);
        assert!(matches!(
            ElevationRaster::from_rgba_image(&image),
            Err(RasterError::Dimensions { width: 256, height: 256 })
        ));
    }

    #[test]
    fn test_image_layout_is_bottom_up_argb() {
        let mut image = RgbaImage::new(RASTER_STRIDE as u32, RASTER_STRIDE as u32);
        image.put_pixel(3, 0, Rgba([10, 20, 30, 40]));

        let raster = ElevationRaster::from_rgba_image(&image).unwrap();
        assert_eq!(raster.get(3, RASTER_STRIDE - 1), Sample::new(40, 10, 20, 30));
        assert_eq!(raster.get(3, 0), Sample::default());
    }

    #[test]
    fn test_cell_pixels_stay_inside_raster() {
        for size in [16usize, 100, 256, 512] {
            let (c, r) = ElevationRaster::pixel_for_cell(size, size, size);
            assert!(c < RASTER_STRIDE && r < RASTER_STRIDE);
            assert_eq!(ElevationRaster::pixel_for_cell(0, 0, size), (1, 1));
        }
        // Column follows y, row follows x
        assert_eq!(ElevationRaster::pixel_for_cell(1, 2, 256), (5, 3));
    }
}
