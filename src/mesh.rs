//! Grid mesh synthesis for one terrain chunk.
//!
//! A `size × size` quad grid is laid over the raster. Every vertex slot and
//! every group of six triangle indices is written by exactly one work item,
//! so the build is a plain parallel-for over disjoint slices with the raster
//! shared read-only.

use noise::{NoiseFn, Perlin};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::raster::{ElevationRaster, RASTER_EDGE};
use crate::tiles::meters_per_pixel;

/// Accepted grid resolutions
pub const MIN_SIZE: usize = 16;
pub const MAX_SIZE: usize = RASTER_EDGE;

/// Logical tile edge in pixels that world scale is measured against
pub const TILE_EDGE_PIXELS: f32 = 256.0;

// Vertical placement when the noise path drives height
pub const BASE_HEIGHT: f32 = 200.0;
pub const NOISE_FREQUENCY: f64 = 0.1;
const NOISE_SEED: u32 = 0;

/// Which signal drives the vertex Y coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightMode {
    /// Fixed base height plus coherent noise. Decoded elevations are still
    /// computed and kept in `GridMesh::elevations`.
    #[default]
    BaseNoise,
    /// Decoded raster elevation in meters
    Elevation,
}

impl std::fmt::Display for HeightMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BaseNoise => write!(f, "base_noise"),
            Self::Elevation => write!(f, "elevation"),
        }
    }
}

/// Chunk position relative to the anchor tile, in chunk units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkOffset {
    pub cx: i32,
    pub cy: i32,
}

impl ChunkOffset {
    pub fn new(cx: i32, cy: i32) -> Self {
        Self { cx, cy }
    }
}

/// Immutable parameters for one mesh build
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshParams {
    /// Quad cells per edge
    pub size: usize,
    /// Raster pixels per mesh cell
    pub scale: f32,
    pub meters_per_pixel: f32,
    /// World extent of one chunk in meters
    pub chunk_size: f32,
    pub offset: ChunkOffset,
    pub height_mode: HeightMode,
}

impl MeshParams {
    /// Parameters for a grid resolution at a zoom level
    pub fn new(size: usize, zoom: u8, offset: ChunkOffset) -> Self {
        debug_assert!((MIN_SIZE..=MAX_SIZE).contains(&size), "size {} outside [{}, {}]", size, MIN_SIZE, MAX_SIZE);

        let meters_per_pixel = meters_per_pixel(zoom);
        Self {
            size,
            scale: TILE_EDGE_PIXELS / size as f32,
            meters_per_pixel,
            chunk_size: meters_per_pixel * TILE_EDGE_PIXELS,
            offset,
            height_mode: HeightMode::default(),
        }
    }

    pub fn with_height_mode(mut self, height_mode: HeightMode) -> Self {
        self.height_mode = height_mode;
        self
    }

    pub fn vertex_count(&self) -> usize {
        (self.size + 1) * (self.size + 1)
    }

    pub fn index_count(&self) -> usize {
        self.size * self.size * 6
    }
}

/// Vertex slot anchoring quad cell `i`; skips the extra vertex closing each row
pub fn cell_vertex(i: usize, size: usize) -> usize {
    i + i / size
}

/// Triangle-mesh buffers for one chunk
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridMesh {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    /// Decoded raster height per vertex slot
    pub elevations: Vec<f32>,
    /// Filled by `recalculate_normals`
    pub normals: Vec<[f32; 3]>,
}

impl GridMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Axis-aligned bounds as (min, max)
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(mut lo, mut hi), v| {
            for k in 0..3 {
                lo[k] = lo[k].min(v[k]);
                hi[k] = hi[k].max(v[k]);
            }
            (lo, hi)
        }))
    }

    /// Area-weighted vertex normals from the finished triangle list
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![[0.0f32; 3]; self.vertices.len()];

        for [a, b, c] in self.triangles() {
            let (a, b, c) = (a as usize, b as usize, c as usize);
            let p0 = self.vertices[a];
            let e1 = sub(self.vertices[b], p0);
            let e2 = sub(self.vertices[c], p0);
            let n = cross(e1, e2);
            for v in [a, b, c] {
                for k in 0..3 {
                    normals[v][k] += n[k];
                }
            }
        }

        for n in normals.iter_mut() {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if len > f32::EPSILON {
                for c in n.iter_mut() {
                    *c /= len;
                }
            }
        }

        self.normals = normals;
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Builds grid meshes from elevation rasters
pub struct GridMeshBuilder {
    noise: Perlin,
    parallel: bool,
}

impl Default for GridMeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GridMeshBuilder {
    pub fn new() -> Self {
        Self {
            noise: Perlin::new(NOISE_SEED),
            parallel: true,
        }
    }

    /// Builder that runs every work item on the calling thread
    pub fn serial() -> Self {
        Self { parallel: false, ..Self::new() }
    }

    /// Coherent noise in [0, 1]
    fn noise(&self, x: f64, y: f64) -> f32 {
        ((self.noise.get([x, y]) + 1.0) * 0.5).clamp(0.0, 1.0) as f32
    }

    /// Position and decoded height for vertex (x, y)
    fn vertex(&self, x: usize, y: usize, raster: &ElevationRaster, params: &MeshParams) -> ([f32; 3], f32) {
        let elevation = raster.cell_height(x, y, params.size);

        let height = match params.height_mode {
            HeightMode::BaseNoise => {
                BASE_HEIGHT + self.noise(x as f64 * NOISE_FREQUENCY, y as f64 * NOISE_FREQUENCY)
            }
            HeightMode::Elevation => elevation,
        };

        let step = params.scale * params.meters_per_pixel;
        let position = [
            x as f32 * step + params.offset.cx as f32 * params.chunk_size,
            height,
            y as f32 * step + params.offset.cy as f32 * params.chunk_size,
        ];
        (position, elevation)
    }

    /// Six indices for quad cell `i`: two triangles sharing the diagonal
    /// from the cell's far corner back to its anchor
    fn fill_cell(i: usize, size: usize, out: &mut [u32]) {
        let vert = cell_vertex(i, size) as u32;
        let row = size as u32 + 1;
        out.copy_from_slice(&[vert, vert + row, vert + row + 1, vert + row + 1, vert + 1, vert]);
    }

    /// Build the mesh for one chunk.
    ///
    /// `params.size` must not exceed `MAX_SIZE`; larger grids would sample
    /// past the raster border.
    pub fn build(&self, raster: &ElevationRaster, params: &MeshParams) -> GridMesh {
        let size = params.size;
        debug_assert!(size > 0 && size <= MAX_SIZE, "size {} outside [1, {}]", size, MAX_SIZE);

        let row = size + 1;
        let mut vertices = vec![[0.0f32; 3]; params.vertex_count()];
        let mut elevations = vec![0.0f32; params.vertex_count()];
        let mut indices = vec![0u32; params.index_count()];

        let write_vertex = |slot: usize, (position, elevation): (&mut [f32; 3], &mut f32)| {
            let (p, e) = self.vertex(slot % row, slot / row, raster, params);
            *position = p;
            *elevation = e;
        };

        if self.parallel {
            vertices
                .par_iter_mut()
                .zip(elevations.par_iter_mut())
                .enumerate()
                .for_each(|(slot, out)| write_vertex(slot, out));
            indices
                .par_chunks_mut(6)
                .enumerate()
                .for_each(|(i, out)| Self::fill_cell(i, size, out));
        } else {
            vertices
                .iter_mut()
                .zip(elevations.iter_mut())
                .enumerate()
                .for_each(|(slot, out)| write_vertex(slot, out));
            indices
                .chunks_mut(6)
                .enumerate()
                .for_each(|(i, out)| Self::fill_cell(i, size, out));
        }

        log::debug!(
            "Built {}x{} grid: {} vertices, {} indices (parallel: {})",
            size, size, vertices.len(), indices.len(), self.parallel
        );

        GridMesh {
            vertices,
            indices,
            elevations,
            normals: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Sample;
    use std::collections::HashMap;

    fn ramp_raster() -> ElevationRaster {
        ElevationRaster::from_fn(|column, row| Sample::from_height((column * 3 + row) as f32))
    }

    #[test]
    fn test_buffer_sizes() {
        let raster = ElevationRaster::filled(Sample::default());
        let builder = GridMeshBuilder::new();

        for size in [16usize, 32, 100, 256] {
            let params = MeshParams::new(size, 10, ChunkOffset::default());
            let mesh = builder.build(&raster, &params);
            assert_eq!(mesh.vertices.len(), (size + 1) * (size + 1));
            assert_eq!(mesh.elevations.len(), (size + 1) * (size + 1));
            assert_eq!(mesh.indices.len(), size * size * 6);
        }
    }

    #[test]
    fn test_indices_in_range() {
        let raster = ramp_raster();
        let params = MeshParams::new(16, 5, ChunkOffset::new(2, -3));
        let mesh = GridMeshBuilder::new().build(&raster, &params);

        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn test_cell_vertex_skips_row_end() {
        assert_eq!(cell_vertex(0, 4), 0);
        assert_eq!(cell_vertex(3, 4), 3);
        assert_eq!(cell_vertex(4, 4), 5);
        assert_eq!(cell_vertex(15, 4), 18);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let raster = ramp_raster();
        let params = MeshParams::new(64, 12, ChunkOffset::new(-1, 4)).with_height_mode(HeightMode::Elevation);

        let parallel = GridMeshBuilder::new().build(&raster, &params);
        let serial = GridMeshBuilder::serial().build(&raster, &params);
        let again = GridMeshBuilder::new().build(&raster, &params);

        assert_eq!(parallel, serial);
        assert_eq!(parallel, again);

        let noise_params = params.with_height_mode(HeightMode::BaseNoise);
        assert_eq!(
            GridMeshBuilder::new().build(&raster, &noise_params),
            GridMeshBuilder::serial().build(&raster, &noise_params)
        );
    }

    #[test]
    fn test_vertex_positions() {
        let raster = ElevationRaster::filled(Sample::from_height(120.0));
        let params = MeshParams::new(16, 3, ChunkOffset::new(1, 2));
        let mesh = GridMeshBuilder::new().build(&raster, &params);

        let step = params.scale * params.meters_per_pixel;
        for (slot, v) in mesh.vertices.iter().enumerate() {
            let (x, y) = (slot % 17, slot / 17);
            assert_eq!(v[0], x as f32 * step + params.chunk_size);
            assert_eq!(v[2], y as f32 * step + 2.0 * params.chunk_size);
            assert!(v[1] >= BASE_HEIGHT && v[1] <= BASE_HEIGHT + 1.0);
        }
    }

    #[test]
    fn test_noise_mode_keeps_decoded_elevations() {
        let raster = ramp_raster();
        let params = MeshParams::new(32, 8, ChunkOffset::default());
        let mesh = GridMeshBuilder::new().build(&raster, &params);

        // Y ignores the raster, elevations do not
        assert!(mesh.vertices.iter().all(|v| v[1] >= BASE_HEIGHT && v[1] <= BASE_HEIGHT + 1.0));
        assert_eq!(mesh.elevations[0], raster.cell_height(0, 0, 32));
        assert_eq!(mesh.elevations[33 * 2 + 5], raster.cell_height(5, 2, 32));

        let elevation = GridMeshBuilder::new().build(&raster, &params.with_height_mode(HeightMode::Elevation));
        for (v, e) in elevation.vertices.iter().zip(&mesh.elevations) {
            assert_eq!(v[1], *e);
        }
    }

    #[test]
    fn test_small_grid_is_watertight() {
        let size = 4;
        let raster = ElevationRaster::filled(Sample::from_height(50.0));
        let params = MeshParams {
            size,
            scale: TILE_EDGE_PIXELS / size as f32,
            meters_per_pixel: 1.0,
            chunk_size: TILE_EDGE_PIXELS,
            offset: ChunkOffset::default(),
            height_mode: HeightMode::Elevation,
        };

        let mesh = GridMeshBuilder::serial().build(&raster, &params);

        assert_eq!(mesh.vertices.len(), 25);
        assert_eq!(mesh.indices.len(), 96);
        assert_eq!(mesh.triangle_count(), 32);
        assert!(mesh.vertices.iter().all(|v| v[1] == mesh.vertices[0][1]));

        // Non-degenerate, same winding, total area equals the grid area
        let mut area = 0.0f32;
        for [a, b, c] in mesh.triangles() {
            let (p0, p1, p2) = (mesh.vertices[a as usize], mesh.vertices[b as usize], mesh.vertices[c as usize]);
            let n = cross(sub(p1, p0), sub(p2, p0));
            assert!(n[1] > 0.0, "triangle {:?} flipped or degenerate", [a, b, c]);
            area += n[1] * 0.5;
        }
        let extent = size as f32 * params.scale;
        assert!((area - extent * extent).abs() < 1e-2);

        // Interior edges shared by exactly two triangles, boundary edges by one
        let mut edges: HashMap<(u32, u32), usize> = HashMap::new();
        for t in mesh.triangles() {
            for k in 0..3 {
                let (a, b) = (t[k], t[(k + 1) % 3]);
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        let boundary = edges.values().filter(|&&n| n == 1).count();
        assert_eq!(boundary, 4 * size);
        assert!(edges.values().all(|&n| n == 1 || n == 2));
    }

    #[test]
    fn test_recalculated_normals_point_up_on_flat_grid() {
        let raster = ElevationRaster::filled(Sample::from_height(0.0));
        let params = MeshParams::new(16, 10, ChunkOffset::default()).with_height_mode(HeightMode::Elevation);
        let mut mesh = GridMeshBuilder::new().build(&raster, &params);
        mesh.recalculate_normals();

        assert_eq!(mesh.normals.len(), mesh.vertices.len());
        for n in &mesh.normals {
            assert!((n[1].abs() - 1.0).abs() < 1e-5);
            assert!(n[0].abs() < 1e-5 && n[2].abs() < 1e-5);
        }
    }

    #[test]
    fn test_byte_views() {
        let raster = ElevationRaster::filled(Sample::default());
        let mesh = GridMeshBuilder::new().build(&raster, &MeshParams::new(16, 0, ChunkOffset::default()));
        assert_eq!(mesh.vertex_bytes().len(), 17 * 17 * 12);
        assert_eq!(mesh.index_bytes().len(), 16 * 16 * 6 * 4);
    }

    #[test]
    fn test_bounds_cover_chunk() {
        let raster = ElevationRaster::filled(Sample::default());
        let params = MeshParams::new(16, 4, ChunkOffset::new(-1, 1));
        let mesh = GridMeshBuilder::new().build(&raster, &params);

        let (lo, hi) = mesh.bounds().unwrap();
        assert!((lo[0] + params.chunk_size).abs() < 1e-1);
        assert!(hi[0].abs() < 1e-1);
        assert!((lo[2] - params.chunk_size).abs() < 1e-1);
        assert!((hi[2] - 2.0 * params.chunk_size).abs() < 1e-1);
    }
}
