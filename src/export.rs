//! Export of generated chunks for inspection in external tools.
//!
//! - Wavefront OBJ of the mesh (positions, normals when computed, faces)
//! - Grayscale PNG of the decoded elevations

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{GrayImage, ImageBuffer, Luma};

use crate::mesh::GridMesh;

/// Write the mesh as a Wavefront OBJ file
pub fn export_obj(mesh: &GridMesh, path: impl AsRef<Path>) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_obj(mesh, &mut writer)?;
    writer.flush()
}

pub fn write_obj<W: Write>(mesh: &GridMesh, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "# terrain chunk: {} vertices, {} triangles", mesh.vertex_count(), mesh.triangle_count())?;

    for [x, y, z] in &mesh.vertices {
        writeln!(writer, "v {} {} {}", x, y, z)?;
    }

    let has_normals = mesh.normals.len() == mesh.vertices.len() && !mesh.normals.is_empty();
    if has_normals {
        for [x, y, z] in &mesh.normals {
            writeln!(writer, "vn {} {} {}", x, y, z)?;
        }
    }

    // OBJ indices are 1-based
    for [a, b, c] in mesh.triangles() {
        let (a, b, c) = (a + 1, b + 1, c + 1);
        if has_normals {
            writeln!(writer, "f {}//{} {}//{} {}//{}", a, a, b, b, c, c)?;
        } else {
            writeln!(writer, "f {} {} {}", a, b, c)?;
        }
    }

    Ok(())
}

/// Decoded elevations as a grayscale image, normalized to the mesh's range.
/// `size` is the grid resolution the mesh was built with.
pub fn elevation_image(mesh: &GridMesh, size: usize) -> GrayImage {
    let edge = size as u32 + 1;
    let mut img: GrayImage = ImageBuffer::new(edge, edge);

    let mut min_h = f32::MAX;
    let mut max_h = f32::MIN;
    for &h in &mesh.elevations {
        min_h = min_h.min(h);
        max_h = max_h.max(h);
    }
    let range = (max_h - min_h).max(f32::EPSILON);

    for (slot, &h) in mesh.elevations.iter().enumerate() {
        let x = slot as u32 % edge;
        let y = slot as u32 / edge;
        let value = ((h - min_h) / range * 255.0).round() as u8;
        img.put_pixel(x, y, Luma([value]));
    }

    img
}

pub fn export_elevation_png(mesh: &GridMesh, size: usize, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
    elevation_image(mesh, size).save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{ChunkOffset, GridMeshBuilder, HeightMode, MeshParams};
    use crate::raster::{ElevationRaster, Sample};

    fn sample_mesh() -> GridMesh {
        let raster = ElevationRaster::from_fn(|column, _| Sample::from_height(column as f32));
        let params = MeshParams::new(16, 10, ChunkOffset::default()).with_height_mode(HeightMode::Elevation);
        GridMeshBuilder::new().build(&raster, &params)
    }

    #[test]
    fn test_obj_line_counts() {
        let mesh = sample_mesh();
        let mut out = Vec::new();
        write_obj(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 17 * 17);
        assert_eq!(text.lines().filter(|l| l.starts_with("vn ")).count(), 0);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 16 * 16 * 2);
        assert!(text.contains("\nf 1 18 19\n"));
    }

    #[test]
    fn test_obj_with_normals() {
        let mut mesh = sample_mesh();
        mesh.recalculate_normals();
        let mut out = Vec::new();
        write_obj(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().filter(|l| l.starts_with("vn ")).count(), 17 * 17);
        assert!(text.contains("\nf 1//1 18//18 19//19\n"));
    }

    #[test]
    fn test_elevation_image_spans_range() {
        let mesh = sample_mesh();
        let img = elevation_image(&mesh, 16);
        assert_eq!(img.dimensions(), (17, 17));

        // Height follows the raster column, which follows mesh y
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(0, 16).0[0], 255);
        assert_eq!(img.get_pixel(5, 16).0[0], 255);
    }
}
