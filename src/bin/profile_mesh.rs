//! Profiling tool comparing serial and parallel mesh builds

use std::time::Instant;

use terrain_tiles::mesh::{ChunkOffset, GridMeshBuilder, HeightMode, MeshParams};
use terrain_tiles::raster::{ElevationRaster, Sample};

fn main() {
    env_logger::init();

    let zoom = 12;
    let runs = 5;

    // Synthetic ridge so decoded heights vary across the tile
    let raster = ElevationRaster::from_fn(|column, row| {
        let h = ((column as f32 * 0.05).sin() + (row as f32 * 0.03).cos()) * 400.0 + 800.0;
        Sample::from_height(h)
    });

    println!("=== Mesh Build Profiling ===");
    println!("Worker threads: {}", rayon::current_num_threads());
    println!();

    let parallel = GridMeshBuilder::new();
    let serial = GridMeshBuilder::serial();

    for size in [16usize, 64, 128, 256, 512] {
        for mode in [HeightMode::BaseNoise, HeightMode::Elevation] {
            let params = MeshParams::new(size, zoom, ChunkOffset::default()).with_height_mode(mode);

            let start = Instant::now();
            let mut serial_mesh = serial.build(&raster, &params);
            for _ in 1..runs {
                serial_mesh = serial.build(&raster, &params);
            }
            let serial_time = start.elapsed() / runs;

            let start = Instant::now();
            let mut parallel_mesh = parallel.build(&raster, &params);
            for _ in 1..runs {
                parallel_mesh = parallel.build(&raster, &params);
            }
            let parallel_time = start.elapsed() / runs;

            assert_eq!(serial_mesh, parallel_mesh, "serial and parallel builds differ at size {}", size);

            println!(
                "size {:>3} {:<10}  serial {:>10.2?}  parallel {:>10.2?}  speedup {:>5.2}x",
                size,
                mode.to_string(),
                serial_time,
                parallel_time,
                serial_time.as_secs_f64() / parallel_time.as_secs_f64().max(1e-9)
            );
        }
    }
}
