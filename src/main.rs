//! Swell baker - headless ocean synthesis and LOD inspection tool.
//!
//! Runs the full pipeline (spectrum -> modulation -> inverse FFT ->
//! derived maps), flies a straight camera path over the patch grid
//! printing per-frame LOD statistics, and exports the final frame's
//! height, normal, and Jacobian maps as PNGs.

mod cli;

use std::path::Path;

use clap::Parser;
use glam::Vec3;

use swell::maps::MapSet;
use swell::params::{LodStrategyKind, TerrainLodParams, ViewParams};
use swell::pipeline::OceanPipeline;
use swell::terrain::geomorph::GeomorphLod;
use swell::terrain::tessellation::{fractional_even_segments, TessellationLod};
use swell::terrain::{Frustum, LodStrategy, TerrainPatchManager};

use cli::Args;

fn main() {
    env_logger::init();
    let args = Args::parse();

    println!("Swell - FFT ocean synthesis baker");
    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut pipeline = OceanPipeline::new(
        args.grid_params(),
        args.spectrum_params(),
        args.precision(),
    )?;
    println!(
        "Grid {0}x{0}, tile {1} m, wrap period {2:.1} s",
        args.size,
        args.domain,
        pipeline.wrap_period()
    );

    let manager = TerrainPatchManager::new(TerrainLodParams::default())?;
    let mut strategy: Box<dyn LodStrategy> = match args.parse_strategy() {
        LodStrategyKind::Tessellation => Box::new(TessellationLod::new(&manager)),
        LodStrategyKind::Geomorph => Box::new(GeomorphLod::new(&manager)),
    };
    println!("LOD strategy: {}", strategy.name());

    let view = ViewParams::default();
    let dt = 1.0 / 60.0;
    for frame in 0..args.frames {
        let t = args.time + frame as f32 * dt;
        pipeline.advance(t);

        // Straight flight over the surface, looking ahead and down
        let eye = Vec3::new(0.0, args.elevation, t * args.camera_speed);
        let target = eye + Vec3::new(0.0, -args.elevation * 0.4, 120.0);
        let frustum = Frustum::from_view_proj(&view.view_proj(eye, target));

        let patch_frame = manager.update(eye, &frustum);
        let draw = strategy.build(&patch_frame);

        let visible = patch_frame.patches.iter().filter(|p| p.visible).count();
        print!(
            "frame {frame:3}: t={t:7.2}s  {visible:3}/{} patches visible, {} instances",
            patch_frame.patches.len(),
            draw.instance_count()
        );
        for batch in &draw.batches {
            match batch.mesh_level {
                Some(level) => print!("  L{level}:{}", batch.instances.len()),
                None => {
                    let max_inner = batch
                        .instances
                        .iter()
                        .map(|i| i.inner)
                        .fold(0.0f32, f32::max);
                    print!(
                        "  tess:{} (max {} segments)",
                        batch.instances.len(),
                        fractional_even_segments(max_inner)
                    );
                }
            }
        }
        println!();
    }

    std::fs::create_dir_all(&args.out)?;
    export_maps(pipeline.maps(), Path::new(&args.out))?;
    println!("Maps written to {}/", args.out);
    Ok(())
}

/// Export height (grayscale, auto-ranged), normal (rgb), and Jacobian
/// (grayscale, 0..2 mapped) maps as PNGs.
fn export_maps(maps: &MapSet, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let n = maps.height.size() as u32;

    let (mut lo, mut hi) = (f32::MAX, f32::MIN);
    for &h in maps.height.data() {
        lo = lo.min(h);
        hi = hi.max(h);
    }
    let range = (hi - lo).max(1e-6);
    let height_img = image::GrayImage::from_fn(n, n, |x, z| {
        let h = maps.height.at(x as usize, z as usize);
        image::Luma([(((h - lo) / range) * 255.0) as u8])
    });
    height_img.save(dir.join("height.png"))?;

    let normal_img = image::RgbImage::from_fn(n, n, |x, z| {
        let v = maps.normal[(z * n + x) as usize];
        let to_byte = |c: f32| ((c * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0) as u8;
        image::Rgb([to_byte(v.x), to_byte(v.y), to_byte(v.z)])
    });
    normal_img.save(dir.join("normal.png"))?;

    let jacobian_img = image::GrayImage::from_fn(n, n, |x, z| {
        let j = maps.jacobian.at(x as usize, z as usize);
        image::Luma([((j * 0.5).clamp(0.0, 1.0) * 255.0) as u8])
    });
    jacobian_img.save(dir.join("jacobian.png"))?;

    Ok(())
}
