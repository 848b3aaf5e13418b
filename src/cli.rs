//! Command-line argument parsing.

use clap::Parser;
use glam::Vec2;

use swell::params::{GridParams, LodStrategyKind, Precision, SpectrumParams};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "swell")]
#[command(about = "FFT ocean synthesis and adaptive terrain LOD baker", long_about = None)]
pub struct Args {
    /// Frequency grid resolution per side (power of two)
    #[arg(long, default_value = "256")]
    pub size: usize,

    /// Physical size of the periodic ocean tile (meters)
    #[arg(long, value_name = "METERS", default_value = "200")]
    pub domain: f32,

    /// Wind speed (m/s)
    #[arg(long, value_name = "MPS", default_value = "12")]
    pub wind_speed: f32,

    /// Wind direction (degrees, 0 = +x)
    #[arg(long, value_name = "DEGREES", default_value = "20")]
    pub wind_dir: f32,

    /// Wave amplitude scale
    #[arg(long, default_value = "1.0")]
    pub amplitude: f32,

    /// Horizontal displacement (choppiness) scale
    #[arg(long, default_value = "1.0")]
    pub choppiness: f32,

    /// Spectrum RNG seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Simulation time of the exported frame (seconds)
    #[arg(long, value_name = "SECONDS", default_value = "10")]
    pub time: f32,

    /// Animate this many frames at 60 Hz before exporting (LOD stats are
    /// printed per frame while the camera flies forward)
    #[arg(long, default_value = "1")]
    pub frames: u32,

    /// Output directory for the exported maps
    #[arg(long, value_name = "DIR", default_value = "out")]
    pub out: String,

    /// LOD strategy: tess (hardware subdivision) or geomorph (fixed
    /// meshes + vertex morphing)
    #[arg(long, value_name = "STRATEGY", default_value = "tess")]
    pub strategy: String,

    /// Store spatial maps at half precision (bandwidth-accurate mode)
    #[arg(long)]
    pub half_precision: bool,

    /// Camera height above the surface (meters)
    #[arg(long, value_name = "METERS", default_value = "40")]
    pub elevation: f32,

    /// Camera forward speed during the stats flight (m/s)
    #[arg(long, value_name = "MPS", default_value = "30")]
    pub camera_speed: f32,
}

impl Args {
    pub fn grid_params(&self) -> GridParams {
        GridParams {
            size: self.size,
            domain_size_m: self.domain,
        }
    }

    pub fn spectrum_params(&self) -> SpectrumParams {
        let rad = self.wind_dir.to_radians();
        SpectrumParams {
            wind_dir: Vec2::new(rad.cos(), rad.sin()),
            wind_speed_mps: self.wind_speed,
            amplitude: self.amplitude,
            suppression_length_m: 0.1,
            choppiness: self.choppiness,
            seed: self.seed,
            quantize_dispersion: true,
        }
    }

    pub fn precision(&self) -> Precision {
        if self.half_precision {
            Precision::Half
        } else {
            Precision::Full
        }
    }

    /// Parse the LOD strategy selection
    pub fn parse_strategy(&self) -> LodStrategyKind {
        match self.strategy.to_lowercase().as_str() {
            "tess" | "tessellation" => LodStrategyKind::Tessellation,
            "geomorph" | "morph" => LodStrategyKind::Geomorph,
            other => {
                eprintln!("Warning: unknown strategy '{}', using tessellation", other);
                LodStrategyKind::Tessellation
            }
        }
    }
}
