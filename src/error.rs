//! Startup configuration errors.
//!
//! Everything here is fatal at initialization time. Per-frame stages are
//! infallible by construction: a grid that passed validation cannot fail
//! mid-pipeline, and LOD edge agreement is a contract checked with debug
//! assertions rather than a recoverable error.

use thiserror::Error;

/// Configuration errors detected during initialization
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Grid size must be a power of two so the radix-2 FFT paths apply
    #[error("grid size {0} is not a power of two >= 16")]
    InvalidGridSize(usize),

    #[error("domain size must be positive, got {0} m")]
    InvalidDomainSize(f32),

    #[error("wind speed must be positive when wave amplitude is nonzero (speed {speed} m/s, amplitude {amplitude})")]
    ZeroWindSpeed { speed: f32, amplitude: f32 },

    #[error("wind direction must be a nonzero vector")]
    ZeroWindDirection,

    #[error("patch edge vertex count {0} is not a power of two >= 4")]
    InvalidPatchVerts(u32),

    #[error("patch size must be positive, got {0} m")]
    InvalidPatchSize(f32),

    #[error("patch window of {0} patches per side is too small (minimum 2)")]
    InvalidWindow(usize),

    #[error("max LOD {max_lod} exceeds the {levels} mesh levels available for {patch_verts} vertices per edge")]
    LodOutOfRange {
        max_lod: f32,
        levels: u32,
        patch_verts: u32,
    },

    #[error("max tessellation level must be positive, got {0}")]
    InvalidTessLevel(f32),
}
