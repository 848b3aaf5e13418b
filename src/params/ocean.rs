//! Ocean grid, spectrum, and transform precision parameters.

use glam::Vec2;

use crate::error::ConfigError;

/// Gravitational acceleration (m/s^2), used by the deep-water dispersion relation
pub const GRAVITY_MPS2: f32 = 9.81;

/// Frequency/spatial grid configuration.
///
/// Fixed at initialization; changing either field requires regenerating the
/// spectrum and every derived buffer.
#[derive(Debug, Clone, Copy)]
pub struct GridParams {
    /// Samples per side (N). Must be a power of two >= 16 for the radix-2
    /// FFT paths; 256 is the usual quality/cost sweet spot.
    pub size: usize,

    /// Physical length of the periodic ocean tile (meters)
    pub domain_size_m: f32,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            size: 256,
            domain_size_m: 200.0,
        }
    }
}

impl GridParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size < 16 || !self.size.is_power_of_two() {
            return Err(ConfigError::InvalidGridSize(self.size));
        }
        if !(self.domain_size_m > 0.0) {
            return Err(ConfigError::InvalidDomainSize(self.domain_size_m));
        }
        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        self.size * self.size
    }

    /// Smallest resolvable wavevector step (rad/m), `2*pi / L`
    pub fn k_min(&self) -> f32 {
        std::f32::consts::TAU / self.domain_size_m
    }

    /// Wavevector for a grid index pair.
    ///
    /// Indices beyond N/2 alias to negative frequencies (standard DFT bin
    /// order), so index N-1 maps to -k_min, matching the layout rustfft
    /// expects without any shifting.
    pub fn wavevector(&self, x: usize, z: usize) -> Vec2 {
        let n = self.size;
        let fold = |i: usize| -> f32 {
            if i <= n / 2 {
                i as f32
            } else {
                i as f32 - n as f32
            }
        };
        Vec2::new(fold(x), fold(z)) * self.k_min()
    }

    /// Conjugate-symmetric partner of a grid index: `(N - i) mod N` per axis
    pub fn partner(&self, x: usize, z: usize) -> (usize, usize) {
        let n = self.size;
        ((n - x) % n, (n - z) % n)
    }
}

/// Wind-driven Phillips spectrum parameters
#[derive(Debug, Clone)]
pub struct SpectrumParams {
    /// Wind direction (XZ plane, need not be normalized)
    pub wind_dir: Vec2,

    /// Wind speed (m/s). Sets the largest energetic wavelength via L = V^2/g.
    pub wind_speed_mps: f32,

    /// Overall spectrum amplitude scale (dimensionless)
    pub amplitude: f32,

    /// Waves shorter than this are suppressed (meters). Kills sub-texel
    /// chop that would only alias.
    pub suppression_length_m: f32,

    /// Horizontal displacement (choppiness) scale applied to the
    /// displacement channel. 0 = plain heightfield, ~1.2 = sharp crests.
    pub choppiness: f32,

    /// RNG seed for the Gaussian amplitude draws (reproducible spectra)
    pub seed: u64,

    /// Quantize dispersion frequencies to multiples of the base frequency
    /// so the whole field repeats exactly every wrap period. Disabling this
    /// gives true dispersion but loses phase precision at large times.
    pub quantize_dispersion: bool,
}

impl Default for SpectrumParams {
    fn default() -> Self {
        Self {
            wind_dir: Vec2::new(1.0, 0.3),
            wind_speed_mps: 12.0,
            amplitude: 1.0,
            suppression_length_m: 0.1,
            choppiness: 1.0,
            seed: 42,
            quantize_dispersion: true,
        }
    }
}

impl SpectrumParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wind_dir.length_squared() < 1e-12 {
            return Err(ConfigError::ZeroWindDirection);
        }
        if self.amplitude != 0.0 && !(self.wind_speed_mps > 0.0) {
            return Err(ConfigError::ZeroWindSpeed {
                speed: self.wind_speed_mps,
                amplitude: self.amplitude,
            });
        }
        Ok(())
    }
}

/// Storage precision for spatial maps.
///
/// `Half` routes every texel store through an f16 round trip, modeling the
/// bandwidth-optimized half-float textures the maps would occupy on GPU.
/// The reduced dynamic range is a documented trade, not hidden behavior:
/// heights above ~65k meters or below f16 denormals lose detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Full,
    Half,
}
