//! Wind-driven wave spectrum generation (Phillips model).
//!
//! Runs once at startup: every frequency-grid cell gets a complex Gaussian
//! draw weighted by the directional Phillips spectrum. The buffer is
//! immutable afterwards; changing wind parameters means regenerating it.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustfft::num_complex::Complex32;

use crate::dispatch;
use crate::error::ConfigError;
use crate::params::{GridParams, SpectrumParams, GRAVITY_MPS2};

/// Directional alignment power: waves moving with the wind dominate
const ALIGNMENT_POWER: i32 = 2;

/// Immutable frequency-domain amplitude buffer (h0 in Tessendorf terms).
///
/// The entry at the aliased index `(N-x, N-z)` is the conjugate-symmetric
/// partner the modulation kernel pairs with to keep the spatial field real.
pub struct SpectrumBuffer {
    size: usize,
    samples: Vec<Complex32>,
}

impl SpectrumBuffer {
    /// Generate the spectrum for the given grid and wind parameters.
    ///
    /// Parallel over rows; each row draws from its own seeded ChaCha8
    /// stream so the result is deterministic under any thread schedule.
    pub fn generate(grid: &GridParams, params: &SpectrumParams) -> Result<Self, ConfigError> {
        grid.validate()?;
        params.validate()?;

        let n = grid.size;
        let wind_dir = params.wind_dir.normalize();
        // Largest energetic wavelength scale, L = V^2 / g
        let wind_scale = params.wind_speed_mps * params.wind_speed_mps / GRAVITY_MPS2;

        let mut samples = vec![Complex32::new(0.0, 0.0); grid.cell_count()];
        dispatch::fill_grid(&mut samples, n, |x, z| {
            // Row-seeded stream, advanced to this cell's draw pair. ChaCha
            // allows cheap in-stream seeking via the word position.
            let mut rng = ChaCha8Rng::seed_from_u64(
                params
                    .seed
                    .wrapping_add((z as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            );
            rng.set_word_pos(x as u128 * 4);

            let k = grid.wavevector(x, z);
            let weight = phillips_weight(k, wind_dir, wind_scale, params);
            if weight <= 0.0 {
                return Complex32::new(0.0, 0.0);
            }

            let (xi_re, xi_im) = gaussian_pair(&mut rng);
            let magnitude = (weight * 0.5).sqrt() * params.amplitude;
            Complex32::new(xi_re * magnitude, xi_im * magnitude)
        });

        Ok(Self { size: n, samples })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn samples(&self) -> &[Complex32] {
        &self.samples
    }

    #[inline]
    pub fn at(&self, x: usize, z: usize) -> Complex32 {
        self.samples[z * self.size + x]
    }
}

/// Directional Phillips spectrum weight for wavevector `k`.
///
/// Combines the 1/k^4 falloff, the exp(-1/(kL)^2) cutoff that kills waves
/// longer than the wind can raise (and the k=0 blow-up with them), a
/// Gaussian suppression of wavelengths below the configured cutoff, and
/// the squared alignment with the wind direction.
fn phillips_weight(
    k: glam::Vec2,
    wind_dir: glam::Vec2,
    wind_scale: f32,
    params: &SpectrumParams,
) -> f32 {
    let k_len_sq = k.length_squared();
    if k_len_sq < 1e-12 {
        // No DC wave: a uniform vertical offset is not a wave
        return 0.0;
    }

    let alignment = (k.normalize().dot(wind_dir)).powi(ALIGNMENT_POWER);
    let long_wave_cutoff = (-1.0 / (k_len_sq * wind_scale * wind_scale)).exp();
    let l = params.suppression_length_m;
    let short_wave_cutoff = (-k_len_sq * l * l).exp();

    long_wave_cutoff / (k_len_sq * k_len_sq) * alignment * short_wave_cutoff
}

/// Two independent standard normal draws via Box-Muller
fn gaussian_pair(rng: &mut impl Rng) -> (f32, f32) {
    // gen() is in [0, 1); flip to (0, 1] so the log is finite
    let u1: f32 = 1.0 - rng.gen::<f32>();
    let u2: f32 = rng.gen();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = std::f32::consts::TAU * u2;
    (r * theta.cos(), r * theta.sin())
}
