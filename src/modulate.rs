//! Per-frame time modulation of the static spectrum.
//!
//! Rotates every spectrum sample by its dispersion phase and pairs it with
//! its conjugate partner so the synthesized spatial fields stay real. The
//! displacement and normal-gradient channels additionally apply the
//! frequency-domain derivative operator (multiplication by i*k), packing
//! their two real components into one complex buffer each so a single C2C
//! transform recovers both.

use std::sync::atomic::{AtomicBool, Ordering};

use rustfft::num_complex::Complex32;

use crate::dispatch;
use crate::params::{GridParams, SpectrumParams, GRAVITY_MPS2};
use crate::spectrum::SpectrumBuffer;

/// Guard against the k ~ 0 singularity in the displacement operator
const K_EPSILON: f32 = 1e-6;

/// Raw phase (radians) past which f32 `omega * t` has lost more than
/// ~0.01 rad to rounding; only reachable with quantization disabled.
const PHASE_PRECISION_LIMIT: f32 = 1.0e5;

/// Transient per-frame frequency-domain buffers, one per output channel
pub struct FrequencyBuffers {
    /// Height channel, Hermitian half grid (width N/2+1) for the C2R path
    pub height: Vec<Complex32>,
    /// Horizontal displacement, packed Dx + i*Dz over the full grid
    pub displacement: Vec<Complex32>,
    /// Surface gradient for fine normal detail, packed Gx + i*Gz
    pub gradient: Vec<Complex32>,
}

impl FrequencyBuffers {
    pub fn new(grid: &GridParams) -> Self {
        let n = grid.size;
        Self {
            height: vec![Complex32::new(0.0, 0.0); (n / 2 + 1) * n],
            displacement: vec![Complex32::new(0.0, 0.0); n * n],
            gradient: vec![Complex32::new(0.0, 0.0); n * n],
        }
    }
}

/// Time modulation kernel with precomputed (optionally quantized) dispersion
pub struct Modulator {
    grid: GridParams,
    /// Angular frequency per cell, row-major full grid
    omega: Vec<f32>,
    /// Exact repeat period of the modulated field (seconds), when quantized
    wrap_period_s: f32,
    quantized: bool,
    omega_max: f32,
    precision_warned: AtomicBool,
}

impl Modulator {
    pub fn new(grid: &GridParams, params: &SpectrumParams) -> Self {
        // Base frequency: dispersion at the minimum resolvable wavevector
        // step. Quantizing every omega to a multiple of it makes all
        // phases share the period 2*pi/omega_0, so wrapping t is exact.
        let omega_0 = (GRAVITY_MPS2 * grid.k_min()).sqrt();
        let quantized = params.quantize_dispersion;

        let omega = dispatch::map_grid(grid.size, grid.size, |x, z| {
            let k_len = grid.wavevector(x, z).length();
            let w = (GRAVITY_MPS2 * k_len).sqrt();
            if quantized {
                (w / omega_0).round() * omega_0
            } else {
                w
            }
        });
        let omega_max = omega.iter().copied().fold(0.0, f32::max);

        Self {
            grid: *grid,
            omega,
            wrap_period_s: std::f32::consts::TAU / omega_0,
            quantized,
            omega_max,
            precision_warned: AtomicBool::new(false),
        }
    }

    /// Exact repeat period of the animated field (meaningful when quantized)
    pub fn wrap_period(&self) -> f32 {
        self.wrap_period_s
    }

    /// Map wall-clock time to the phase-exact wrapped time fed to the kernel
    pub fn effective_time(&self, time_s: f32) -> f32 {
        if self.quantized {
            time_s.rem_euclid(self.wrap_period_s)
        } else {
            if self.omega_max * time_s > PHASE_PRECISION_LIMIT
                && !self.precision_warned.swap(true, Ordering::Relaxed)
            {
                log::warn!(
                    "phase omega*t = {:.3e} exceeds f32 precision; enable \
                     dispersion quantization to wrap time exactly",
                    self.omega_max * time_s
                );
            }
            time_s
        }
    }

    /// Rotate the spectrum to time `time_s` and fill all three channels
    pub fn modulate(&self, spectrum: &SpectrumBuffer, time_s: f32, out: &mut FrequencyBuffers) {
        assert_eq!(spectrum.size(), self.grid.size);
        let t = self.effective_time(time_s);
        let n = self.grid.size;
        let hw = n / 2 + 1;
        let grid = self.grid;
        let omega = &self.omega;

        // Height: only the non-redundant kx half, consumed by the C2R path
        dispatch::fill_grid(&mut out.height, hw, |kx, kz| {
            rotated_sum(spectrum, &grid, omega, kx, kz, t)
        });

        // Displacement: i * (k / |k|) * h, both axes packed into one buffer
        dispatch::fill_grid(&mut out.displacement, n, |kx, kz| {
            let h = rotated_sum(spectrum, &grid, omega, kx, kz, t);
            let k = derivative_wavevector(&grid, kx, kz);
            let k_len = grid.wavevector(kx, kz).length().max(K_EPSILON);
            // i * (kx + i*kz) / |k| = (-kz + i*kx) / |k|
            h * Complex32::new(-k.y / k_len, k.x / k_len)
        });

        // Normal gradient: i * k * h, unnormalized derivative operator
        dispatch::fill_grid(&mut out.gradient, n, |kx, kz| {
            let h = rotated_sum(spectrum, &grid, omega, kx, kz, t);
            let k = derivative_wavevector(&grid, kx, kz);
            h * Complex32::new(-k.y, k.x)
        });
    }
}

/// Wavevector for the odd (i*k) derivative operators. The Nyquist bins are
/// their own conjugate partners, so an odd operator there would break the
/// Hermitian property; its components are zeroed on those bins.
#[inline]
fn derivative_wavevector(grid: &GridParams, kx: usize, kz: usize) -> glam::Vec2 {
    let n = grid.size;
    let mut k = grid.wavevector(kx, kz);
    if kx == n / 2 {
        k.x = 0.0;
    }
    if kz == n / 2 {
        k.y = 0.0;
    }
    k
}

/// The conjugate-paired rotation: a*e^(i*w*t) + conj(b*e^(i*w*t)), where b
/// is the sample at the aliased negative-frequency partner index. The sum
/// is Hermitian by construction, which keeps the spatial field real.
#[inline]
fn rotated_sum(
    spectrum: &SpectrumBuffer,
    grid: &GridParams,
    omega: &[f32],
    x: usize,
    z: usize,
    t: f32,
) -> Complex32 {
    let (px, pz) = grid.partner(x, z);
    let a = spectrum.at(x, z);
    let b = spectrum.at(px, pz);
    let (sin, cos) = (omega[z * grid.size + x] * t).sin_cos();
    let phase = Complex32::new(cos, sin);
    a * phase + (b * phase).conj()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::{expand_hermitian, FftEngine};
    use crate::params::SpectrumParams;

    const N: usize = 64;

    fn setup() -> (GridParams, SpectrumParams, SpectrumBuffer) {
        let grid = GridParams {
            size: N,
            domain_size_m: 100.0,
        };
        let params = SpectrumParams::default();
        let spectrum = SpectrumBuffer::generate(&grid, &params).unwrap();
        (grid, params, spectrum)
    }

    #[test]
    fn test_time_zero_is_identity_rotation() {
        // At t = 0 the height half-spectrum must be exactly the raw
        // spectrum summed with its conjugate partner: no phase applied.
        let (grid, params, spectrum) = setup();
        let modulator = Modulator::new(&grid, &params);
        let mut buffers = FrequencyBuffers::new(&grid);
        modulator.modulate(&spectrum, 0.0, &mut buffers);

        let hw = N / 2 + 1;
        for kz in 0..N {
            for kx in 0..hw {
                let (px, pz) = grid.partner(kx, kz);
                let expected = spectrum.at(kx, kz) + spectrum.at(px, pz).conj();
                let got = buffers.height[kz * hw + kx];
                assert!((got - expected).norm() < 1e-6);
            }
        }
    }

    #[test]
    fn test_modulated_field_is_real() {
        // Hermitian check via the transform: expand the height half grid,
        // run the full C2C inverse, and demand a negligible imaginary part.
        let (grid, params, spectrum) = setup();
        let modulator = Modulator::new(&grid, &params);
        let mut buffers = FrequencyBuffers::new(&grid);
        modulator.modulate(&spectrum, 3.7, &mut buffers);

        let engine = FftEngine::new(N).unwrap();
        let mut full = expand_hermitian(&buffers.height, N);
        engine.inverse_c2c(&mut full);

        let scale: f32 = full
            .iter()
            .map(|v| v.re.abs())
            .fold(0.0, f32::max)
            .max(1e-6);
        for v in &full {
            assert!(v.im.abs() < 1e-4 * scale, "imag residual {}", v.im);
        }
    }

    #[test]
    fn test_displacement_channels_are_hermitian() {
        // The packed Dx + i*Dz buffer decodes into two real spatial fields
        // only if each unpacked channel is Hermitian: Dx(-k) = conj(Dx(k)).
        // Unpack both channels per bin pair and verify directly.
        let (grid, params, spectrum) = setup();
        let modulator = Modulator::new(&grid, &params);
        let mut buffers = FrequencyBuffers::new(&grid);
        modulator.modulate(&spectrum, 1.25, &mut buffers);

        // Compute each channel on its own from the operator definition and
        // check the symmetry bin by bin, then check the packing against it.
        let channel = |kx: usize, kz: usize| -> (Complex32, Complex32) {
            let h = rotated_sum(&spectrum, &grid, &modulator.omega, kx, kz, 1.25);
            let k = derivative_wavevector(&grid, kx, kz);
            let k_len = grid.wavevector(kx, kz).length().max(K_EPSILON);
            let dx = h * Complex32::new(0.0, k.x / k_len);
            let dz = h * Complex32::new(0.0, k.y / k_len);
            (dx, dz)
        };

        for kz in 0..N {
            for kx in 0..N {
                let (px, pz) = grid.partner(kx, kz);
                let (dx, dz) = channel(kx, kz);
                let (dx_p, dz_p) = channel(px, pz);
                assert!((dx_p - dx.conj()).norm() < 1e-5);
                assert!((dz_p - dz.conj()).norm() < 1e-5);

                let packed = buffers.displacement[kz * N + kx];
                let expected = dx + dz * Complex32::new(0.0, 1.0);
                assert!((packed - expected).norm() < 1e-5);
            }
        }
    }

    #[test]
    fn test_wrap_period_is_phase_exact() {
        let (grid, params, spectrum) = setup();
        let modulator = Modulator::new(&grid, &params);
        let period = modulator.wrap_period();

        let mut at_t = FrequencyBuffers::new(&grid);
        let mut at_t_plus_period = FrequencyBuffers::new(&grid);
        modulator.modulate(&spectrum, 2.0, &mut at_t);
        modulator.modulate(&spectrum, 2.0 + period, &mut at_t_plus_period);

        let scale: f32 = at_t
            .height
            .iter()
            .map(|v| v.norm())
            .fold(0.0, f32::max)
            .max(1e-9);
        for (a, b) in at_t.height.iter().zip(&at_t_plus_period.height) {
            assert!((a - b).norm() < 1e-4 * scale);
        }
    }

    #[test]
    fn test_quantized_dispersion_stays_close_to_exact() {
        // Quantization detunes each frequency by at most omega_0 / 2
        let grid = GridParams {
            size: N,
            domain_size_m: 100.0,
        };
        let quantized = Modulator::new(&grid, &SpectrumParams::default());
        let exact = Modulator::new(
            &grid,
            &SpectrumParams {
                quantize_dispersion: false,
                ..Default::default()
            },
        );
        let omega_0 = (GRAVITY_MPS2 * grid.k_min()).sqrt();
        for (q, e) in quantized.omega.iter().zip(&exact.omega) {
            assert!((q - e).abs() <= omega_0 * 0.5 + 1e-4);
        }
    }
}
