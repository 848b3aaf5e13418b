//! 2D inverse FFT engine converting frequency buffers into spatial maps.
//!
//! Built on rustfft, with a bandwidth-optimized complex-to-real path for
//! the height channel: modulation already enforces conjugate symmetry, so
//! only the non-redundant half of the kx axis is populated and each output
//! row costs one half-length complex transform instead of a full one.
//!
//! Scaling convention: inverse transforms are unnormalized (the plain
//! Tessendorf sum over wave components), so spectrum amplitudes map
//! directly to meters. `forward_c2c` carries the 1/N^2 factor instead,
//! which makes forward-then-inverse the identity.

use rayon::prelude::*;
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::error::ConfigError;

/// Planned FFTs and twiddles for one grid size
pub struct FftEngine {
    n: usize,
    inverse_n: Arc<dyn Fft<f32>>,
    forward_n: Arc<dyn Fft<f32>>,
    inverse_half: Arc<dyn Fft<f32>>,
    /// e^(+2*pi*i*k/n) for k in 0..n/2, used by the real-output row pass
    row_twiddles: Vec<Complex32>,
}

impl FftEngine {
    pub fn new(n: usize) -> Result<Self, ConfigError> {
        if n < 16 || !n.is_power_of_two() {
            return Err(ConfigError::InvalidGridSize(n));
        }
        let mut planner = FftPlanner::new();
        let inverse_n = planner.plan_fft_inverse(n);
        let forward_n = planner.plan_fft_forward(n);
        let inverse_half = planner.plan_fft_inverse(n / 2);
        let row_twiddles = (0..n / 2)
            .map(|k| {
                let angle = std::f32::consts::TAU * k as f32 / n as f32;
                Complex32::new(angle.cos(), angle.sin())
            })
            .collect();
        Ok(Self {
            n,
            inverse_n,
            forward_n,
            inverse_half,
            row_twiddles,
        })
    }

    pub fn size(&self) -> usize {
        self.n
    }

    /// Width of the non-redundant half grid the C2R path consumes
    pub fn half_width(&self) -> usize {
        self.n / 2 + 1
    }

    /// In-place unnormalized 2D inverse over a full N x N complex grid.
    ///
    /// After the transform, buffers packed as A + i*B (two independent
    /// Hermitian channels) carry channel A in `re` and channel B in `im`.
    pub fn inverse_c2c(&self, buf: &mut [Complex32]) {
        assert_eq!(buf.len(), self.n * self.n);
        self.pass_rows(buf, &self.inverse_n);
        transpose_square(buf, self.n);
        self.pass_rows(buf, &self.inverse_n);
        transpose_square(buf, self.n);
    }

    /// Normalized 2D forward transform (test/verification path)
    pub fn forward_c2c(&self, buf: &mut [Complex32]) {
        assert_eq!(buf.len(), self.n * self.n);
        self.pass_rows(buf, &self.forward_n);
        transpose_square(buf, self.n);
        self.pass_rows(buf, &self.forward_n);
        transpose_square(buf, self.n);
        let scale = 1.0 / (self.n * self.n) as f32;
        buf.iter_mut().for_each(|v| *v *= scale);
    }

    /// Unnormalized 2D inverse of a Hermitian half grid to real output.
    ///
    /// Input layout: row-major, one row per kz in 0..N, each row holding
    /// kx in 0..=N/2 (width N/2+1). Output is the full N x N real grid.
    ///
    /// Column pass runs N/2+1 full-length transforms (instead of N), the
    /// row pass folds each output row into one N/2 complex transform via
    /// the even/odd split, which is where the ~2x win comes from.
    pub fn inverse_c2r(&self, half: &[Complex32]) -> Vec<f32> {
        let n = self.n;
        let m = n / 2;
        let hw = self.half_width();
        assert_eq!(half.len(), hw * n);

        // Column pass: transform each retained kx column along kz.
        // inter is column-major: chunk kx holds spatial-z samples.
        let mut inter = vec![Complex32::new(0.0, 0.0); hw * n];
        let scratch_len = self.inverse_n.get_inplace_scratch_len();
        inter
            .par_chunks_mut(n)
            .enumerate()
            .for_each_init(
                || vec![Complex32::new(0.0, 0.0); scratch_len],
                |scratch, (kx, column)| {
                    for kz in 0..n {
                        column[kz] = half[kz * hw + kx];
                    }
                    self.inverse_n.process_with_scratch(column, scratch);
                },
            );

        // Row pass: each spatial row is still a Hermitian kx spectrum;
        // recover N reals from one M-point complex inverse.
        //
        // With X[k] = E[k] + w^k O[k] (E, O the even/odd-sample spectra,
        // w = e^(-2*pi*i/N)), conj(X[M-k]) = E[k] - w^k O[k], so
        //   Z[k] = (X[k] + conj(X[M-k])) + i * w^-k * (X[k] - conj(X[M-k]))
        // transforms back to x[2j] + i*x[2j+1] (unnormalized).
        let half_scratch_len = self.inverse_half.get_inplace_scratch_len();
        let mut out = vec![0.0f32; n * n];
        out.par_chunks_mut(n)
            .enumerate()
            .for_each_init(
                || {
                    (
                        vec![Complex32::new(0.0, 0.0); m],
                        vec![Complex32::new(0.0, 0.0); half_scratch_len],
                    )
                },
                |(packed, scratch), (z, row)| {
                    for k in 0..m {
                        let xk = inter[k * n + z];
                        let xc = inter[(m - k) * n + z].conj();
                        let even = xk + xc;
                        let odd = (xk - xc) * self.row_twiddles[k];
                        // even + i * odd
                        packed[k] =
                            Complex32::new(even.re - odd.im, even.im + odd.re);
                    }
                    self.inverse_half.process_with_scratch(packed, scratch);
                    for j in 0..m {
                        row[2 * j] = packed[j].re;
                        row[2 * j + 1] = packed[j].im;
                    }
                },
            );
        out
    }

    fn pass_rows(&self, buf: &mut [Complex32], fft: &Arc<dyn Fft<f32>>) {
        let scratch_len = fft.get_inplace_scratch_len();
        buf.par_chunks_mut(self.n).for_each_init(
            || vec![Complex32::new(0.0, 0.0); scratch_len],
            |scratch, row| {
                fft.process_with_scratch(row, scratch);
            },
        );
    }
}

/// In-place transpose of a square row-major grid
fn transpose_square(buf: &mut [Complex32], n: usize) {
    for z in 0..n {
        for x in (z + 1)..n {
            buf.swap(z * n + x, x * n + z);
        }
    }
}

/// Expand a Hermitian half grid (width N/2+1) to the full N x N grid.
///
/// Used by tests and by callers that want the C2C path on a half-spectrum
/// channel; the missing columns are the conjugates of their partners.
pub fn expand_hermitian(half: &[Complex32], n: usize) -> Vec<Complex32> {
    let hw = n / 2 + 1;
    assert_eq!(half.len(), hw * n);
    let mut full = vec![Complex32::new(0.0, 0.0); n * n];
    for kz in 0..n {
        for kx in 0..hw {
            full[kz * n + kx] = half[kz * hw + kx];
        }
        for kx in hw..n {
            let (px, pz) = ((n - kx) % n, (n - kz) % n);
            full[kz * n + kx] = half[pz * hw + px].conj();
        }
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    const N: usize = 32;

    fn random_complex_grid(seed: u64, len: usize) -> Vec<Complex32> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..len)
            .map(|_| Complex32::new(rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5))
            .collect()
    }

    /// Build a Hermitian half grid from a random real spatial field by
    /// running the normalized forward transform and keeping half the kx axis.
    fn hermitian_half_from_real(engine: &FftEngine, seed: u64) -> (Vec<f32>, Vec<Complex32>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let spatial: Vec<f32> = (0..N * N).map(|_| rng.gen::<f32>() - 0.5).collect();
        let mut freq: Vec<Complex32> =
            spatial.iter().map(|&v| Complex32::new(v, 0.0)).collect();
        engine.forward_c2c(&mut freq);
        let hw = engine.half_width();
        let mut half = vec![Complex32::new(0.0, 0.0); hw * N];
        for kz in 0..N {
            for kx in 0..hw {
                half[kz * hw + kx] = freq[kz * N + kx];
            }
        }
        (spatial, half)
    }

    #[test]
    fn test_forward_then_inverse_round_trips() {
        let engine = FftEngine::new(N).unwrap();
        let original = random_complex_grid(7, N * N);
        let mut buf = original.clone();
        engine.forward_c2c(&mut buf);
        engine.inverse_c2c(&mut buf);
        for (a, b) in original.iter().zip(&buf) {
            assert!((a - b).norm() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn test_c2r_matches_c2c_on_hermitian_input() {
        let engine = FftEngine::new(N).unwrap();
        let (_, half) = hermitian_half_from_real(&engine, 21);

        let real = engine.inverse_c2r(&half);

        let mut full = expand_hermitian(&half, N);
        engine.inverse_c2c(&mut full);

        let scale: f32 = real.iter().map(|v| v.abs()).fold(0.0, f32::max).max(1e-6);
        for (r, c) in real.iter().zip(&full) {
            assert!((r - c.re).abs() < 1e-3 * scale);
            // Hermitian input must come out purely real
            assert!(c.im.abs() < 1e-3 * scale);
        }
    }

    #[test]
    fn test_c2r_inverts_forward_of_real_field() {
        let engine = FftEngine::new(N).unwrap();
        let (spatial, half) = hermitian_half_from_real(&engine, 3);
        let restored = engine.inverse_c2r(&half);
        // forward is normalized, inverse unnormalized: expect N^2 gain
        let gain = (N * N) as f32;
        for (orig, rest) in spatial.iter().zip(&restored) {
            assert!((orig * gain - rest).abs() < 1e-2, "{orig} vs {rest}");
        }
    }

    #[test]
    fn test_single_bin_is_a_plane_wave() {
        // One unit at (kx=1, kz=0) plus its implicit conjugate partner
        // must inverse-transform to 2*cos(2*pi*x/N).
        let engine = FftEngine::new(N).unwrap();
        let hw = engine.half_width();
        let mut half = vec![Complex32::new(0.0, 0.0); hw * N];
        half[1] = Complex32::new(1.0, 0.0);
        let out = engine.inverse_c2r(&half);
        for z in 0..N {
            for x in 0..N {
                let expected = 2.0 * (std::f32::consts::TAU * x as f32 / N as f32).cos();
                assert!((out[z * N + x] - expected).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_rejects_bad_size() {
        assert!(FftEngine::new(100).is_err());
        assert!(FftEngine::new(8).is_err());
    }

    #[test]
    fn test_transpose_involution() {
        let original = random_complex_grid(9, 16 * 16);
        let mut buf = original.clone();
        transpose_square(&mut buf, 16);
        assert_ne!(original, buf);
        transpose_square(&mut buf, 16);
        assert_eq!(original, buf);
    }
}
