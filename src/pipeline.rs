//! Frame pipeline: Spectrum -> Modulate -> FFT -> PostProcess -> publish.
//!
//! The host side is single-threaded and issues the stages strictly in
//! order; each stage is internally data-parallel and fully completes
//! before the next one reads its output. Renderers read the front map set
//! while `advance` writes the back one, then `flip` publishes.

use rustfft::num_complex::Complex32;

use crate::error::ConfigError;
use crate::fft::FftEngine;
use crate::maps::{DoubleBuffered, MapSet};
use crate::modulate::{FrequencyBuffers, Modulator};
use crate::params::{GridParams, Precision, SpectrumParams};
use crate::postprocess::PostProcessor;
use crate::spectrum::SpectrumBuffer;

pub struct OceanPipeline {
    grid: GridParams,
    precision: Precision,
    spectrum: SpectrumBuffer,
    modulator: Modulator,
    fft: FftEngine,
    post: PostProcessor,
    /// Per-frame scratch, reused between frames
    freq: FrequencyBuffers,
    maps: DoubleBuffered<MapSet>,
    frame: u64,
}

impl OceanPipeline {
    pub fn new(
        grid: GridParams,
        params: SpectrumParams,
        precision: Precision,
    ) -> Result<Self, ConfigError> {
        grid.validate()?;
        params.validate()?;

        let spectrum = SpectrumBuffer::generate(&grid, &params)?;
        let modulator = Modulator::new(&grid, &params);
        let fft = FftEngine::new(grid.size)?;
        let texel_size = grid.domain_size_m / grid.size as f32;
        let post = PostProcessor::new(texel_size, params.choppiness, precision);

        log::info!(
            "ocean pipeline: {0}x{0} grid over {1} m tile, wrap period {2:.1} s",
            grid.size,
            grid.domain_size_m,
            modulator.wrap_period()
        );

        Ok(Self {
            grid,
            precision,
            spectrum,
            modulator,
            fft,
            post,
            freq: FrequencyBuffers::new(&grid),
            maps: DoubleBuffered::new(MapSet::zeroed(grid.size), MapSet::zeroed(grid.size)),
            frame: 0,
        })
    }

    /// Synthesize the ocean state at `time_s` into the back buffer and
    /// publish it. The previous frame's maps stay readable throughout.
    pub fn advance(&mut self, time_s: f32) {
        self.modulator
            .modulate(&self.spectrum, time_s, &mut self.freq);

        let heights = self.fft.inverse_c2r(&self.freq.height);

        let mut displacement = std::mem::take(&mut self.freq.displacement);
        self.fft.inverse_c2c(&mut displacement);
        let mut gradient = std::mem::take(&mut self.freq.gradient);
        self.fft.inverse_c2c(&mut gradient);

        let precision = self.precision;
        let back = self.maps.back_mut();
        back.height.store(heights, precision);
        back.displacement_x
            .store(displacement.iter().map(|c| c.re).collect(), precision);
        back.displacement_z
            .store(displacement.iter().map(|c| c.im).collect(), precision);
        back.gradient_x
            .store(gradient.iter().map(|c| c.re).collect(), precision);
        back.gradient_z
            .store(gradient.iter().map(|c| c.im).collect(), precision);

        self.post.bake(back);

        // Return scratch buffers (contents stale, overwritten next frame)
        self.freq.displacement = displacement;
        self.freq.gradient = gradient;

        self.maps.flip();
        self.frame += 1;
        log::debug!("frame {} synthesized at t={:.3}s", self.frame, time_s);
    }

    /// The most recently published map set
    pub fn maps(&self) -> &MapSet {
        self.maps.front()
    }

    pub fn grid(&self) -> &GridParams {
        &self.grid
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Exact repeat period of the animation when dispersion quantization
    /// is enabled (the documented numerical contract for long runs)
    pub fn wrap_period(&self) -> f32 {
        self.modulator.wrap_period()
    }

    /// Changing wind or spectrum parameters invalidates everything derived
    /// from the spectrum; regenerate in place.
    pub fn set_spectrum_params(&mut self, params: SpectrumParams) -> Result<(), ConfigError> {
        params.validate()?;
        self.spectrum = SpectrumBuffer::generate(&self.grid, &params)?;
        self.modulator = Modulator::new(&self.grid, &params);
        let texel_size = self.grid.domain_size_m / self.grid.size as f32;
        self.post = PostProcessor::new(texel_size, params.choppiness, self.precision);
        Ok(())
    }

    /// Raw spectrum access (read-only; shared across all frames)
    pub fn spectrum(&self) -> &[Complex32] {
        self.spectrum.samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::expand_hermitian;

    fn pipeline(size: usize) -> OceanPipeline {
        let grid = GridParams {
            size,
            domain_size_m: 100.0,
        };
        OceanPipeline::new(grid, SpectrumParams::default(), Precision::Full).unwrap()
    }

    #[test]
    fn test_time_zero_height_equals_unmodulated_spectrum_transform() {
        // At t = 0 the modulation rotation is the identity, so the height
        // field must equal the inverse FFT of the raw conjugate-paired
        // spectrum.
        let mut p = pipeline(64);
        p.advance(0.0);

        let grid = *p.grid();
        let n = grid.size;
        let mut raw = vec![Complex32::new(0.0, 0.0); n * n];
        for z in 0..n {
            for x in 0..n {
                let (px, pz) = grid.partner(x, z);
                raw[z * n + x] =
                    p.spectrum()[z * n + x] + p.spectrum()[pz * n + px].conj();
            }
        }
        let engine = FftEngine::new(n).unwrap();
        engine.inverse_c2c(&mut raw);

        let scale: f32 = raw.iter().map(|v| v.re.abs()).fold(0.0, f32::max).max(1e-9);
        for (h, r) in p.maps().height.data().iter().zip(&raw) {
            assert!((h - r.re).abs() < 1e-3 * scale);
        }
    }

    #[test]
    fn test_double_buffering_keeps_previous_frame_readable() {
        let mut p = pipeline(64);
        p.advance(0.0);
        let first: Vec<f32> = p.maps().height.data().to_vec();
        p.advance(1.0);
        let second: Vec<f32> = p.maps().height.data().to_vec();
        assert_ne!(first, second);

        // Back buffer (now holding frame 1 again after flip) is distinct
        // storage from the published one; publishing frame 3 must not have
        // altered what frame 2's readers saw. Synthesize t=0 again and
        // compare against the original frame for determinism.
        p.advance(0.0);
        let replay: Vec<f32> = p.maps().height.data().to_vec();
        for (a, b) in first.iter().zip(&replay) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_derived_maps_are_baked_each_frame() {
        let mut p = pipeline(64);
        p.advance(2.5);
        let maps = p.maps();
        assert_eq!(maps.height_mips.level_count(), 7);
        // A choppy sea must show Jacobian variation around 1
        let (mut lo, mut hi) = (f32::MAX, f32::MIN);
        for &j in maps.jacobian.data() {
            lo = lo.min(j);
            hi = hi.max(j);
        }
        assert!(lo < 1.0 && hi > 1.0);
    }

    #[test]
    fn test_height_channel_consistent_with_full_transform() {
        // The C2R fast path must agree with the reference C2C transform
        // of the Hermitian-expanded height spectrum.
        let mut p = pipeline(64);
        let mut freq = FrequencyBuffers::new(p.grid());
        p.modulator.modulate(&p.spectrum, 4.2, &mut freq);

        let real = p.fft.inverse_c2r(&freq.height);
        let mut full = expand_hermitian(&freq.height, p.grid.size);
        p.fft.inverse_c2c(&mut full);

        let scale: f32 = real.iter().map(|v| v.abs()).fold(0.0, f32::max).max(1e-9);
        for (r, c) in real.iter().zip(&full) {
            assert!((r - c.re).abs() < 1e-3 * scale);
        }
    }

    #[test]
    fn test_invalid_grid_is_startup_error() {
        let grid = GridParams {
            size: 48,
            domain_size_m: 100.0,
        };
        assert!(OceanPipeline::new(grid, SpectrumParams::default(), Precision::Full).is_err());
    }
}
