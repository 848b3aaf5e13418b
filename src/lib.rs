//! Swell - FFT ocean synthesis feeding a crack-free adaptive-LOD terrain

pub mod dispatch;
pub mod error;
pub mod fft;
pub mod maps;
pub mod modulate;
pub mod params;
pub mod pipeline;
pub mod postprocess;
pub mod spectrum;
pub mod terrain;
