//! Parameter definitions with physical units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Physical units (meters, seconds, radians, etc.)
//! - Documented ranges and meanings
//! - `validate()` methods that reject configurations the pipeline cannot run

mod ocean;
mod terrain;

// Re-export all types
pub use ocean::{GridParams, Precision, SpectrumParams, GRAVITY_MPS2};
pub use terrain::{LodStrategyKind, TerrainLodParams, ViewParams};
