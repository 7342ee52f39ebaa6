//! Spectral band synthesis.
//!
//! Turns a terrain field into a multi-band reflectance cube with controllable
//! cross-band correlation.

mod bands;
mod config;
mod cube;

pub use bands::{baseline_noise, synthesize_bands};
pub use config::{BandCorrelation, SpectralConfig, MAX_QUANTIZATION_BITS};
pub use cube::BandCube;
