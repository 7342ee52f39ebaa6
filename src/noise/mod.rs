//! Noise generation module for scene synthesis.
//!
//! Uses simdnoise simplex gradient noise; every octave draws a sub-seed
//! derived from the scene seed, so no global RNG state exists.

mod fractal;

pub use fractal::{
    derive_seed, fractal_2d, fractal_3d, sample_2d, sample_3d, sample_grid, slice_for_seed,
    FractalNoiseConfig, ROW_BLOCK,
};
