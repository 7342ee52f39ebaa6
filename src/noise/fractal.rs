//! Multi-octave fractal noise built on simplex gradient noise.

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use simdnoise::NoiseBuilder;

/// Rows per parallel work unit when evaluating a whole grid.
pub const ROW_BLOCK: usize = 32;

/// Sub-seed stream for fractal octaves.
const OCTAVE_STREAM: u64 = 0x0c7a_7e5e_ed00_0001;
/// Sub-seed stream for 3D decorrelation slices.
const SLICE_STREAM: u64 = 0x0c7a_7e5e_ed00_0002;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Derives an independent sub-seed for `(stream, index)` from a scene seed.
///
/// Pure function of its inputs, so octaves, row blocks and scenes can be
/// evaluated in any order (or in parallel) with identical results.
pub fn derive_seed(seed: u64, stream: u64, index: u64) -> u64 {
    splitmix64(splitmix64(seed ^ stream) ^ index)
}

/// Folds a 64-bit seed into the 32-bit seed simdnoise expects.
fn noise_seed(seed: u64) -> i32 {
    ((seed >> 32) ^ (seed & 0xffff_ffff)) as u32 as i32
}

/// Single-octave 2D simplex noise at `(x, y)`.
pub fn sample_2d(x: f64, y: f64, seed: u64) -> f64 {
    let value = NoiseBuilder::fbm_2d_offset(x as f32, 1, y as f32, 1)
        .with_seed(noise_seed(seed))
        .with_freq(1.0)
        .with_octaves(1)
        .generate()
        .0[0];
    value as f64
}

/// Single-octave 3D simplex noise at `(x, y, z)`.
pub fn sample_3d(x: f64, y: f64, z: f64, seed: u64) -> f64 {
    let value = NoiseBuilder::fbm_3d_offset(x as f32, 1, y as f32, 1, z as f32, 1)
        .with_seed(noise_seed(seed))
        .with_freq(1.0)
        .with_octaves(1)
        .generate()
        .0[0];
    value as f64
}

/// Octave stack shared by the 2D and 3D fractal samplers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractalNoiseConfig {
    /// Number of noise layers (at least 1 for a non-zero field).
    pub octaves: u32,
    /// Amplitude decay per octave.
    pub persistence: f64,
    /// Frequency of the first octave; each further octave doubles it.
    pub frequency: f64,
    /// Scene seed from which every octave seed is derived.
    pub seed: u64,
}

impl FractalNoiseConfig {
    pub fn new(octaves: u32, persistence: f64, frequency: f64, seed: u64) -> Self {
        Self {
            octaves,
            persistence,
            frequency,
            seed,
        }
    }

    /// Sums `octaves` layers of 2D noise. The result is not normalized.
    pub fn sample_2d(&self, x: f64, y: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;

        for octave in 0..self.octaves {
            let octave_seed = derive_seed(self.seed, OCTAVE_STREAM, octave as u64);
            total += sample_2d(x * frequency, y * frequency, octave_seed) * amplitude;
            amplitude *= self.persistence;
            frequency *= 2.0;
        }

        total
    }

    /// Sums `octaves` layers of 3D noise.
    ///
    /// `z` selects a decorrelated slice of the field; it is doubled per
    /// octave along with the planar frequency but not scaled by it.
    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut slice = z;

        for octave in 0..self.octaves {
            let octave_seed = derive_seed(self.seed, OCTAVE_STREAM, octave as u64);
            total += sample_3d(x * frequency, y * frequency, slice, octave_seed) * amplitude;
            amplitude *= self.persistence;
            frequency *= 2.0;
            slice *= 2.0;
        }

        total
    }
}

/// Fractal 2D noise; see [`FractalNoiseConfig::sample_2d`].
pub fn fractal_2d(
    x: f64,
    y: f64,
    octaves: u32,
    persistence: f64,
    frequency: f64,
    seed: u64,
) -> f64 {
    FractalNoiseConfig::new(octaves, persistence, frequency, seed).sample_2d(x, y)
}

/// Fractal 3D noise; see [`FractalNoiseConfig::sample_3d`].
pub fn fractal_3d(
    x: f64,
    y: f64,
    z: f64,
    octaves: u32,
    persistence: f64,
    frequency: f64,
    seed: u64,
) -> f64 {
    FractalNoiseConfig::new(octaves, persistence, frequency, seed).sample_3d(x, y, z)
}

/// Maps a seed to a slice coordinate in `[0, 256)` for [`fractal_3d`].
pub fn slice_for_seed(seed: u64) -> f64 {
    let bits = derive_seed(seed, SLICE_STREAM, 0) >> 11;
    (bits as f64 / (1u64 << 53) as f64) * 256.0
}

/// Evaluates `sampler(row, col)` for every pixel of a `height x width` grid.
///
/// Rows are split into blocks of [`ROW_BLOCK`] evaluated on the rayon pool.
/// `sampler` must be a pure function of its coordinates.
pub fn sample_grid<F>(height: usize, width: usize, sampler: F) -> Array2<f64>
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    let mut grid = Array2::<f64>::zeros((height, width));

    grid.axis_chunks_iter_mut(Axis(0), ROW_BLOCK)
        .into_par_iter()
        .enumerate()
        .for_each(|(block, mut chunk)| {
            let first_row = block * ROW_BLOCK;
            for ((row, col), value) in chunk.indexed_iter_mut() {
                *value = sampler(first_row + row, col);
            }
        });

    grid
}
