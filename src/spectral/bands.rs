//! Band synthesis: terrain signal blended against one shared baseline noise.

use std::time::Instant;

use ndarray::{Array3, Axis, Zip};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::debug;

use super::config::SpectralConfig;
use super::cube::BandCube;
use crate::config::ConfigError;
use crate::noise::{derive_seed, ROW_BLOCK};
use crate::terrain::Grid;

/// Sub-seed stream for the shared baseline noise.
const BASELINE_STREAM: u64 = 0x5bec_7a1b_a5e1_0001;

/// Draws a `Normal(0, std_dev)` grid.
///
/// Each block of [`ROW_BLOCK`] rows owns a ChaCha8 generator seeded from
/// `(seed, block)`, so the grid is identical regardless of thread scheduling.
pub fn baseline_noise(
    height: usize,
    width: usize,
    std_dev: f64,
    seed: u64,
) -> Result<Grid, ConfigError> {
    let normal = Normal::new(0.0, std_dev).map_err(|_| ConfigError::Negative {
        name: "spectral_noise",
        value: std_dev,
    })?;

    let mut grid = Grid::zeros((height, width));
    grid.axis_chunks_iter_mut(Axis(0), ROW_BLOCK)
        .into_par_iter()
        .enumerate()
        .for_each(|(block, mut chunk)| {
            let mut rng =
                ChaCha8Rng::seed_from_u64(derive_seed(seed, BASELINE_STREAM, block as u64));
            chunk.iter_mut().for_each(|v| *v = normal.sample(&mut rng));
        });

    Ok(grid)
}

/// Derives the band cube from a terrain field.
///
/// Every band is `(terrain * w + base_noise * (1 - w)) * sensor_gain`, with a
/// single `base_noise` grid shared by all bands so that bands differ only by
/// their blend weight. With quantization enabled each value is rounded to a
/// multiple of `1 / 2^bits`. Values are not clipped at this stage.
///
/// # Arguments
/// * `terrain` - Normalized terrain grid; defines the cube's plane shape
/// * `config` - Spectral parameters, validated before any work
/// * `seed` - Scene seed for the baseline noise
pub fn synthesize_bands(
    terrain: &Grid,
    config: &SpectralConfig,
    seed: u64,
) -> Result<BandCube, ConfigError> {
    config.validate()?;
    let (height, width) = terrain.dim();
    if height == 0 || width == 0 {
        return Err(ConfigError::EmptyShape { height, width });
    }

    let started = Instant::now();
    let base_noise = baseline_noise(height, width, config.spectral_noise, seed)?;
    let steps = config.quantization_steps();
    let gain = config.sensor_gain;

    let mut data = Array3::<f32>::zeros((config.band_count(), height, width));
    for (mut plane, band) in data.outer_iter_mut().zip(&config.band_correlations) {
        let weight = band.weight;
        Zip::from(&mut plane)
            .and(terrain)
            .and(&base_noise)
            .par_for_each(|out, &signal, &noise| {
                let mut value = (signal * weight + noise * (1.0 - weight)) * gain;
                if let Some(steps) = steps {
                    value = (value * steps).round() / steps;
                }
                *out = value as f32;
            });
    }

    let names = config.band_names().map(str::to_owned).collect();
    debug!(
        bands = config.band_count(),
        height,
        width,
        seed,
        quantization_bits = config.quantization_bits,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "spectral bands synthesized"
    );
    Ok(BandCube::new(names, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::BandCorrelation;
    use crate::terrain::{generate_terrain, TerrainConfig};
    use approx::assert_abs_diff_eq;

    fn terrain() -> Grid {
        generate_terrain(40, 36, &TerrainConfig::default(), 7).unwrap()
    }

    #[test]
    fn test_band_count_and_order() {
        let config = SpectralConfig::with_bands(&[("swir", 0.2), ("red", 1.0), ("nir", 0.3)]);
        let cube = synthesize_bands(&terrain(), &config, 1).unwrap();
        assert_eq!(cube.shape(), (3, 40, 36));
        assert_eq!(cube.band_names(), &["swir", "red", "nir"]);
    }

    #[test]
    fn test_quantization_invariant() {
        for bits in [1u32, 4, 12, 16] {
            let config = SpectralConfig {
                quantization_bits: bits,
                ..Default::default()
            };
            let cube = synthesize_bands(&terrain(), &config, 3).unwrap();
            let steps = (1u32 << bits) as f64;
            for &v in cube.data().iter() {
                let scaled = v as f64 * steps;
                assert_eq!(scaled, scaled.round(), "{} is not a multiple of 1/{}", v, steps);
            }
        }
    }

    #[test]
    fn test_full_weight_band_follows_terrain() {
        let terrain = terrain();
        let config = SpectralConfig {
            band_correlations: vec![BandCorrelation::new("red", 1.0)],
            quantization_bits: 0,
            sensor_gain: 2.0,
            ..Default::default()
        };
        let cube = synthesize_bands(&terrain, &config, 9).unwrap();
        for ((r, c), &t) in terrain.indexed_iter() {
            assert_abs_diff_eq!(cube.band(0)[[r, c]] as f64, t * 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_bands_share_one_baseline() {
        // With weight 0 every band is pure baseline noise, so all planes match.
        let config = SpectralConfig {
            quantization_bits: 0,
            ..SpectralConfig::with_bands(&[("a", 0.0), ("b", 0.0)])
        };
        let cube = synthesize_bands(&terrain(), &config, 21).unwrap();
        assert_eq!(cube.band(0), cube.band(1));
        assert!(cube.band(0).iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_zero_noise_zero_weight_is_flat() {
        let config = SpectralConfig {
            spectral_noise: 0.0,
            ..SpectralConfig::with_bands(&[("dark", 0.0)])
        };
        let cube = synthesize_bands(&terrain(), &config, 2).unwrap();
        assert!(cube.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_baseline_noise_statistics_and_determinism() {
        let a = baseline_noise(100, 100, 0.5, 11).unwrap();
        let b = baseline_noise(100, 100, 0.5, 11).unwrap();
        assert_eq!(a, b);

        let mean = a.mean().unwrap();
        let std = (a.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / a.len() as f64).sqrt();
        assert!(mean.abs() < 0.05, "mean {} too far from 0", mean);
        assert!((std - 0.5).abs() < 0.05, "std {} too far from 0.5", std);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let config = SpectralConfig::default();
        let a = synthesize_bands(&terrain(), &config, 5).unwrap();
        let b = synthesize_bands(&terrain(), &config, 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_band_map_rejected() {
        let config = SpectralConfig::with_bands(&[]);
        assert_eq!(
            synthesize_bands(&terrain(), &config, 1),
            Err(ConfigError::NoBands)
        );
    }
}
