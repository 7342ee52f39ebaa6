//! Terrain field generation using fractal noise.

use std::time::Instant;

use tracing::debug;

use super::config::TerrainConfig;
use super::grid::{normalize, Grid};
use crate::config::ConfigError;
use crate::filter::gaussian_blur;
use crate::noise::{sample_grid, FractalNoiseConfig};

fn ensure_shape(height: usize, width: usize) -> Result<(), ConfigError> {
    if height == 0 || width == 0 {
        return Err(ConfigError::EmptyShape { height, width });
    }
    Ok(())
}

/// Generates a normalized `height x width` terrain field.
///
/// Pixel `(row, col)` samples fractal noise at `(col, row)` scaled by the
/// configured base frequency. The field is min-max normalized to `[0, 1]`
/// and then smoothed with `sigma = 1 / roughness` when roughness is positive.
///
/// # Arguments
/// * `height`, `width` - Grid shape in pixels
/// * `config` - Terrain parameters, validated before any sampling
/// * `seed` - Scene seed
///
/// # Returns
/// The terrain grid, or a configuration error
pub fn generate_terrain(
    height: usize,
    width: usize,
    config: &TerrainConfig,
    seed: u64,
) -> Result<Grid, ConfigError> {
    config.validate()?;
    ensure_shape(height, width)?;

    let started = Instant::now();
    let noise = FractalNoiseConfig::new(
        config.octaves,
        config.persistence,
        config.base_frequency,
        seed,
    );
    let scale = config.elevation_scale;

    let mut terrain = sample_grid(height, width, |row, col| {
        scale * noise.sample_2d(col as f64, row as f64)
    });
    normalize(&mut terrain);

    if config.roughness > 0.0 {
        terrain = gaussian_blur(&terrain, 1.0 / config.roughness);
    }

    debug!(
        height,
        width,
        seed,
        octaves = config.octaves,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "terrain generated"
    );
    Ok(terrain)
}
