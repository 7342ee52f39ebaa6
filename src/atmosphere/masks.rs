//! Cloud, haze and shadow masks.

use std::time::Instant;

use tracing::debug;

use super::config::AtmosphericConfig;
use crate::config::{ensure_positive, ensure_unit, ConfigError};
use crate::filter::gaussian_blur;
use crate::noise::{derive_seed, sample_grid, slice_for_seed, FractalNoiseConfig};
use crate::terrain::{nonzero_fraction, normalize, Grid};

pub const CLOUD_OCTAVES: u32 = 4;
pub const CLOUD_PERSISTENCE: f64 = 0.5;
/// Blur applied to thresholded clouds for soft edges.
pub const CLOUD_EDGE_SIGMA: f64 = 2.0;
pub const HAZE_OCTAVES: u32 = 2;
pub const HAZE_PERSISTENCE: f64 = 0.5;
/// Blur turning the cloud mask into a ground shadow.
pub const SHADOW_SIGMA: f64 = 5.0;

const CLOUD_STREAM: u64 = 0xa7b0_c10d_0000_0001;
const HAZE_STREAM: u64 = 0xa7b0_4a2e_0000_0002;

/// Per-scene atmosphere masks, each shaped like one band.
#[derive(Debug, Clone, PartialEq)]
pub struct AtmosphericMasks {
    /// Cloud opacity in `[0, 1]`.
    pub clouds: Grid,
    /// Haze opacity in `[0, haze_intensity]`.
    pub haze: Grid,
    /// Shadow darkening; absent when shadow intensity is zero.
    pub shadow: Option<Grid>,
}

impl AtmosphericMasks {
    /// `(height, width)` of every mask.
    pub fn shape(&self) -> (usize, usize) {
        self.clouds.dim()
    }

    /// Fraction of pixels with any cloud.
    pub fn cloud_fraction(&self) -> f64 {
        nonzero_fraction(&self.clouds)
    }
}

/// Thresholded, edge-softened cloud mask.
///
/// The underlying 3D field depends only on `(seed, scale)`: changing the
/// coverage moves the threshold `1 - coverage` over the same field, so more
/// coverage never removes cloud.
pub fn cloud_mask(
    height: usize,
    width: usize,
    coverage: f64,
    scale: f64,
    seed: u64,
) -> Result<Grid, ConfigError> {
    ensure_unit("cloud_coverage", coverage)?;
    ensure_positive("cloud_scale", scale)?;

    let noise = FractalNoiseConfig::new(
        CLOUD_OCTAVES,
        CLOUD_PERSISTENCE,
        1.0 / scale,
        derive_seed(seed, CLOUD_STREAM, 0),
    );
    let slice = slice_for_seed(seed);

    let mut clouds = sample_grid(height, width, |row, col| {
        noise.sample_3d(col as f64, row as f64, slice)
    });
    normalize(&mut clouds);

    let threshold = 1.0 - coverage;
    clouds.mapv_inplace(|v| if v > threshold { v } else { 0.0 });

    Ok(gaussian_blur(&clouds, CLOUD_EDGE_SIGMA))
}

/// Smooth haze field scaled into `[0, intensity]`.
pub fn haze_mask(
    height: usize,
    width: usize,
    intensity: f64,
    scale: f64,
    seed: u64,
) -> Result<Grid, ConfigError> {
    ensure_unit("haze_intensity", intensity)?;
    ensure_positive("haze_scale", scale)?;

    let noise = FractalNoiseConfig::new(
        HAZE_OCTAVES,
        HAZE_PERSISTENCE,
        1.0 / scale,
        derive_seed(seed, HAZE_STREAM, 0),
    );

    let mut haze = sample_grid(height, width, |row, col| {
        noise.sample_2d(col as f64, row as f64)
    });
    normalize(&mut haze);
    haze.mapv_inplace(|v| v * intensity);
    Ok(haze)
}

/// Shadow cast by `clouds`, or `None` when `intensity` is zero.
pub fn shadow_mask(clouds: &Grid, intensity: f64) -> Option<Grid> {
    if intensity <= 0.0 {
        return None;
    }
    let mut shadow = gaussian_blur(clouds, SHADOW_SIGMA);
    shadow.mapv_inplace(|v| v * intensity);
    Some(shadow)
}

/// Builds all three masks once for a scene.
pub fn generate_masks(
    height: usize,
    width: usize,
    config: &AtmosphericConfig,
    seed: u64,
) -> Result<AtmosphericMasks, ConfigError> {
    config.validate()?;
    if height == 0 || width == 0 {
        return Err(ConfigError::EmptyShape { height, width });
    }

    let started = Instant::now();
    let clouds = cloud_mask(height, width, config.cloud_coverage, config.cloud_scale, seed)?;
    let haze = haze_mask(height, width, config.haze_intensity, config.haze_scale, seed)?;
    let shadow = shadow_mask(&clouds, config.shadow_intensity);

    let masks = AtmosphericMasks {
        clouds,
        haze,
        shadow,
    };
    debug!(
        height,
        width,
        seed,
        cloud_fraction = masks.cloud_fraction(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "atmosphere masks generated"
    );
    Ok(masks)
}
