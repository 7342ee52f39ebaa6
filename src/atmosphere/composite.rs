//! Compositing atmosphere masks onto a band cube.

use ndarray::Zip;
use tracing::debug;

use super::config::AtmosphericConfig;
use super::masks::{generate_masks, AtmosphericMasks};
use crate::config::ConfigError;
use crate::spectral::BandCube;

/// Clouds, then haze, then shadow. The order is part of the model.
#[inline]
fn blend(value: f64, cloud: f64, haze: f64, shadow: f64, aerosol_density: f64) -> f64 {
    let clouded = value * (1.0 - cloud) + cloud;
    let hazed = clouded * (1.0 - haze) + haze * aerosol_density;
    hazed * (1.0 - shadow)
}

/// Applies precomputed masks to every band and clips the cube to `[0, 1]`.
///
/// Per band: `b = b(1-c) + c`, then `b = b(1-h) + h*aerosol_density`, then
/// `b = b(1-s)` when a shadow mask is present.
///
/// # Panics
/// Panics if the masks are not shaped like the cube's bands.
pub fn apply_masks(
    mut cube: BandCube,
    masks: &AtmosphericMasks,
    config: &AtmosphericConfig,
) -> BandCube {
    assert_eq!(
        masks.shape(),
        (cube.height(), cube.width()),
        "atmosphere masks must match the band shape"
    );
    let aerosol = config.aerosol_density;

    for mut band in cube.data_mut().outer_iter_mut() {
        match &masks.shadow {
            Some(shadow) => Zip::from(&mut band)
                .and(&masks.clouds)
                .and(&masks.haze)
                .and(shadow)
                .par_for_each(|v, &c, &h, &s| {
                    *v = blend(*v as f64, c, h, s, aerosol) as f32;
                }),
            None => Zip::from(&mut band)
                .and(&masks.clouds)
                .and(&masks.haze)
                .par_for_each(|v, &c, &h| {
                    *v = blend(*v as f64, c, h, 0.0, aerosol) as f32;
                }),
        }
    }

    cube.clip_unit();
    cube
}

/// Generates the masks once for the cube's shape and composites them.
pub fn composite(
    cube: BandCube,
    config: &AtmosphericConfig,
    seed: u64,
) -> Result<BandCube, ConfigError> {
    let masks = generate_masks(cube.height(), cube.width(), config, seed)?;
    let cube = apply_masks(cube, &masks, config);
    debug!(bands = cube.band_count(), seed, "atmosphere composited");
    Ok(cube)
}
