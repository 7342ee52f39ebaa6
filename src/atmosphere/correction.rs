//! Dark-object subtraction: a statistical haze correction.
//!
//! The darkest pixels of a band are assumed to be truly black, so their
//! value is attributed to atmospheric path radiance and removed from the band.

use tracing::debug;

use crate::config::ConfigError;
use crate::spectral::BandCube;

/// Default dark-object percentile.
pub const DEFAULT_DARK_PERCENTILE: f64 = 1.0;

/// `percentile`-th value of `values` with linear interpolation between ranks.
///
/// Returns `None` for an empty slice.
pub fn percentile(values: &[f32], percentile: f64) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));

    let rank = percentile / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    let low = sorted[lower] as f64;
    let high = sorted[upper] as f64;
    Some((low + (high - low) * fraction) as f32)
}

/// Subtracts each band's dark-object value and clamps negatives to zero.
///
/// # Returns
/// The corrected cube and the per-band dark values, in band order
pub fn dark_object_subtraction(
    mut cube: BandCube,
    dark_percentile: f64,
) -> Result<(BandCube, Vec<f32>), ConfigError> {
    if !(0.0..=100.0).contains(&dark_percentile) {
        return Err(ConfigError::InvalidPercentile(dark_percentile));
    }

    let mut dark_values = Vec::with_capacity(cube.band_count());
    for mut band in cube.data_mut().outer_iter_mut() {
        let values: Vec<f32> = band.iter().copied().collect();
        let dark = percentile(&values, dark_percentile).unwrap_or(0.0);
        band.mapv_inplace(|v| (v - dark).max(0.0));
        dark_values.push(dark);
    }

    debug!(?dark_values, dark_percentile, "dark-object subtraction applied");
    Ok((cube, dark_values))
}
