//! Atmospheric effect parameters.

use serde::{Deserialize, Serialize};

use crate::config::{ensure_positive, ensure_unit, ConfigError};

/// Parameters for the procedural cloud, haze and shadow approximation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosphericConfig {
    /// Fraction of the normalized cloud field kept as cloud (0-1).
    pub cloud_coverage: f64,
    /// Peak haze opacity (0-1).
    pub haze_intensity: f64,
    /// Value haze blends toward (0-1).
    pub aerosol_density: f64,
    /// Peak darkening under blurred cloud shadows (0-1). Zero disables shadows.
    pub shadow_intensity: f64,
    /// Cloud feature size in pixels; the noise frequency is `1 / cloud_scale`.
    pub cloud_scale: f64,
    /// Haze feature size in pixels.
    pub haze_scale: f64,
}

impl Default for AtmosphericConfig {
    fn default() -> Self {
        Self {
            cloud_coverage: 0.3,
            haze_intensity: 0.2,
            aerosol_density: 0.1,
            shadow_intensity: 0.4,
            cloud_scale: 100.0,
            haze_scale: 200.0,
        }
    }
}

impl AtmosphericConfig {
    /// No clouds, haze or shadows.
    pub fn clear() -> Self {
        Self {
            cloud_coverage: 0.0,
            haze_intensity: 0.0,
            aerosol_density: 0.0,
            shadow_intensity: 0.0,
            ..Default::default()
        }
    }

    /// Heavy cloud cover with thick haze.
    pub fn overcast() -> Self {
        Self {
            cloud_coverage: 0.8,
            haze_intensity: 0.5,
            aerosol_density: 0.3,
            shadow_intensity: 0.6,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_unit("cloud_coverage", self.cloud_coverage)?;
        ensure_unit("haze_intensity", self.haze_intensity)?;
        ensure_unit("aerosol_density", self.aerosol_density)?;
        ensure_unit("shadow_intensity", self.shadow_intensity)?;
        ensure_positive("cloud_scale", self.cloud_scale)?;
        ensure_positive("haze_scale", self.haze_scale)
    }
}
