//! Terrain synthesis parameters.

use serde::{Deserialize, Serialize};

use crate::config::{ensure_non_negative, ensure_positive, ConfigError};

/// Parameters for the fractal elevation/reflectance proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Amplitude of the first octave. Cancels out under normalization
    /// unless it is zero, which yields a flat field.
    pub elevation_scale: f64,
    /// Smoothing control; the Gaussian sigma is `1 / roughness`. Zero disables smoothing.
    pub roughness: f64,
    /// Amplitude decay per octave.
    pub persistence: f64,
    /// Number of noise octaves.
    pub octaves: u32,
    /// Frequency of the first octave, in cycles per pixel.
    pub base_frequency: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            elevation_scale: 1000.0,
            roughness: 0.5,
            persistence: 0.5,
            octaves: 6,
            base_frequency: 0.02,
        }
    }
}

impl TerrainConfig {
    /// Creates a smoother, low-detail configuration (few octaves, heavy smoothing).
    pub fn gentle() -> Self {
        Self {
            roughness: 0.25,
            persistence: 0.4,
            octaves: 3,
            ..Default::default()
        }
    }

    /// Creates a rugged configuration with fine detail and no smoothing.
    pub fn rugged() -> Self {
        Self {
            roughness: 0.0,
            persistence: 0.6,
            octaves: 8,
            base_frequency: 0.03,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.octaves < 1 {
            return Err(ConfigError::InvalidOctaves(self.octaves));
        }
        ensure_positive("base_frequency", self.base_frequency)?;
        ensure_positive("persistence", self.persistence)?;
        ensure_non_negative("roughness", self.roughness)?;
        ensure_non_negative("elevation_scale", self.elevation_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TerrainConfig::default();
        assert_eq!(config.octaves, 6);
        assert_eq!(config.persistence, 0.5);
        assert_eq!(config.base_frequency, 0.02);
        assert!(config.validate().is_ok());
        assert!(TerrainConfig::gentle().validate().is_ok());
        assert!(TerrainConfig::rugged().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_octaves() {
        let config = TerrainConfig {
            octaves: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidOctaves(0)));
    }

    #[test]
    fn test_rejects_non_positive_frequency() {
        for frequency in [0.0, -0.5, f64::NAN] {
            let config = TerrainConfig {
                base_frequency: frequency,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::NonPositive { name: "base_frequency", .. })
            ));
        }
    }

    #[test]
    fn test_rejects_negative_roughness() {
        let config = TerrainConfig {
            roughness: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative { name: "roughness", .. })
        ));
    }
}
