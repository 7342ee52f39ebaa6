//! Spectral band synthesis parameters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{ensure_non_negative, ensure_positive, ConfigError};

/// Largest supported quantization depth.
pub const MAX_QUANTIZATION_BITS: u32 = 16;

/// One output band and its blend weight against the shared baseline noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandCorrelation {
    pub name: String,
    /// 1.0 = pure terrain signal, 0.0 = pure baseline noise.
    pub weight: f64,
}

impl BandCorrelation {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Parameters for deriving the band cube from a terrain field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Output bands in output order.
    pub band_correlations: Vec<BandCorrelation>,
    /// Standard deviation of the shared baseline noise.
    pub spectral_noise: f64,
    /// Multiplicative sensor gain applied after blending.
    pub sensor_gain: f64,
    /// Quantize to `2^bits` levels per unit; 0 disables quantization.
    pub quantization_bits: u32,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            band_correlations: vec![
                BandCorrelation::new("red", 1.0),
                BandCorrelation::new("green", 0.8),
                BandCorrelation::new("blue", 0.6),
                BandCorrelation::new("nir", 0.4),
            ],
            spectral_noise: 0.1,
            sensor_gain: 1.0,
            quantization_bits: 12,
        }
    }
}

impl SpectralConfig {
    /// Default noise, gain and quantization with the given `(name, weight)` bands.
    pub fn with_bands(bands: &[(&str, f64)]) -> Self {
        Self {
            band_correlations: bands
                .iter()
                .map(|&(name, weight)| BandCorrelation::new(name, weight))
                .collect(),
            ..Default::default()
        }
    }

    /// Band names in output order.
    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.band_correlations.iter().map(|b| b.name.as_str())
    }

    pub fn band_count(&self) -> usize {
        self.band_correlations.len()
    }

    /// Number of quantization levels per unit, if quantization is enabled.
    pub fn quantization_steps(&self) -> Option<f64> {
        match self.quantization_bits {
            0 => None,
            bits => Some((1u32 << bits) as f64),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.band_correlations.is_empty() {
            return Err(ConfigError::NoBands);
        }

        let mut seen = HashSet::new();
        for band in &self.band_correlations {
            if band.name.trim().is_empty() {
                return Err(ConfigError::EmptyBandName);
            }
            if !seen.insert(band.name.as_str()) {
                return Err(ConfigError::DuplicateBand(band.name.clone()));
            }
            if !(0.0..=1.0).contains(&band.weight) {
                return Err(ConfigError::InvalidBandWeight {
                    band: band.name.clone(),
                    weight: band.weight,
                });
            }
        }

        ensure_non_negative("spectral_noise", self.spectral_noise)?;
        ensure_positive("sensor_gain", self.sensor_gain)?;

        if self.quantization_bits > MAX_QUANTIZATION_BITS {
            return Err(ConfigError::InvalidQuantizationBits(self.quantization_bits));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bands() {
        let config = SpectralConfig::default();
        let names: Vec<&str> = config.band_names().collect();
        assert_eq!(names, vec!["red", "green", "blue", "nir"]);
        assert_eq!(config.quantization_steps(), Some(4096.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quantization_disabled() {
        let config = SpectralConfig {
            quantization_bits: 0,
            ..Default::default()
        };
        assert_eq!(config.quantization_steps(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_band_list() {
        let config = SpectralConfig::with_bands(&[]);
        assert_eq!(config.validate(), Err(ConfigError::NoBands));
    }

    #[test]
    fn test_rejects_duplicate_and_blank_names() {
        let config = SpectralConfig::with_bands(&[("red", 1.0), ("red", 0.5)]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateBand("red".to_string()))
        );

        let config = SpectralConfig::with_bands(&[(" ", 1.0)]);
        assert_eq!(config.validate(), Err(ConfigError::EmptyBandName));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let config = SpectralConfig::with_bands(&[("nir", 1.5)]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBandWeight { .. })
        ));

        let config = SpectralConfig {
            quantization_bits: 17,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidQuantizationBits(17))
        );

        let config = SpectralConfig {
            sensor_gain: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { name: "sensor_gain", .. })
        ));

        let config = SpectralConfig {
            spectral_noise: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative { name: "spectral_noise", .. })
        ));
    }
}
