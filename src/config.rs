//! Scene-level configuration: validation errors, generator settings, and the
//! TOML-loadable bundle of every stage's parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atmosphere::AtmosphericConfig;
use crate::export::RasterOptions;
use crate::pipeline::{SceneError, SceneGenerator, SceneReport};
use crate::spectral::SpectralConfig;
use crate::terrain::TerrainConfig;

/// Invalid parameter values, detected before any generation work starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("octaves must be at least 1 (got {0})")]
    InvalidOctaves(u32),
    #[error("{name} must be finite and > 0 (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be finite and >= 0 (got {value})")]
    Negative { name: &'static str, value: f64 },
    #[error("{name} must be finite (got {value})")]
    NonFinite { name: &'static str, value: f64 },
    #[error("{name} must lie in [0, 1] (got {value})")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("quantization_bits must be 0 (disabled) or in [1, 16] (got {0})")]
    InvalidQuantizationBits(u32),
    #[error("band_correlations must contain at least one band")]
    NoBands,
    #[error("band names must be non-empty")]
    EmptyBandName,
    #[error("duplicate band name '{0}'")]
    DuplicateBand(String),
    #[error("weight for band '{band}' must lie in [0, 1] (got {weight})")]
    InvalidBandWeight { band: String, weight: f64 },
    #[error("scene shape must be at least 1x1 (got {height}x{width})")]
    EmptyShape { height: usize, width: usize },
    #[error("raster block size must be a positive multiple of 16 (got {0})")]
    InvalidBlockSize(u32),
    #[error("deflate compression level must be in [0, 9] (got {0})")]
    InvalidCompressionLevel(u32),
    #[error("invalid CRS '{0}': expected EPSG:<code>")]
    InvalidCrs(String),
    #[error("percentile must lie in [0, 100] (got {0})")]
    InvalidPercentile(f64),
    #[error("failed to read config file: {0}")]
    Read(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

pub(crate) fn ensure_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

/// Scene geometry and output options shared by every scene a generator makes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Raster height in pixels.
    pub height: usize,
    /// Raster width in pixels.
    pub width: usize,
    /// Ground sample distance in metres per pixel.
    pub resolution_m: f64,
    /// GeoTIFF layout and georeferencing.
    pub raster: RasterOptions,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            height: 1024,
            width: 1024,
            resolution_m: 10.0,
            raster: RasterOptions::default(),
        }
    }
}

impl GeneratorSettings {
    /// Settings for a `height x width` scene with every other field defaulted.
    pub fn with_shape(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.height == 0 || self.width == 0 {
            return Err(ConfigError::EmptyShape {
                height: self.height,
                width: self.width,
            });
        }
        ensure_positive("resolution_m", self.resolution_m)?;
        self.raster.validate()
    }
}

/// Everything needed to produce one scene, loadable from TOML.
///
/// ```toml
/// seed = 7
///
/// [generator]
/// height = 512
/// width = 512
///
/// [terrain]
/// octaves = 4
///
/// [[spectral.band_correlations]]
/// name = "red"
/// weight = 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub seed: u64,
    pub generator: GeneratorSettings,
    pub terrain: TerrainConfig,
    pub atmosphere: AtmosphericConfig,
    pub spectral: SpectralConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            generator: GeneratorSettings::default(),
            terrain: TerrainConfig::default(),
            atmosphere: AtmosphericConfig::default(),
            spectral: SpectralConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generator.validate()?;
        self.terrain.validate()?;
        self.atmosphere.validate()?;
        self.spectral.validate()
    }

    /// Builds a generator from the `[generator]` table.
    pub fn generator(&self) -> Result<SceneGenerator, ConfigError> {
        SceneGenerator::new(self.generator.clone())
    }

    /// Generates the configured scene and writes it to `output_path`.
    pub fn generate(&self, output_path: &Path) -> Result<SceneReport, SceneError> {
        self.generator()?.generate_scene(
            output_path,
            &self.terrain,
            &self.atmosphere,
            &self.spectral,
            self.seed,
        )
    }
}
