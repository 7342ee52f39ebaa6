//! Procedural multi-band satellite scene synthesis.
//!
//! This crate generates artificial multispectral raster scenes for test and
//! training data: a fractal terrain field drives per-band reflectance with
//! controllable cross-band correlation, procedural clouds, haze and shadows
//! are composited on top, and the result is written as a tiled,
//! georeferenced float32 GeoTIFF.
//!
//! Every stage is a pure function of its inputs, configuration and seed, so
//! the same parameters always produce bit-identical scenes.
//!
//! ```no_run
//! use std::path::Path;
//! use synthscene::{GeneratorSettings, SceneGenerator};
//! use synthscene::{AtmosphericConfig, SpectralConfig, TerrainConfig};
//!
//! let generator = SceneGenerator::new(GeneratorSettings::with_shape(512, 512))?;
//! let report = generator.generate_scene(
//!     Path::new("scene.tif"),
//!     &TerrainConfig::default(),
//!     &AtmosphericConfig::default(),
//!     &SpectralConfig::default(),
//!     42,
//! )?;
//! println!("wrote {} bands", report.metadata.band_count);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod atmosphere;
pub mod config;
pub mod export;
pub mod filter;
pub mod noise;
pub mod pipeline;
pub mod spectral;
pub mod terrain;

pub use atmosphere::{composite, dark_object_subtraction, AtmosphericConfig, AtmosphericMasks};
pub use config::{ConfigError, GeneratorSettings, SceneConfig};
pub use export::{
    read_geotiff, write_geotiff, Crs, GeoTransform, RasterMetadata, RasterOptions, StorageError,
};
pub use noise::FractalNoiseConfig;
pub use pipeline::{generate_batch, SceneError, SceneGenerator, SceneReport, SceneRequest, StageId};
pub use spectral::{synthesize_bands, BandCorrelation, BandCube, SpectralConfig};
pub use terrain::{generate_terrain, Grid, TerrainConfig};
