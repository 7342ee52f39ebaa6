//! Scene generator: runs every stage for one scene and writes the result.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::stage::StageId;
use crate::atmosphere::{composite, AtmosphericConfig};
use crate::config::{ConfigError, GeneratorSettings};
use crate::export::{write_geotiff, RasterMetadata, StorageError};
use crate::spectral::{synthesize_bands, BandCube, SpectralConfig};
use crate::terrain::{generate_terrain, TerrainConfig};

/// Errors that can occur while generating a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// What was written, and the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneReport {
    pub metadata: RasterMetadata,
    pub terrain: TerrainConfig,
    pub atmosphere: AtmosphericConfig,
    pub spectral: SpectralConfig,
    pub seed: u64,
}

/// One entry of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRequest {
    pub output_path: PathBuf,
    pub terrain: TerrainConfig,
    pub atmosphere: AtmosphericConfig,
    pub spectral: SpectralConfig,
    pub seed: u64,
}

impl SceneRequest {
    /// Request with default stage parameters.
    pub fn new(output_path: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            output_path: output_path.into(),
            terrain: TerrainConfig::default(),
            atmosphere: AtmosphericConfig::default(),
            spectral: SpectralConfig::default(),
            seed,
        }
    }
}

/// Produces synthetic scenes of a fixed shape and resolution.
///
/// Holds no mutable state; one generator can serve many scenes concurrently.
#[derive(Debug, Clone)]
pub struct SceneGenerator {
    settings: GeneratorSettings,
}

impl SceneGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    fn validate(
        terrain: &TerrainConfig,
        atmosphere: &AtmosphericConfig,
        spectral: &SpectralConfig,
    ) -> Result<(), ConfigError> {
        terrain.validate()?;
        spectral.validate()?;
        atmosphere.validate()
    }

    /// Terrain, spectral and atmosphere stages, reporting each to the callbacks.
    fn synthesize_stages<F1, F2>(
        &self,
        terrain: &TerrainConfig,
        atmosphere: &AtmosphericConfig,
        spectral: &SpectralConfig,
        seed: u64,
        on_stage_start: &mut F1,
        on_stage_complete: &mut F2,
    ) -> Result<BandCube, ConfigError>
    where
        F1: FnMut(&str, usize, usize),
        F2: FnMut(&str, usize, usize),
    {
        let (height, width) = (self.settings.height, self.settings.width);
        let total = StageId::ALL.len();

        on_stage_start(StageId::Terrain.name(), StageId::Terrain.index(), total);
        let started = Instant::now();
        let field = generate_terrain(height, width, terrain, seed)?;
        log_stage(StageId::Terrain, height, width, seed, started);
        on_stage_complete(StageId::Terrain.name(), StageId::Terrain.index(), total);

        on_stage_start(StageId::Spectral.name(), StageId::Spectral.index(), total);
        let started = Instant::now();
        let cube = synthesize_bands(&field, spectral, seed)?;
        drop(field);
        log_stage(StageId::Spectral, height, width, seed, started);
        on_stage_complete(StageId::Spectral.name(), StageId::Spectral.index(), total);

        on_stage_start(StageId::Atmosphere.name(), StageId::Atmosphere.index(), total);
        let started = Instant::now();
        let cube = composite(cube, atmosphere, seed)?;
        log_stage(StageId::Atmosphere, height, width, seed, started);
        on_stage_complete(StageId::Atmosphere.name(), StageId::Atmosphere.index(), total);

        Ok(cube)
    }

    /// Runs terrain, spectral and atmosphere stages and returns the cube.
    ///
    /// A pure function of the arguments and the generator's shape.
    pub fn synthesize(
        &self,
        terrain: &TerrainConfig,
        atmosphere: &AtmosphericConfig,
        spectral: &SpectralConfig,
        seed: u64,
    ) -> Result<BandCube, ConfigError> {
        Self::validate(terrain, atmosphere, spectral)?;
        let mut on_start = |_: &str, _: usize, _: usize| {};
        let mut on_complete = |_: &str, _: usize, _: usize| {};
        self.synthesize_stages(
            terrain,
            atmosphere,
            spectral,
            seed,
            &mut on_start,
            &mut on_complete,
        )
    }

    /// Generates one scene and writes it to `output_path` as a GeoTIFF.
    ///
    /// All parameters are validated before any work starts, so a
    /// configuration error never leaves a file behind.
    pub fn generate_scene(
        &self,
        output_path: &Path,
        terrain: &TerrainConfig,
        atmosphere: &AtmosphericConfig,
        spectral: &SpectralConfig,
        seed: u64,
    ) -> Result<SceneReport, SceneError> {
        self.generate_scene_with_callbacks(
            output_path,
            terrain,
            atmosphere,
            spectral,
            seed,
            |_, _, _| {},
            |_, _, _| {},
        )
    }

    /// Like [`generate_scene`](Self::generate_scene), reporting progress.
    ///
    /// Both callbacks receive `(stage name, stage index, stage count)`.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_scene_with_callbacks<F1, F2>(
        &self,
        output_path: &Path,
        terrain: &TerrainConfig,
        atmosphere: &AtmosphericConfig,
        spectral: &SpectralConfig,
        seed: u64,
        mut on_stage_start: F1,
        mut on_stage_complete: F2,
    ) -> Result<SceneReport, SceneError>
    where
        F1: FnMut(&str, usize, usize),
        F2: FnMut(&str, usize, usize),
    {
        Self::validate(terrain, atmosphere, spectral)?;
        let started = Instant::now();
        let total = StageId::ALL.len();

        let cube = self.synthesize_stages(
            terrain,
            atmosphere,
            spectral,
            seed,
            &mut on_stage_start,
            &mut on_stage_complete,
        )?;

        on_stage_start(StageId::Raster.name(), StageId::Raster.index(), total);
        let raster_started = Instant::now();
        let metadata = write_geotiff(
            &cube,
            self.settings.resolution_m,
            output_path,
            &self.settings.raster,
        )?;
        log_stage(StageId::Raster, cube.height(), cube.width(), seed, raster_started);
        on_stage_complete(StageId::Raster.name(), StageId::Raster.index(), total);

        info!(
            path = %output_path.display(),
            bands = metadata.band_count,
            seed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scene generated"
        );

        Ok(SceneReport {
            metadata,
            terrain: terrain.clone(),
            atmosphere: atmosphere.clone(),
            spectral: spectral.clone(),
            seed,
        })
    }
}

fn log_stage(stage: StageId, height: usize, width: usize, seed: u64, started: Instant) {
    debug!(
        stage = stage.name(),
        height,
        width,
        seed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "stage complete"
    );
}

/// Generates independent scenes in parallel.
///
/// Results are returned in request order; one failing scene does not stop
/// the others.
pub fn generate_batch(
    generator: &SceneGenerator,
    requests: &[SceneRequest],
) -> Vec<Result<SceneReport, SceneError>> {
    debug!(scenes = requests.len(), "starting batch");
    requests
        .par_iter()
        .map(|request| {
            generator.generate_scene(
                &request.output_path,
                &request.terrain,
                &request.atmosphere,
                &request.spectral,
                request.seed,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::read_geotiff;
    use tempfile::tempdir;

    fn small_generator() -> SceneGenerator {
        SceneGenerator::new(GeneratorSettings::with_shape(64, 64)).unwrap()
    }

    fn red_nir() -> SpectralConfig {
        SpectralConfig::with_bands(&[("red", 1.0), ("nir", 0.3)])
    }

    fn two_octaves() -> TerrainConfig {
        TerrainConfig {
            octaves: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_generator_rejects_invalid_settings() {
        let err = SceneGenerator::new(GeneratorSettings::with_shape(0, 8)).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyShape { .. }));
    }

    #[test]
    fn test_synthesize_small_scene() {
        let cube = small_generator()
            .synthesize(&two_octaves(), &AtmosphericConfig::default(), &red_nir(), 7)
            .unwrap();

        assert_eq!(cube.shape(), (2, 64, 64));
        assert_eq!(cube.band_names(), &["red".to_string(), "nir".to_string()]);
        assert!(cube.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let generator = small_generator();
        let run = |seed| {
            generator
                .synthesize(&two_octaves(), &AtmosphericConfig::default(), &red_nir(), seed)
                .unwrap()
        };
        assert_eq!(run(11), run(11));
        assert_ne!(run(11).data(), run(12).data());
    }

    #[test]
    fn test_generate_scene_writes_readable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.tif");
        let generator = small_generator();

        let report = generator
            .generate_scene(&path, &two_octaves(), &AtmosphericConfig::default(), &red_nir(), 7)
            .unwrap();
        assert_eq!(report.seed, 7);
        assert_eq!(report.metadata.band_names, vec!["red", "nir"]);
        assert_eq!(report.metadata.tags["NUM_BANDS"], "2");
        assert_eq!(report.metadata.transform.pixel_width, 10.0);

        let expected = generator
            .synthesize(&two_octaves(), &AtmosphericConfig::default(), &red_nir(), 7)
            .unwrap();
        let (read, metadata) = read_geotiff(&path).unwrap();
        assert_eq!(metadata, report.metadata);
        for (a, b) in read.data().iter().zip(expected.data().iter()) {
            assert!((a - b).abs() <= 1e-5);
        }
    }

    #[test]
    fn test_config_error_creates_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/scene.tif");
        let spectral = SpectralConfig {
            quantization_bits: 20,
            ..Default::default()
        };

        let err = small_generator()
            .generate_scene(&path, &two_octaves(), &AtmosphericConfig::default(), &spectral, 1)
            .unwrap_err();
        assert!(matches!(
            err,
            SceneError::Configuration(ConfigError::InvalidQuantizationBits(20))
        ));
        assert!(!path.exists());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_callbacks_report_every_stage_in_order() {
        let dir = tempdir().unwrap();
        let mut started = Vec::new();
        let mut completed = Vec::new();

        SceneGenerator::new(GeneratorSettings::with_shape(16, 16))
            .unwrap()
            .generate_scene_with_callbacks(
                &dir.path().join("scene.tif"),
                &two_octaves(),
                &AtmosphericConfig::clear(),
                &SpectralConfig::default(),
                3,
                |name, i, total| started.push((name.to_string(), i, total)),
                |name, i, total| completed.push((name.to_string(), i, total)),
            )
            .unwrap();

        let expected: Vec<(String, usize, usize)> = StageId::ALL
            .iter()
            .map(|s| (s.name().to_string(), s.index(), 4))
            .collect();
        assert_eq!(started, expected);
        assert_eq!(completed, expected);
    }

    #[test]
    fn test_batch_matches_individual_scenes() {
        let dir = tempdir().unwrap();
        let generator = SceneGenerator::new(GeneratorSettings::with_shape(32, 32)).unwrap();
        let requests: Vec<SceneRequest> = (0..3)
            .map(|i| SceneRequest {
                terrain: two_octaves(),
                spectral: red_nir(),
                ..SceneRequest::new(dir.path().join(format!("batch_{i}.tif")), 100 + i)
            })
            .collect();

        let results = generate_batch(&generator, &requests);
        assert_eq!(results.len(), 3);

        for (request, result) in requests.iter().zip(&results) {
            let report = result.as_ref().unwrap();
            assert_eq!(report.seed, request.seed);
            assert_eq!(report.metadata.path, request.output_path);

            let (batch_cube, _) = read_geotiff(&request.output_path).unwrap();
            let single = generator
                .synthesize(&request.terrain, &request.atmosphere, &request.spectral, request.seed)
                .unwrap();
            assert_eq!(batch_cube.data(), single.data());
        }
    }

    #[test]
    fn test_batch_failure_is_isolated() {
        let dir = tempdir().unwrap();
        let generator = SceneGenerator::new(GeneratorSettings::with_shape(16, 16)).unwrap();
        let mut bad = SceneRequest::new(dir.path().join("bad.tif"), 1);
        bad.terrain.octaves = 0;
        let requests = vec![SceneRequest::new(dir.path().join("good.tif"), 1), bad];

        let results = generate_batch(&generator, &requests);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SceneError::Configuration(ConfigError::InvalidOctaves(0)))
        ));
        assert!(!dir.path().join("bad.tif").exists());
    }
}
