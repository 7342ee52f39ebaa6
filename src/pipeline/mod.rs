//! Pipeline module for orchestrating scene generation stages.
//!
//! A [`SceneGenerator`] runs Terrain -> Spectral -> Atmosphere -> Raster for
//! one scene; [`generate_batch`] runs independent scenes in parallel.

mod generator;
mod stage;

pub use generator::{generate_batch, SceneError, SceneGenerator, SceneReport, SceneRequest};
pub use stage::StageId;
