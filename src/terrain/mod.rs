//! Terrain generation module.
//!
//! Produces the normalized scalar field that drives band reflectance.

mod config;
mod grid;
mod heightmap;

pub use config::TerrainConfig;
pub use grid::{nonzero_fraction, normalize, value_range, Grid};
pub use heightmap::generate_terrain;
