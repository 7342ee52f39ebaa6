//! Procedural atmosphere: clouds, haze and cloud shadows composited onto a
//! band cube, plus a dark-object subtraction correction.
//!
//! This is a statistical approximation; no radiative transfer is modelled.

mod composite;
mod config;
mod correction;
mod masks;

pub use composite::{apply_masks, composite};
pub use config::AtmosphericConfig;
pub use correction::{dark_object_subtraction, percentile, DEFAULT_DARK_PERCENTILE};
pub use masks::{
    cloud_mask, generate_masks, haze_mask, shadow_mask, AtmosphericMasks, CLOUD_EDGE_SIGMA,
    CLOUD_OCTAVES, CLOUD_PERSISTENCE, HAZE_OCTAVES, HAZE_PERSISTENCE, SHADOW_SIGMA,
};
