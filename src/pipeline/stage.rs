//! Stage identifiers for scene generation.

/// Unique identifier for generation stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Fractal terrain field.
    Terrain,
    /// Per-band reflectance synthesis.
    Spectral,
    /// Cloud, haze and shadow compositing.
    Atmosphere,
    /// GeoTIFF output.
    Raster,
}

impl StageId {
    /// Every stage of a full scene run.
    pub const ALL: [StageId; 4] = [
        StageId::Terrain,
        StageId::Spectral,
        StageId::Atmosphere,
        StageId::Raster,
    ];

    /// Returns the name of the stage.
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Terrain => "terrain",
            StageId::Spectral => "spectral",
            StageId::Atmosphere => "atmosphere",
            StageId::Raster => "raster",
        }
    }

    /// Position of the stage within [`StageId::ALL`].
    pub fn index(&self) -> usize {
        match self {
            StageId::Terrain => 0,
            StageId::Spectral => 1,
            StageId::Atmosphere => 2,
            StageId::Raster => 3,
        }
    }
}
