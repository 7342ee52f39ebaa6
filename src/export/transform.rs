//! Georeferencing: affine pixel-to-map transform and coordinate reference system.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// GDAL-ordered affine transform.
///
/// Maps pixel `(col, row)` to map coordinates:
/// `x = origin_x + col * pixel_width + row * row_rotation`,
/// `y = origin_y + col * col_rotation + row * pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with the upper-left corner at `(west, north)`.
    pub fn from_origin(west: f64, north: f64, x_size: f64, y_size: f64) -> Self {
        Self {
            origin_x: west,
            pixel_width: x_size,
            row_rotation: 0.0,
            origin_y: north,
            col_rotation: 0.0,
            pixel_height: -y_size,
        }
    }

    /// Coefficients in GDAL order `[x0, dx, rx, y0, ry, dy]`.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    pub fn from_gdal(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    /// Map coordinates of a (possibly fractional) pixel position.
    pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// `(min_x, min_y, max_x, max_y)` covered by a `height x width` raster.
    pub fn bounds(&self, height: usize, width: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_map(0.0, 0.0),
            self.pixel_to_map(width as f64, 0.0),
            self.pixel_to_map(0.0, height as f64),
            self.pixel_to_map(width as f64, height as f64),
        ];
        corners.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

/// Coordinate reference system identified by EPSG code, written `EPSG:<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    pub epsg: u16,
}

impl Crs {
    pub const WGS84: Crs = Crs { epsg: 4326 };

    pub fn epsg(code: u16) -> Self {
        Self { epsg: code }
    }

    /// Geographic (lat/lon) systems occupy the EPSG 4000-4999 block.
    pub fn is_geographic(&self) -> bool {
        (4000..5000).contains(&self.epsg)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s
            .trim()
            .strip_prefix("EPSG:")
            .or_else(|| s.trim().strip_prefix("epsg:"))
            .and_then(|code| code.parse::<u16>().ok())
            .filter(|&code| code > 0)
            .ok_or_else(|| ConfigError::InvalidCrs(s.to_string()))?;
        Ok(Self { epsg: code })
    }
}

impl TryFrom<String> for Crs {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}
