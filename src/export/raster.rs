//! Raster layout options, write results and storage errors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::transform::{Crs, GeoTransform};
use crate::config::ConfigError;

/// Sample type written for every band.
pub const DTYPE: &str = "float32";
/// Compression codec written for every tile.
pub const COMPRESSION: &str = "deflate";

pub const TAG_DATETIME: &str = "TIFFTAG_DATETIME";
pub const TAG_SYNTHETIC: &str = "SYNTHETIC_DATA";
pub const TAG_RESOLUTION: &str = "RESOLUTION";
pub const TAG_NUM_BANDS: &str = "NUM_BANDS";

/// Failure kinds when reading or writing raster files.
#[derive(Error, Debug)]
pub enum StorageErrorKind {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("raster exceeds the 4 GiB classic TIFF limit")]
    TooLarge,
    #[error("Invalid raster: {0}")]
    Format(String),
}

/// A storage failure tied to the file it concerns.
#[derive(Error, Debug)]
#[error("failed to access '{}': {kind}", .path.display())]
pub struct StorageError {
    pub path: PathBuf,
    #[source]
    pub kind: StorageErrorKind,
}

impl StorageError {
    pub fn new(path: &Path, kind: impl Into<StorageErrorKind>) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: kind.into(),
        }
    }

    pub(crate) fn format(path: &Path, message: impl Into<String>) -> Self {
        Self::new(path, StorageErrorKind::Format(message.into()))
    }
}

/// GeoTIFF layout and georeferencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Map x of the upper-left corner.
    pub origin_x: f64,
    /// Map y of the upper-left corner.
    pub origin_y: f64,
    pub crs: Crs,
    /// Tile edge in pixels; a positive multiple of 16.
    pub block_size: u32,
    /// Deflate level, 0 (store) to 9 (smallest).
    pub compression_level: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            crs: Crs::WGS84,
            block_size: 256,
            compression_level: 6,
        }
    }
}

impl RasterOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 || self.block_size % 16 != 0 {
            return Err(ConfigError::InvalidBlockSize(self.block_size));
        }
        if self.compression_level > 9 {
            return Err(ConfigError::InvalidCompressionLevel(self.compression_level));
        }
        for (name, value) in [("origin_x", self.origin_x), ("origin_y", self.origin_y)] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        Ok(())
    }

    pub fn transform(&self, resolution: f64) -> GeoTransform {
        GeoTransform::from_origin(self.origin_x, self.origin_y, resolution, resolution)
    }
}

/// Description of a raster file as written (or read back).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pub path: PathBuf,
    pub height: usize,
    pub width: usize,
    pub band_count: usize,
    pub band_names: Vec<String>,
    pub dtype: String,
    pub crs: Crs,
    pub transform: GeoTransform,
    pub block_size: u32,
    pub compression: String,
    /// Dataset-level metadata items.
    pub tags: BTreeMap<String, String>,
}

impl RasterMetadata {
    /// Ground sample distance along x, in CRS units per pixel.
    pub fn resolution(&self) -> f64 {
        self.transform.pixel_width
    }
}

/// Dataset tags attached to every synthetic scene.
pub(crate) fn scene_tags(
    timestamp: &str,
    resolution: f64,
    band_count: usize,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TAG_DATETIME.to_string(), timestamp.to_string()),
        (TAG_SYNTHETIC.to_string(), "True".to_string()),
        (TAG_RESOLUTION.to_string(), resolution.to_string()),
        (TAG_NUM_BANDS.to_string(), band_count.to_string()),
    ])
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Serializes tags and band descriptions as a GDAL metadata document.
pub(crate) fn gdal_metadata_xml(tags: &BTreeMap<String, String>, band_names: &[String]) -> String {
    let mut xml = String::from("<GDALMetadata>\n");
    for (name, value) in tags {
        xml.push_str(&format!(
            "  <Item name=\"{}\">{}</Item>\n",
            escape_xml(name),
            escape_xml(value)
        ));
    }
    for (sample, name) in band_names.iter().enumerate() {
        xml.push_str(&format!(
            "  <Item name=\"DESCRIPTION\" sample=\"{}\" role=\"description\">{}</Item>\n",
            sample,
            escape_xml(name)
        ));
    }
    xml.push_str("</GDALMetadata>");
    xml
}

fn attribute<'a>(element: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("{name}=\"");
    let start = element.find(&key)? + key.len();
    let len = element[start..].find('"')?;
    Some(&element[start..start + len])
}

/// Parsed GDAL metadata: dataset tags plus per-sample descriptions.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct GdalMetadata {
    pub tags: BTreeMap<String, String>,
    pub descriptions: BTreeMap<usize, String>,
}

pub(crate) fn parse_gdal_metadata(xml: &str) -> GdalMetadata {
    let mut parsed = GdalMetadata::default();
    let mut rest = xml;

    while let Some(open) = rest.find("<Item") {
        rest = &rest[open..];
        let Some(head_end) = rest.find('>') else { break };
        let head = &rest[..head_end];
        let body = &rest[head_end + 1..];
        let Some(close) = body.find("</Item>") else { break };
        let value = unescape_xml(&body[..close]);

        if let Some(name) = attribute(head, "name") {
            match attribute(head, "sample").and_then(|s| s.parse::<usize>().ok()) {
                Some(sample) if attribute(head, "role") == Some("description") => {
                    parsed.descriptions.insert(sample, value);
                }
                Some(_) => {}
                None => {
                    parsed.tags.insert(unescape_xml(name), value);
                }
            }
        }
        rest = &body[close + "</Item>".len()..];
    }

    parsed
}
