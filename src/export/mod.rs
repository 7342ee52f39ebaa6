//! Export module for writing band cubes to disk.
//!
//! The primary product is a tiled float32 GeoTIFF; PNG quick-looks are
//! provided for visual inspection.

mod geotiff;
mod preview;
mod raster;
mod reader;
mod transform;

pub use geotiff::{save, write_geotiff};
pub use preview::{export_band_png, export_preview_png};
pub use reader::read_geotiff;
pub use raster::{
    RasterMetadata, RasterOptions, StorageError, StorageErrorKind, COMPRESSION, DTYPE,
    TAG_DATETIME, TAG_NUM_BANDS, TAG_RESOLUTION, TAG_SYNTHETIC,
};
pub use transform::{Crs, GeoTransform};
