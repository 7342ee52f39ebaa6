//! Tiled, deflate-compressed float32 GeoTIFF output.
//!
//! Files are chunky (band-interleaved by pixel), tiled in square blocks,
//! georeferenced with ModelPixelScale/ModelTiepoint/GeoKeyDirectory and carry
//! their dataset tags and band descriptions in the GDAL metadata tag, so GIS
//! tools see band names and provenance without sidecar files.

use std::fs;
use std::io::{Seek, Write};
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;
use tempfile::NamedTempFile;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::{debug, info, warn};

use super::raster::{
    gdal_metadata_xml, scene_tags, RasterMetadata, RasterOptions, StorageError,
    StorageErrorKind, COMPRESSION, DTYPE,
};
use super::transform::Crs;
use crate::spectral::BandCube;

pub(super) const MODEL_PIXEL_SCALE: u16 = 33550;
pub(super) const MODEL_TIEPOINT: u16 = 33922;
pub(super) const GEO_KEY_DIRECTORY: u16 = 34735;
pub(super) const GDAL_METADATA: u16 = 42112;

pub(super) const COMPRESSION_NONE: u16 = 1;
pub(super) const COMPRESSION_DEFLATE: u16 = 8;
pub(super) const COMPRESSION_ADOBE_DEFLATE: u16 = 32946;
const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
const PLANAR_CHUNKY: u16 = 1;
const SAMPLE_FORMAT_IEEE_FP: u16 = 3;
const EXTRA_SAMPLE_UNSPECIFIED: u16 = 0;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

pub(super) fn geotag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// GeoKey directory: header, then `(key, location, count, value)` entries
/// sorted by key.
#[rustfmt::skip]
fn geo_key_directory(crs: Crs) -> Vec<u16> {
    let (model_type, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
    };
    vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE, 0, 1, model_type,
        GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, crs.epsg,
    ]
}

pub(super) fn crs_from_geo_keys(keys: &[u16]) -> Option<Crs> {
    keys.get(4..)?
        .chunks_exact(4)
        .find(|entry| entry[0] == GEOGRAPHIC_TYPE || entry[0] == PROJECTED_CS_TYPE)
        .map(|entry| Crs::epsg(entry[3]))
}

/// Compresses one `block x block` tile, zero-padding past the raster edge.
fn encode_tile(
    cube: &BandCube,
    tile_row: usize,
    tile_col: usize,
    block: usize,
    level: u32,
) -> Result<Vec<u8>, StorageErrorKind> {
    let data = cube.data();
    let (bands, height, width) = cube.shape();
    let mut raw = Vec::with_capacity(block * block * bands * 4);

    for r in 0..block {
        let row = tile_row * block + r;
        for c in 0..block {
            let col = tile_col * block + c;
            for b in 0..bands {
                let value = if row < height && col < width {
                    data[[b, row, col]]
                } else {
                    0.0
                };
                raw.extend_from_slice(&value.to_ne_bytes());
            }
        }
    }

    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(raw.len() / 2),
        Compression::new(level),
    );
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// Encodes `cube` into `writer` as a single-image tiled TIFF, tagging it with
/// `metadata`.
pub(super) fn encode_geotiff<W: Write + Seek>(
    writer: W,
    cube: &BandCube,
    metadata: &RasterMetadata,
    timestamp: &DateTime<Utc>,
    compression_level: u32,
) -> Result<(), StorageErrorKind> {
    let block = metadata.block_size as usize;
    let tiles_across = cube.width().div_ceil(block);
    let tiles_down = cube.height().div_ceil(block);
    let bands = cube.band_count();

    let tiles = (0..tiles_across * tiles_down)
        .into_par_iter()
        .map(|index| {
            let (tile_row, tile_col) = (index / tiles_across, index % tiles_across);
            encode_tile(cube, tile_row, tile_col, block, compression_level)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut encoder = TiffEncoder::new(writer)?;
    let mut dir = encoder.new_directory()?;

    let mut offsets = Vec::with_capacity(tiles.len());
    let mut byte_counts = Vec::with_capacity(tiles.len());
    for tile in &tiles {
        let offset = dir.write_data(tile.as_slice())?;
        offsets.push(u32::try_from(offset).map_err(|_| StorageErrorKind::TooLarge)?);
        byte_counts.push(u32::try_from(tile.len()).map_err(|_| StorageErrorKind::TooLarge)?);
    }

    let width = u32::try_from(cube.width()).map_err(|_| StorageErrorKind::TooLarge)?;
    let height = u32::try_from(cube.height()).map_err(|_| StorageErrorKind::TooLarge)?;
    let samples = u16::try_from(bands).map_err(|_| {
        StorageErrorKind::Format(format!("{bands} bands exceed the TIFF sample limit"))
    })?;
    let transform = &metadata.transform;

    dir.write_tag(Tag::ImageWidth, width)?;
    dir.write_tag(Tag::ImageLength, height)?;
    dir.write_tag(Tag::BitsPerSample, &vec![32u16; bands][..])?;
    dir.write_tag(Tag::Compression, COMPRESSION_DEFLATE)?;
    dir.write_tag(Tag::PhotometricInterpretation, PHOTOMETRIC_MIN_IS_BLACK)?;
    dir.write_tag(Tag::ImageDescription, "synthetic multispectral scene")?;
    dir.write_tag(Tag::SamplesPerPixel, samples)?;
    dir.write_tag(Tag::PlanarConfiguration, PLANAR_CHUNKY)?;
    dir.write_tag(
        Tag::Software,
        concat!("synthscene ", env!("CARGO_PKG_VERSION")),
    )?;
    dir.write_tag(
        Tag::DateTime,
        timestamp.format("%Y:%m:%d %H:%M:%S").to_string().as_str(),
    )?;
    dir.write_tag(Tag::TileWidth, metadata.block_size)?;
    dir.write_tag(Tag::TileLength, metadata.block_size)?;
    dir.write_tag(Tag::TileOffsets, &offsets[..])?;
    dir.write_tag(Tag::TileByteCounts, &byte_counts[..])?;
    if bands > 1 {
        dir.write_tag(Tag::ExtraSamples, &vec![EXTRA_SAMPLE_UNSPECIFIED; bands - 1][..])?;
    }
    dir.write_tag(Tag::SampleFormat, &vec![SAMPLE_FORMAT_IEEE_FP; bands][..])?;
    dir.write_tag(
        geotag(MODEL_PIXEL_SCALE),
        &[transform.pixel_width, -transform.pixel_height, 0.0][..],
    )?;
    dir.write_tag(
        geotag(MODEL_TIEPOINT),
        &[0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0][..],
    )?;
    dir.write_tag(geotag(GEO_KEY_DIRECTORY), &geo_key_directory(metadata.crs)[..])?;
    dir.write_tag(
        geotag(GDAL_METADATA),
        gdal_metadata_xml(&metadata.tags, &metadata.band_names).as_str(),
    )?;
    dir.finish()?;

    Ok(())
}

/// Removes a staging file, logging rather than failing if that is impossible.
fn discard(staging: NamedTempFile) {
    let staging_path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!(path = %staging_path.display(), error = %e, "failed to remove staging file");
    }
}

/// Writes `cube` as a tiled float32 GeoTIFF at `path`.
///
/// The file is staged next to `path` and renamed into place once complete, so
/// a failed write never leaves a partial raster behind. Parent directories
/// are created as needed. `resolution` is the pixel size in CRS units.
///
/// # Panics
/// Panics if `resolution` is not finite and positive.
pub fn write_geotiff(
    cube: &BandCube,
    resolution: f64,
    path: &Path,
    options: &RasterOptions,
) -> Result<RasterMetadata, StorageError> {
    assert!(
        resolution.is_finite() && resolution > 0.0,
        "resolution must be positive, got {resolution}"
    );
    options
        .validate()
        .map_err(|e| StorageError::format(path, e.to_string()))?;

    let started = Instant::now();
    let now = Utc::now();
    let metadata = RasterMetadata {
        path: path.to_path_buf(),
        height: cube.height(),
        width: cube.width(),
        band_count: cube.band_count(),
        band_names: cube.band_names().to_vec(),
        dtype: DTYPE.to_string(),
        crs: options.crs,
        transform: options.transform(resolution),
        block_size: options.block_size,
        compression: COMPRESSION.to_string(),
        tags: scene_tags(
            &now.to_rfc3339_opts(SecondsFormat::Secs, true),
            resolution,
            cube.band_count(),
        ),
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| StorageError::new(path, e))?;
    let mut staging = NamedTempFile::new_in(parent).map_err(|e| StorageError::new(path, e))?;
    debug!(staging = %staging.path().display(), "staging raster");

    let encoded = encode_geotiff(
        staging.as_file_mut(),
        cube,
        &metadata,
        &now,
        options.compression_level,
    )
    .and_then(|()| staging.as_file().sync_all().map_err(StorageErrorKind::from));
    if let Err(kind) = encoded {
        discard(staging);
        return Err(StorageError {
            path: path.to_path_buf(),
            kind,
        });
    }

    staging.persist(path).map_err(|e| {
        discard(e.file);
        StorageError::new(path, e.error)
    })?;

    info!(
        path = %path.display(),
        height = metadata.height,
        width = metadata.width,
        bands = metadata.band_count,
        crs = %metadata.crs,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "wrote GeoTIFF"
    );
    Ok(metadata)
}

/// Alias of [`write_geotiff`].
pub fn save(
    cube: &BandCube,
    resolution: f64,
    path: &Path,
    options: &RasterOptions,
) -> Result<RasterMetadata, StorageError> {
    write_geotiff(cube, resolution, path, options)
}
