//! Read-back of GeoTIFFs produced by the writer.
//!
//! The tiff decoder is only used for the directory. Its image decoding does
//! not accept multi-sample BlackIsZero rasters, so tiles are read, inflated
//! and de-interleaved here.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::ZlibDecoder;
use ndarray::Array3;
use rayon::prelude::*;
use tiff::decoder::{Decoder, Limits};
use tiff::tags::Tag;
use tiff::TiffError;
use tracing::debug;

use super::geotiff::{
    crs_from_geo_keys, geotag, COMPRESSION_ADOBE_DEFLATE, COMPRESSION_DEFLATE, COMPRESSION_NONE,
    GDAL_METADATA, GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE, MODEL_TIEPOINT,
};
use super::raster::{
    parse_gdal_metadata, RasterMetadata, StorageError, StorageErrorKind, COMPRESSION, DTYPE,
};
use super::transform::GeoTransform;
use crate::spectral::BandCube;

const PLANAR_CHUNKY: u32 = 1;
const SAMPLE_FORMAT_IEEE_FP: u16 = 3;

/// Tile layout of the first image directory.
struct TileLayout {
    tile_width: usize,
    tile_height: usize,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    compression: u16,
    big_endian: bool,
}

impl TileLayout {
    fn tile_bytes(&self, bands: usize) -> usize {
        self.tile_width * self.tile_height * bands * 4
    }
}

fn tag_u32<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<u32>, TiffError> {
    decoder.find_tag(tag)?.map(|v| v.into_u32()).transpose()
}

fn tag_u16_vec<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<u16>>, TiffError> {
    decoder.find_tag(tag)?.map(|v| v.into_u16_vec()).transpose()
}

fn tag_u64_vec<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<u64>>, TiffError> {
    decoder.find_tag(tag)?.map(|v| v.into_u64_vec()).transpose()
}

/// Inflates one tile, or passes it through for uncompressed files.
fn inflate_tile(
    raw: Vec<u8>,
    compression: u16,
    expected: usize,
) -> Result<Vec<u8>, StorageErrorKind> {
    let bytes = match compression {
        COMPRESSION_DEFLATE | COMPRESSION_ADOBE_DEFLATE => {
            let mut out = Vec::with_capacity(expected);
            ZlibDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
            out
        }
        COMPRESSION_NONE => raw,
        other => {
            return Err(StorageErrorKind::Format(format!(
                "unsupported TIFF compression {other}"
            )))
        }
    };
    if bytes.len() < expected {
        return Err(StorageErrorKind::Format(format!(
            "tile holds {} bytes, expected {expected}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Copies the samples of one decoded tile into `data`, dropping edge padding.
fn scatter_tile(
    data: &mut Array3<f32>,
    tile: &[u8],
    tile_row: usize,
    tile_col: usize,
    layout: &TileLayout,
) {
    let (bands, height, width) = data.dim();
    for r in 0..layout.tile_height {
        let row = tile_row * layout.tile_height + r;
        if row >= height {
            break;
        }
        for c in 0..layout.tile_width {
            let col = tile_col * layout.tile_width + c;
            if col >= width {
                break;
            }
            let pixel = (r * layout.tile_width + c) * bands;
            for b in 0..bands {
                let at = (pixel + b) * 4;
                let bytes = [tile[at], tile[at + 1], tile[at + 2], tile[at + 3]];
                data[[b, row, col]] = if layout.big_endian {
                    f32::from_be_bytes(bytes)
                } else {
                    f32::from_le_bytes(bytes)
                };
            }
        }
    }
}

/// Reads every tile of `layout` from `path` and assembles the band stack.
fn read_tiles(
    path: &Path,
    layout: &TileLayout,
    bands: usize,
    height: usize,
    width: usize,
) -> Result<Array3<f32>, StorageError> {
    let io_err = |e: std::io::Error| StorageError::new(path, e);
    let tiles_across = width.div_ceil(layout.tile_width);
    let tiles_down = height.div_ceil(layout.tile_height);
    let tile_count = tiles_across * tiles_down;
    if layout.offsets.len() != tile_count || layout.byte_counts.len() != tile_count {
        return Err(StorageError::format(
            path,
            format!(
                "expected {tile_count} tiles, directory lists {} offsets and {} byte counts",
                layout.offsets.len(),
                layout.byte_counts.len()
            ),
        ));
    }

    let mut file = BufReader::new(File::open(path).map_err(io_err)?);
    let mut raw_tiles = Vec::with_capacity(tile_count);
    for (&offset, &count) in layout.offsets.iter().zip(&layout.byte_counts) {
        let count = usize::try_from(count)
            .map_err(|_| StorageError::new(path, StorageErrorKind::TooLarge))?;
        let mut raw = vec![0u8; count];
        file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        file.read_exact(&mut raw).map_err(io_err)?;
        raw_tiles.push(raw);
    }

    let expected = layout.tile_bytes(bands);
    let tiles = raw_tiles
        .into_par_iter()
        .map(|raw| inflate_tile(raw, layout.compression, expected))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|kind| StorageError::new(path, kind))?;

    let mut data = Array3::<f32>::zeros((bands, height, width));
    for (index, tile) in tiles.iter().enumerate() {
        scatter_tile(&mut data, tile, index / tiles_across, index % tiles_across, layout);
    }
    Ok(data)
}

/// Reads a float32 GeoTIFF written by [`write_geotiff`](super::write_geotiff).
///
/// Band names come from the GDAL band descriptions, falling back to
/// `band_1`, `band_2`, ... for undescribed samples.
pub fn read_geotiff(path: &Path) -> Result<(BandCube, RasterMetadata), StorageError> {
    let io_err = |e: std::io::Error| StorageError::new(path, e);
    let tiff_err = |e: TiffError| StorageError::new(path, e);

    let mut file = File::open(path).map_err(io_err)?;
    let mut byte_order = [0u8; 2];
    file.read_exact(&mut byte_order).map_err(io_err)?;
    file.rewind().map_err(io_err)?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let (width, height) = (width as usize, height as usize);
    let bands = tag_u32(&mut decoder, Tag::SamplesPerPixel)
        .map_err(tiff_err)?
        .unwrap_or(1) as usize;

    let bits = tag_u16_vec(&mut decoder, Tag::BitsPerSample)
        .map_err(tiff_err)?
        .unwrap_or_default();
    let formats = tag_u16_vec(&mut decoder, Tag::SampleFormat)
        .map_err(tiff_err)?
        .unwrap_or_default();
    if bits.iter().any(|&b| b != 32) || formats.iter().any(|&f| f != SAMPLE_FORMAT_IEEE_FP) {
        return Err(StorageError::format(path, "expected float32 samples"));
    }
    let planar = tag_u32(&mut decoder, Tag::PlanarConfiguration)
        .map_err(tiff_err)?
        .unwrap_or(PLANAR_CHUNKY);
    if planar != PLANAR_CHUNKY {
        return Err(StorageError::format(path, "expected pixel-interleaved samples"));
    }

    let tile_width = tag_u32(&mut decoder, Tag::TileWidth).map_err(tiff_err)?;
    let tile_height = tag_u32(&mut decoder, Tag::TileLength).map_err(tiff_err)?;
    let (Some(tile_width), Some(tile_height)) = (tile_width, tile_height) else {
        return Err(StorageError::format(path, "expected a tiled TIFF"));
    };
    if tile_width == 0 || tile_height == 0 {
        return Err(StorageError::format(path, "zero tile size"));
    }
    let raw_compression = decoder.get_tag_u32(Tag::Compression).map_err(tiff_err)? as u16;
    let layout = TileLayout {
        tile_width: tile_width as usize,
        tile_height: tile_height as usize,
        offsets: tag_u64_vec(&mut decoder, Tag::TileOffsets)
            .map_err(tiff_err)?
            .ok_or_else(|| StorageError::format(path, "missing TileOffsets tag"))?,
        byte_counts: tag_u64_vec(&mut decoder, Tag::TileByteCounts)
            .map_err(tiff_err)?
            .ok_or_else(|| StorageError::format(path, "missing TileByteCounts tag"))?,
        compression: raw_compression,
        big_endian: &byte_order == b"MM",
    };
    let compression = match raw_compression {
        COMPRESSION_DEFLATE | COMPRESSION_ADOBE_DEFLATE => COMPRESSION.to_string(),
        COMPRESSION_NONE => "none".to_string(),
        other => format!("tiff:{other}"),
    };

    let scale = decoder
        .find_tag(geotag(MODEL_PIXEL_SCALE))
        .map_err(tiff_err)?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(tiff_err)?
        .ok_or_else(|| StorageError::format(path, "missing ModelPixelScale tag"))?;
    let tiepoint = decoder
        .find_tag(geotag(MODEL_TIEPOINT))
        .map_err(tiff_err)?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(tiff_err)?
        .ok_or_else(|| StorageError::format(path, "missing ModelTiepoint tag"))?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(StorageError::format(path, "truncated georeferencing tags"));
    }
    let transform = GeoTransform::from_gdal([
        tiepoint[3] - tiepoint[0] * scale[0],
        scale[0],
        0.0,
        tiepoint[4] + tiepoint[1] * scale[1],
        0.0,
        -scale[1],
    ]);

    let crs = decoder
        .find_tag(geotag(GEO_KEY_DIRECTORY))
        .map_err(tiff_err)?
        .map(|v| v.into_u16_vec())
        .transpose()
        .map_err(tiff_err)?
        .as_deref()
        .and_then(crs_from_geo_keys)
        .ok_or_else(|| StorageError::format(path, "missing CRS geokey"))?;

    let gdal = decoder
        .find_tag(geotag(GDAL_METADATA))
        .map_err(tiff_err)?
        .map(|v| v.into_string())
        .transpose()
        .map_err(tiff_err)?
        .map(|xml| parse_gdal_metadata(&xml))
        .unwrap_or_default();

    let data = read_tiles(path, &layout, bands, height, width)?;

    let band_names: Vec<String> = (0..bands)
        .map(|b| {
            gdal.descriptions
                .get(&b)
                .cloned()
                .unwrap_or_else(|| format!("band_{}", b + 1))
        })
        .collect();

    let metadata = RasterMetadata {
        path: path.to_path_buf(),
        height,
        width,
        band_count: bands,
        band_names: band_names.clone(),
        dtype: DTYPE.to_string(),
        crs,
        transform,
        block_size: tile_width,
        compression,
        tags: gdal.tags,
    };
    debug!(path = %path.display(), height, width, bands, "read GeoTIFF");

    Ok((BandCube::new(band_names, data), metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::geotiff::encode_geotiff;
    use crate::export::transform::Crs;
    use crate::export::{write_geotiff, RasterOptions};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.tif");
        let err = read_geotiff(&path).unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_read_rejects_non_tiff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.tif");
        fs::write(&path, b"definitely not a tiff").unwrap();
        assert!(read_geotiff(&path).is_err());
    }

    #[test]
    fn test_undescribed_bands_get_numbered_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.tif");
        let data = Array3::from_shape_fn((3, 9, 12), |(b, r, c)| (b * 108 + r * 12 + c) as f32);
        let cube = BandCube::new(vec!["red".into(), "green".into(), "blue".into()], data);
        let metadata = RasterMetadata {
            path: path.clone(),
            height: 9,
            width: 12,
            band_count: 3,
            band_names: vec!["red".into()],
            dtype: DTYPE.to_string(),
            crs: Crs::WGS84,
            transform: GeoTransform::from_origin(0.0, 0.0, 10.0, 10.0),
            block_size: 16,
            compression: COMPRESSION.to_string(),
            tags: BTreeMap::new(),
        };
        let file = File::create(&path).unwrap();
        encode_geotiff(file, &cube, &metadata, &Utc::now(), 6).unwrap();

        let (read, read_metadata) = read_geotiff(&path).unwrap();
        assert_eq!(read.band_names(), ["red", "band_2", "band_3"]);
        assert_eq!(read_metadata.band_names, vec!["red", "band_2", "band_3"]);
        assert_eq!(read.data(), cube.data());
    }

    #[test]
    fn test_multiband_edge_tiles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("multi.tif");
        let data = Array3::from_shape_fn((3, 37, 45), |(b, r, c)| {
            b as f32 - (r * 45 + c) as f32 / 1665.0
        });
        let cube = BandCube::new(vec!["b1".into(), "b2".into(), "b3".into()], data);
        let options = RasterOptions {
            block_size: 16,
            ..Default::default()
        };
        write_geotiff(&cube, 10.0, &path, &options).unwrap();

        let (read, metadata) = read_geotiff(&path).unwrap();
        assert_eq!(read.shape(), (3, 37, 45));
        assert_eq!(read.data(), cube.data());
        assert_eq!(metadata.band_names, vec!["b1", "b2", "b3"]);
        assert_eq!(metadata.block_size, 16);
    }

    #[test]
    fn test_untiled_tiff_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strips.tif");
        let mut encoder = tiff::encoder::TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<tiff::encoder::colortype::Gray32Float>(2, 2, &[0.0, 0.25, 0.5, 1.0])
            .unwrap();
        drop(encoder);

        let err = read_geotiff(&path).unwrap_err();
        assert!(matches!(err.kind, StorageErrorKind::Format(_)));
    }

    #[test]
    fn test_single_band_edge_tiles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("edge.tif");
        let data = Array3::from_shape_fn((1, 17, 33), |(_, r, c)| (r * 33 + c) as f32 / 561.0);
        let cube = BandCube::new(vec!["pan".into()], data);
        let options = RasterOptions {
            block_size: 16,
            ..Default::default()
        };
        write_geotiff(&cube, 2.5, &path, &options).unwrap();

        let (read, metadata) = read_geotiff(&path).unwrap();
        assert_eq!(read.data(), cube.data());
        assert_eq!(metadata.band_names, vec!["pan".to_string()]);
        assert_eq!(metadata.compression, "deflate");
        assert_eq!(metadata.resolution(), 2.5);
        let _ = fs::remove_file(&path);
    }
}
