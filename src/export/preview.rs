//! PNG quick-looks of band cubes.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageBuffer, ImageEncoder, Luma, Rgb};
use tracing::debug;

use super::raster::StorageError;
use crate::spectral::BandCube;

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn to_u16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * 65535.0).round() as u16
}

fn create(path: &Path) -> Result<BufWriter<File>, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::new(path, e))?;
    }
    let file = File::create(path).map_err(|e| StorageError::new(path, e))?;
    Ok(BufWriter::new(file))
}

fn dimensions(cube: &BandCube, path: &Path) -> Result<(u32, u32), StorageError> {
    let width = u32::try_from(cube.width())
        .map_err(|_| StorageError::format(path, "cube too wide for PNG"))?;
    let height = u32::try_from(cube.height())
        .map_err(|_| StorageError::format(path, "cube too tall for PNG"))?;
    Ok((width, height))
}

/// Writes an 8-bit RGB composite of three bands.
///
/// Reflectances are clamped to `[0, 1]` and scaled linearly.
///
/// # Panics
/// Panics if any index in `bands` is out of range.
pub fn export_preview_png(
    cube: &BandCube,
    bands: [usize; 3],
    path: &Path,
) -> Result<(), StorageError> {
    for &band in &bands {
        assert!(
            band < cube.band_count(),
            "band index {band} out of range for {} bands",
            cube.band_count()
        );
    }
    let (width, height) = dimensions(cube, path)?;
    let [r, g, b] = bands.map(|band| cube.band(band));

    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        let idx = [y as usize, x as usize];
        Rgb([to_u8(r[idx]), to_u8(g[idx]), to_u8(b[idx])])
    });

    let encoder = PngEncoder::new_with_quality(
        create(path)?,
        CompressionType::Default,
        FilterType::Adaptive,
    );
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| StorageError::new(path, e))?;

    debug!(path = %path.display(), ?bands, "wrote RGB preview");
    Ok(())
}

/// Writes one band as a 16-bit grayscale PNG.
///
/// # Panics
/// Panics if `band` is out of range.
pub fn export_band_png(cube: &BandCube, band: usize, path: &Path) -> Result<(), StorageError> {
    assert!(
        band < cube.band_count(),
        "band index {band} out of range for {} bands",
        cube.band_count()
    );
    let (width, height) = dimensions(cube, path)?;
    let values = cube.band(band);

    let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_fn(width, height, |x, y| {
        Luma([to_u16(values[[y as usize, x as usize]])])
    });

    let encoder = PngEncoder::new_with_quality(
        create(path)?,
        CompressionType::Default,
        FilterType::Adaptive,
    );
    // PNG stores 16-bit samples big-endian; the encoder expects native u16 bytes.
    let byte_slice: &[u8] = bytemuck::cast_slice(img.as_raw());
    encoder
        .write_image(byte_slice, width, height, image::ExtendedColorType::L16)
        .map_err(|e| StorageError::new(path, e))?;

    debug!(path = %path.display(), band, "wrote band preview");
    Ok(())
}
