//! Multi-band reflectance cube.

use ndarray::{Array3, ArrayView2, ArrayViewMut2, Axis};

/// A `[bands, height, width]` stack of `f32` reflectance planes with band names.
#[derive(Debug, Clone, PartialEq)]
pub struct BandCube {
    names: Vec<String>,
    data: Array3<f32>,
}

impl BandCube {
    /// Wraps `data` with its band names.
    ///
    /// # Panics
    /// Panics if the number of names differs from the band axis length.
    pub fn new(names: Vec<String>, data: Array3<f32>) -> Self {
        assert_eq!(
            names.len(),
            data.len_of(Axis(0)),
            "band name count must match the cube's band axis"
        );
        Self { names, data }
    }

    pub fn band_count(&self) -> usize {
        self.names.len()
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// `(bands, height, width)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn band_names(&self) -> &[String] {
        &self.names
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    pub fn band(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }

    pub fn band_mut(&mut self, index: usize) -> ArrayViewMut2<'_, f32> {
        self.data.index_axis_mut(Axis(0), index)
    }

    pub fn band_by_name(&self, name: &str) -> Option<ArrayView2<'_, f32>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|index| self.band(index))
    }

    pub fn into_parts(self) -> (Vec<String>, Array3<f32>) {
        (self.names, self.data)
    }

    /// Clamps every value into `[0, 1]`.
    pub fn clip_unit(&mut self) {
        self.data.mapv_inplace(|v| v.clamp(0.0, 1.0));
    }

    /// Returns `(min, max)` over all bands, or `None` for an empty cube.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> BandCube {
        let data = Array3::from_shape_fn((2, 3, 4), |(b, r, c)| (b * 100 + r * 10 + c) as f32);
        BandCube::new(vec!["red".into(), "nir".into()], data)
    }

    #[test]
    fn test_shape_accessors() {
        let cube = cube();
        assert_eq!(cube.shape(), (2, 3, 4));
        assert_eq!(cube.band_count(), 2);
        assert_eq!(cube.height(), 3);
        assert_eq!(cube.width(), 4);
    }

    #[test]
    fn test_band_lookup() {
        let cube = cube();
        assert_eq!(cube.band(1)[[2, 3]], 123.0);
        assert_eq!(cube.band_by_name("nir").unwrap()[[0, 1]], 101.0);
        assert!(cube.band_by_name("swir").is_none());
    }

    #[test]
    fn test_clip_unit() {
        let mut cube = cube();
        cube.data_mut()[[0, 0, 0]] = -0.5;
        cube.clip_unit();
        assert_eq!(cube.value_range(), Some((0.0, 1.0)));
    }

    #[test]
    #[should_panic(expected = "band name count")]
    fn test_mismatched_names_panic() {
        BandCube::new(vec!["red".into()], Array3::zeros((2, 2, 2)));
    }
}
