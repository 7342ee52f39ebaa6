//! Scalar grid helpers.

use ndarray::Array2;

/// A `height x width` scalar field.
pub type Grid = Array2<f64>;

/// Returns `(min, max)` over the grid, or `None` for an empty grid.
pub fn value_range(grid: &Grid) -> Option<(f64, f64)> {
    grid.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((min, max)) => Some((min.min(v), max.max(v))),
    })
}

/// Min-max normalizes `grid` into `[0, 1]` in place.
///
/// A constant field has no range to stretch and becomes a uniform 0.5.
pub fn normalize(grid: &mut Grid) {
    let Some((min, max)) = value_range(grid) else {
        return;
    };

    let range = max - min;
    if range > 0.0 && range.is_finite() {
        grid.mapv_inplace(|v| ((v - min) / range).clamp(0.0, 1.0));
    } else {
        grid.fill(0.5);
    }
}

/// Fraction of strictly positive cells.
pub fn nonzero_fraction(grid: &Grid) -> f64 {
    if grid.is_empty() {
        return 0.0;
    }
    let count = grid.iter().filter(|&&v| v > 0.0).count();
    count as f64 / grid.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_value_range() {
        let grid = array![[1.0, -2.0], [3.5, 0.0]];
        assert_eq!(value_range(&grid), Some((-2.0, 3.5)));
        assert_eq!(value_range(&Grid::zeros((0, 3))), None);
    }

    #[test]
    fn test_normalize_stretches_to_unit_range() {
        let mut grid = array![[2.0, 4.0], [6.0, 10.0]];
        normalize(&mut grid);
        assert_eq!(grid, array![[0.0, 0.25], [0.5, 1.0]]);
    }

    #[test]
    fn test_normalize_constant_field() {
        let mut grid = Grid::from_elem((3, 3), 7.0);
        normalize(&mut grid);
        assert!(grid.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_nonzero_fraction() {
        let grid = array![[0.0, 0.1], [0.0, 0.0]];
        assert_eq!(nonzero_fraction(&grid), 0.25);
    }
}
