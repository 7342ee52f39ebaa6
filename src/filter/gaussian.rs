//! Separable Gaussian smoothing for scalar grids.

use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Kernel half-width in standard deviations.
pub const TRUNCATE: f64 = 4.0;

/// Builds a normalized 1D Gaussian kernel of radius `round(TRUNCATE * sigma)`,
/// clamped to `max_radius`.
///
/// An infinite `sigma` gives a flat kernel of radius `max_radius`. A sigma
/// below `0.125` gives the identity kernel `[1.0]`.
///
/// # Panics
/// Panics if `sigma` is NaN or not positive.
pub fn gaussian_kernel_1d(sigma: f64, max_radius: usize) -> Vec<f64> {
    assert!(sigma > 0.0, "sigma must be positive, got {sigma}");

    let radius = (TRUNCATE * sigma + 0.5).min(max_radius as f64) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| {
            let z = x as f64 / sigma;
            (-0.5 * z * z).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Mirrors an out-of-range index back into `0..len` (`d c b a | a b c d`).
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}

fn convolve_line(input: &[f64], kernel: &[f64], output: &mut [f64]) {
    let radius = (kernel.len() / 2) as isize;
    let len = input.len();
    for (i, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (k, &weight) in kernel.iter().enumerate() {
            let src = i as isize + k as isize - radius;
            sum += input[reflect(src, len)] * weight;
        }
        *out = sum;
    }
}

/// Gaussian-blurs `grid` with standard deviation `sigma` (in pixels).
///
/// Rows are filtered first, then columns; both passes run in parallel over
/// lanes. Edges use reflect boundary handling, so a constant field stays
/// constant and zero regions far from any signal stay exactly zero. The
/// kernel radius never exceeds the length of the lane it filters.
pub fn gaussian_blur(grid: &Array2<f64>, sigma: f64) -> Array2<f64> {
    let (height, width) = grid.dim();
    let row_kernel = gaussian_kernel_1d(sigma, width);
    let column_kernel = gaussian_kernel_1d(sigma, height);

    let mut rows = Array2::<f64>::zeros((height, width));
    rows.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(grid.axis_iter(Axis(0)).into_par_iter())
        .for_each(|(mut out, input)| {
            let line = input.to_vec();
            let mut filtered = vec![0.0; width];
            convolve_line(&line, &row_kernel, &mut filtered);
            out.iter_mut().zip(filtered).for_each(|(o, v)| *o = v);
        });

    let mut blurred = Array2::<f64>::zeros((height, width));
    blurred
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(rows.axis_iter(Axis(1)).into_par_iter())
        .for_each(|(mut out, input)| {
            let line = input.to_vec();
            let mut filtered = vec![0.0; height];
            convolve_line(&line, &column_kernel, &mut filtered);
            out.iter_mut().zip(filtered).for_each(|(o, v)| *o = v);
        });

    blurred
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel_1d(2.0, usize::MAX);
        assert_eq!(kernel.len(), 17);
        let sum: f64 = kernel.iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        for i in 0..kernel.len() / 2 {
            assert_abs_diff_eq!(kernel[i], kernel[kernel.len() - 1 - i], epsilon = 1e-15);
        }
        assert!(kernel[8] > kernel[7]);
    }

    #[test]
    #[should_panic]
    fn test_kernel_rejects_zero_sigma() {
        gaussian_kernel_1d(0.0, 8);
    }

    #[test]
    #[should_panic]
    fn test_kernel_rejects_nan_sigma() {
        gaussian_kernel_1d(f64::NAN, 8);
    }

    #[test]
    fn test_tiny_sigma_gives_identity_kernel() {
        assert_eq!(gaussian_kernel_1d(0.1, 8), vec![1.0]);
        assert_eq!(gaussian_kernel_1d(1e-200, 8), vec![1.0]);
        assert_eq!(gaussian_kernel_1d(f64::MIN_POSITIVE, usize::MAX), vec![1.0]);
    }

    #[test]
    fn test_huge_sigma_kernel_is_clamped_and_flat() {
        for sigma in [1e12, 1e200, f64::INFINITY] {
            let kernel = gaussian_kernel_1d(sigma, 5);
            assert_eq!(kernel.len(), 11);
            for &weight in &kernel {
                assert_abs_diff_eq!(weight, 1.0 / 11.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_kernel_radius_clamp_keeps_normalization() {
        let kernel = gaussian_kernel_1d(3.0, 2);
        assert_eq!(kernel.len(), 5);
        assert_abs_diff_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
    }

    #[test]
    fn test_huge_sigma_blur_is_finite_and_bounded() {
        let grid = Array2::from_shape_fn((9, 6), |(r, c)| ((r * 5 + c) % 7) as f64 / 6.0);
        for sigma in [1e12, f64::INFINITY] {
            let blurred = gaussian_blur(&grid, sigma);
            assert_eq!(blurred.dim(), (9, 6));
            for &v in blurred.iter() {
                assert!(v.is_finite());
                assert!((-1e-12..=1.0 + 1e-12).contains(&v));
            }
        }
    }

    #[test]
    fn test_reflect_indices() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(2, 4), 2);
        assert_eq!(reflect(-9, 4), 0);
        assert_eq!(reflect(3, 1), 0);
    }

    #[test]
    fn test_constant_field_is_preserved() {
        let grid = Array2::from_elem((12, 7), 0.25);
        let blurred = gaussian_blur(&grid, 3.0);
        for &v in blurred.iter() {
            assert_abs_diff_eq!(v, 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_blur_preserves_mass_and_spreads_impulse() {
        let mut grid = Array2::<f64>::zeros((41, 41));
        grid[[20, 20]] = 1.0;
        let blurred = gaussian_blur(&grid, 2.0);

        let total: f64 = blurred.iter().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        assert!(blurred[[20, 20]] < 1.0);
        assert!(blurred[[20, 23]] > 0.0);
        // Beyond the truncation radius nothing leaks in.
        assert_eq!(blurred[[0, 0]], 0.0);
        assert_eq!(blurred[[20, 29]], 0.0);
    }

    #[test]
    fn test_blur_keeps_values_within_input_range() {
        let grid = Array2::from_shape_fn((16, 16), |(r, c)| ((r * 7 + c * 3) % 5) as f64 / 4.0);
        let blurred = gaussian_blur(&grid, 1.5);
        for &v in blurred.iter() {
            assert!((-1e-12..=1.0 + 1e-12).contains(&v));
        }
    }
}
