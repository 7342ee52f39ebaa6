//! Image filters shared by the terrain and atmosphere stages.

mod gaussian;

pub use gaussian::{gaussian_blur, gaussian_kernel_1d, TRUNCATE};
