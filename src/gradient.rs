// gradient.rs — Image gradients via the normalized Sobel operator.
//
// Sobel is separable:
//   Ix = [1, 2, 1]/4 (down columns) * [-1, 0, 1]/2 (along rows)
//   Iy = [1, 2, 1]/4 (along rows)   * [-1, 0, 1]/2 (down columns)
//
// The kernels are normalized so the output is in intensity units per pixel:
// a ramp f(x) = a·x yields Ix = a exactly. The Newton step of the tracker
// divides by squared gradients, so any scale factor here would shrink or
// inflate every displacement update.

use crate::convolution::convolve_separable;
use crate::image::{Image, Pixel};

const DERIV: [f32; 3] = [-0.5, 0.0, 0.5];
const SMOOTH: [f32; 3] = [0.25, 0.5, 0.25];

/// Horizontal gradient Ix. Positive where intensity increases to the right.
pub fn sobel_x<T: Pixel>(src: &Image<T>) -> Image<f32> {
    convolve_separable(src, &DERIV, &SMOOTH)
}

/// Vertical gradient Iy. Positive where intensity increases downward.
pub fn sobel_y<T: Pixel>(src: &Image<T>) -> Image<f32> {
    convolve_separable(src, &SMOOTH, &DERIV)
}

/// Both gradients at once.
pub fn sobel_xy<T: Pixel>(src: &Image<T>) -> (Image<f32>, Image<f32>) {
    (sobel_x(src), sobel_y(src))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_step_edge() {
        let img = Image::from_fn(20, 10, |x, _| if x >= 10 { 100u8 } else { 0 });
        let ix = sobel_x(&img);
        assert!(ix.get(10, 5) > 40.0, "expected strong Ix at edge, got {}", ix.get(10, 5));
        assert!(ix.get(4, 5).abs() < 1e-6);
    }

    #[test]
    fn test_vertical_step_edge() {
        let img = Image::from_fn(10, 20, |_, y| if y >= 10 { 100u8 } else { 0 });
        let iy = sobel_y(&img);
        assert!(iy.get(5, 10) > 40.0);
        assert!(iy.get(5, 4).abs() < 1e-6);
    }

    #[test]
    fn test_ramp_has_unit_scale() {
        // f(x, y) = 3x + 2y → Ix = 3, Iy = 2 on the interior.
        let img = Image::from_fn(20, 12, |x, y| 3.0 * x as f32 + 2.0 * y as f32);
        let (ix, iy) = sobel_xy(&img);
        for y in 1..11 {
            for x in 1..19 {
                assert!((ix.get(x, y) - 3.0).abs() < 1e-4, "Ix at ({x},{y}) = {}", ix.get(x, y));
                assert!((iy.get(x, y) - 2.0).abs() < 1e-4, "Iy at ({x},{y}) = {}", iy.get(x, y));
            }
        }
    }

    #[test]
    fn test_constant_image_zero_gradient() {
        let img = Image::filled(10, 10, 128u8);
        let (ix, iy) = sobel_xy(&img);
        assert!(ix.pixels().all(|(_, _, v)| v == 0.0));
        assert!(iy.pixels().all(|(_, _, v)| v == 0.0));
    }
}
