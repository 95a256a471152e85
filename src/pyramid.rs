// pyramid.rs — Gradient pyramid: smoothed image plus x/y gradients per level.
//
// Algorithm, starting from base_0 = input converted to f32:
//   for each level i:
//     1. smoothed_i = Gaussian(base_i)          (separable, clamp borders)
//     2. (gx_i, gy_i) = Sobel(smoothed_i)       (normalized, see gradient.rs)
//     3. base_{i+1} = stride2(smoothed_i)       (keep every other pixel)
//
// Downsampling rule: dst(x, y) = src(2x, 2y), dimensions (w / 2, h / 2)
// with integer division, never below 1. A level-k coordinate p corresponds
// to full-resolution coordinate p · 2^k.
//
// Bounds are those of the full-resolution frame mapped down, not of the
// level raster. With odd dimensions a level holds up to one pixel less
// than `(W − 1) / 2^k`; positions in that sliver sample the clamped last
// row or column. A point inside the frame is therefore inside every level.
//
// Every level is smoothed the same way, including the coarsest one, so
// the tracker sees the same signal at every scale. Levels are immutable
// after `build`.

use log::trace;

use crate::convolution::{convolve_separable, gaussian_half_size, gaussian_kernel_1d};
use crate::error::{Result, TrackerError};
use crate::gradient::sobel_xy;
use crate::image::{Image, Pixel};

/// One level of a gradient pyramid.
#[derive(Clone, PartialEq)]
pub struct PyramidLevel {
    /// Smoothed intensity image.
    pub image: Image<f32>,
    /// Horizontal gradient of `image`.
    pub grad_x: Image<f32>,
    /// Vertical gradient of `image`.
    pub grad_y: Image<f32>,
    /// Largest valid (x, y): the full-resolution `(W − 1, H − 1)` in this
    /// level's units.
    pub extent: (f32, f32),
}

impl PyramidLevel {
    fn from_smoothed(image: Image<f32>, extent: (f32, f32)) -> Self {
        let (grad_x, grad_y) = sobel_xy(&image);
        PyramidLevel { image, grad_x, grad_y, extent }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.image.height()
    }

    /// True if (x, y) lies inside `[0, extent.0] × [0, extent.1]`.
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x <= self.extent.0 && y <= self.extent.1
    }
}

/// Full-resolution → level-`level` scale factor, `2^-level`.
#[inline]
pub fn level_scale(level: usize) -> f32 {
    0.5f32.powi(i32::try_from(level).unwrap_or(i32::MAX))
}

/// A coarse-to-fine stack of [`PyramidLevel`]s.
///
/// `levels[0]` is full resolution; `levels[n]` is approximately
/// `(width / 2^n, height / 2^n)`.
#[derive(Clone, PartialEq)]
pub struct GradientPyramid {
    pub levels: Vec<PyramidLevel>,
}

impl GradientPyramid {
    /// Build a gradient pyramid with `num_levels` levels.
    ///
    /// Errors if `num_levels == 0` or the image is empty.
    pub fn build<T: Pixel>(src: &Image<T>, num_levels: usize, sigma: f32) -> Result<Self> {
        if num_levels == 0 {
            return Err(TrackerError::ZeroPyramidLevels);
        }
        if src.is_empty() {
            return Err(TrackerError::EmptyImage { width: src.width(), height: src.height() });
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(TrackerError::InvalidParameter { name: "pyramid_sigma", value: sigma });
        }

        let kernel = gaussian_kernel_1d(gaussian_half_size(sigma), sigma);
        let mut levels = Vec::with_capacity(num_levels);

        let frame_max = ((src.width() - 1) as f32, (src.height() - 1) as f32);
        let mut smoothed = convolve_separable(src, &kernel, &kernel);
        for i in 0..num_levels {
            let next_base = (i + 1 < num_levels).then(|| downsample_2x(&smoothed));
            trace!("pyramid level {i}: {}×{}", smoothed.width(), smoothed.height());
            let scale = level_scale(i);
            levels.push(PyramidLevel::from_smoothed(smoothed, (frame_max.0 * scale, frame_max.1 * scale)));
            match next_base {
                Some(base) => smoothed = convolve_separable(&base, &kernel, &kernel),
                None => break,
            }
        }

        Ok(GradientPyramid { levels })
    }

    /// Number of pyramid levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Get a reference to a specific level.
    pub fn level(&self, level: usize) -> &PyramidLevel {
        &self.levels[level]
    }

    /// Full-resolution `(width, height)`.
    pub fn dims(&self) -> (usize, usize) {
        self.levels[0].image.dims()
    }
}

/// Downsample by 2× in both dimensions by striding: `dst(x, y) = src(2x, 2y)`.
fn downsample_2x(src: &Image<f32>) -> Image<f32> {
    let new_w = (src.width() / 2).max(1);
    let new_h = (src.height() / 2).max(1);
    Image::from_fn(new_w, new_h, |x, y| src.get(2 * x, 2 * y))
}
