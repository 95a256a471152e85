// sampler.rs — Bilinear patch sampling at fractional coordinates.
//
// Every interpolated read in the tracker goes through `interpolate`, so
// source windows, target windows, gradient windows and residues all see
// the same border behavior: coordinates are clamped to the raster and the
// 2×2 footprint (x0, y0)..(x0+1, y0+1) is kept inside it (clamp-to-edge).
//
// A window is a rectangle of samples around a center with possibly
// asymmetric half-extents:
//
//         top
//       ┌───────┐
//  left │   ·   │ right      · = center (cx, cy)
//       └───────┘
//        bottom
//
// Samples are stored row-major, top row first.

use crate::image::Image;

/// Bilinearly interpolated value of `img` at (x, y), clamp-to-edge.
///
/// `val = (1-ax)(1-ay)·S(x0,y0) + ax(1-ay)·S(x0+1,y0)
///      + (1-ax)ay·S(x0,y0+1) + ax·ay·S(x0+1,y0+1)`
///
/// # Panics
/// Panics if the image is empty.
#[inline]
pub fn interpolate(img: &Image<f32>, x: f32, y: f32) -> f32 {
    let (w, h) = img.dims();
    assert!(w > 0 && h > 0, "cannot interpolate on an empty image");

    let (x0, x1, ax) = footprint(x, w);
    let (y0, y1, ay) = footprint(y, h);

    let p00 = img.get(x0, y0);
    let p10 = img.get(x1, y0);
    let p01 = img.get(x0, y1);
    let p11 = img.get(x1, y1);

    (1.0 - ax) * (1.0 - ay) * p00 + ax * (1.0 - ay) * p10 + (1.0 - ax) * ay * p01 + ax * ay * p11
}

/// Integer footprint and fractional weight along one axis of length `n`.
#[inline]
fn footprint(v: f32, n: usize) -> (usize, usize, f32) {
    if n == 1 {
        return (0, 0, 0.0);
    }
    let v = v.clamp(0.0, (n - 1) as f32);
    // x0 ≤ n − 2 keeps x0 + 1 inside; at v = n − 1 the weight becomes 1.
    let i0 = (v.floor() as usize).min(n - 2);
    (i0, i0 + 1, v - i0 as f32)
}

/// Half-extents of a window in the four directions, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfExtents {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl HalfExtents {
    /// Symmetric window of `(2·hw + 1) × (2·hh + 1)` samples.
    pub fn nominal(half_width: usize, half_height: usize) -> Self {
        HalfExtents { left: half_width, right: half_width, top: half_height, bottom: half_height }
    }

    /// The nominal window shrunk on every side where one of `centers` lies
    /// within a half-window of the raster border, so that the window around
    /// each center stays inside `[0, W−1] × [0, H−1]`.
    ///
    /// Extents never exceed the nominal ones and never go negative; a
    /// center outside the raster clips that side to zero.
    pub fn clipped(
        half_width: usize,
        half_height: usize,
        width: usize,
        height: usize,
        centers: &[(f32, f32)],
    ) -> Self {
        let mut ext = Self::nominal(half_width, half_height);
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        for &(cx, cy) in centers {
            ext.left = ext.left.min(room(cx));
            ext.right = ext.right.min(room(max_x - cx));
            ext.top = ext.top.min(room(cy));
            ext.bottom = ext.bottom.min(room(max_y - cy));
        }
        ext
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.left + self.right + 1
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.top + self.bottom + 1
    }

    /// Total number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.cols() * self.rows()
    }

    /// Always false: a window holds at least its center.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Window offsets `(dx, dy)` in row-major order.
    pub fn offsets(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        let (l, r) = (self.left as isize, self.right as isize);
        (-(self.top as isize)..=self.bottom as isize)
            .flat_map(move |dy| (-l..=r).map(move |dx| (dx as f32, dy as f32)))
    }
}

/// Whole pixels available between a coordinate and the border on one side.
#[inline]
fn room(distance: f32) -> usize {
    if distance <= 0.0 {
        0
    } else {
        distance.floor() as usize
    }
}

/// A transient patch of interpolated samples.
///
/// The buffer is reused across `gather` calls; only the samples of the
/// most recent call are valid.
#[derive(Debug, Clone, Default)]
pub struct Window {
    samples: Vec<f32>,
}

impl Window {
    pub fn new() -> Self {
        Window { samples: Vec::new() }
    }

    /// Fill the window with samples of `img` centered at (cx, cy).
    pub fn gather(&mut self, img: &Image<f32>, cx: f32, cy: f32, ext: &HalfExtents) -> &[f32] {
        self.samples.clear();
        self.samples.reserve(ext.len());
        self.samples
            .extend(ext.offsets().map(|(dx, dy)| interpolate(img, cx + dx, cy + dy)));
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_at_integer() {
        let img = Image::from_vec(3, 3, (1..=9).map(|v| v as f32).collect());
        assert!((interpolate(&img, 0.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((interpolate(&img, 1.0, 1.0) - 5.0).abs() < 1e-6);
        assert!((interpolate(&img, 2.0, 2.0) - 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let img = Image::from_vec(2, 2, vec![0.0, 10.0, 20.0, 30.0]);
        assert!((interpolate(&img, 0.5, 0.5) - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_interpolate_clamps_to_edge() {
        let img = Image::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        assert!((interpolate(&img, 5.0, 5.0) - 4.0).abs() < 1e-6);
        assert!((interpolate(&img, -1.0, -1.0) - 1.0).abs() < 1e-6);
        // Right edge, halfway down: blends the right column.
        assert!((interpolate(&img, 1.0, 0.5) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_interpolate_single_column() {
        let img = Image::from_vec(1, 3, vec![0.0, 10.0, 20.0]);
        assert!((interpolate(&img, 0.7, 1.5) - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_nominal_extents() {
        let ext = HalfExtents::nominal(3, 2);
        assert_eq!((ext.cols(), ext.rows(), ext.len()), (7, 5, 35));
        assert_eq!(ext.offsets().count(), 35);
        assert_eq!(ext.offsets().next(), Some((-3.0, -2.0)));
        assert_eq!(ext.offsets().last(), Some((3.0, 2.0)));
    }

    #[test]
    fn test_clipped_extents() {
        // 20×10 raster, nominal 4×4.
        let ext = HalfExtents::clipped(4, 4, 20, 10, &[(2.5, 8.0)]);
        assert_eq!(ext, HalfExtents { left: 2, right: 4, top: 4, bottom: 1 });

        // The predicted location clips the other side.
        let ext = HalfExtents::clipped(4, 4, 20, 10, &[(10.0, 5.0), (17.2, 5.0)]);
        assert_eq!(ext.left, 4);
        assert_eq!(ext.right, 1);

        // Outside the raster: that side collapses to zero, never negative.
        let ext = HalfExtents::clipped(4, 4, 20, 10, &[(-3.0, 5.0)]);
        assert_eq!(ext.left, 0);
    }

    #[test]
    fn test_window_gather() {
        let img = Image::from_fn(10, 10, |x, y| (x + 10 * y) as f32);
        let mut win = Window::new();
        let samples = win.gather(&img, 5.0, 5.0, &HalfExtents::nominal(1, 1)).to_vec();
        assert_eq!(samples, vec![44.0, 45.0, 46.0, 54.0, 55.0, 56.0, 64.0, 65.0, 66.0]);

        // Reuse shrinks to the new extents.
        let samples = win.gather(&img, 5.5, 5.0, &HalfExtents { left: 0, right: 0, top: 0, bottom: 1 });
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 55.5).abs() < 1e-5);
    }
}
