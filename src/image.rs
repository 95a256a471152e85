// image.rs — Raster container for frames, masks and derived planes.
//
// The tracker never holds on to a caller's frame after the call returns. It
// reads the frame through `Image<T>` and converts to f32 gray levels once,
// while building the gradient pyramid; from then on every plane (smoothed
// intensity, gradients, corner scores) is an `Image<f32>`. Detection masks
// are `Image<u8>`.
//
// Layout: row-major, tightly packed. Pixel (x, y) sits at `y * width + x`.
//
// NEW RUST CONCEPTS:
// - A trait bound on the struct (`T: Pixel`) so every method can rely on
//   `to_f32` and `Copy`.
// - Indexing with a tuple: `img[(x, y)]` through `std::ops::Index`.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Sample types a frame may arrive in.
///
/// Conversion is a plain cast: no normalization, so thresholds such as
/// `max_residue` and `min_cornerness` are in the input's gray levels.
pub trait Pixel: Copy + Default + PartialOrd + Send + Sync + 'static {
    fn to_f32(self) -> f32;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Pixel for u16 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

/// A `width × height` raster of `T`.
#[derive(Clone, PartialEq)]
pub struct Image<T: Pixel> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Image<T> {
    /// All-default (zero) raster.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Image { data: vec![value; width * height], width, height }
    }

    /// Wrap a row-major buffer, e.g. a decoded camera frame.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert!(
            data.len() == width * height,
            "data length ({}) must equal width * height ({width}×{height})",
            data.len(),
        );
        Image { data, width, height }
    }

    /// Evaluate `f(x, y)` at every pixel in scan order.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let data = (0..height).flat_map(|y| (0..width).map(move |x| (x, y))).map(|(x, y)| f(x, y)).collect();
        Image { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// No pixels: either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// # Panics
    /// Panics if (x, y) is outside the raster.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self[(x, y)]
    }

    /// # Panics
    /// Panics if (x, y) is outside the raster.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self[(x, y)] = value;
    }

    /// Pixel with coordinates clamped to the nearest edge (replicate border).
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> T {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[self.offset(cx, cy)]
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds for height {}", self.height);
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// `(x, y, value)` for every pixel in scan order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let w = self.width.max(1);
        self.data.iter().enumerate().map(move |(i, &v)| (i % w, i / w, v))
    }

    /// Per-pixel conversion into a new raster of the same size.
    pub fn map<U: Pixel>(&self, f: impl FnMut(T) -> U) -> Image<U> {
        Image { data: self.data.iter().copied().map(f).collect(), width: self.width, height: self.height }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    fn checked_offset(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for {}×{} raster",
            self.width,
            self.height,
        );
        self.offset(x, y)
    }
}

impl<T: Pixel> Index<(usize, usize)> for Image<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        &self.data[self.checked_offset(x, y)]
    }
}

impl<T: Pixel> IndexMut<(usize, usize)> for Image<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        let i = self.checked_offset(x, y);
        &mut self.data[i]
    }
}

/// Prints the size and value range, not the pixels.
impl<T: Pixel> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo, hi) = self
            .data
            .iter()
            .map(|v| v.to_f32())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        f.debug_struct("Image")
            .field("type", &std::any::type_name::<T>())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("range", &(lo, hi))
            .finish()
    }
}
