// convolution.rs — Separable filtering used by pyramid smoothing and Sobel.
//
// A 2D kernel K = k_col * k_row^T is applied as a horizontal pass followed
// by a vertical pass, O(2k) per pixel instead of O(k²).
//
// BORDER HANDLING: clamp (replicate edge pixels). The pyramid smoothing and
// the gradient operator both inherit this, so a constant image stays
// constant and has exactly zero gradient everywhere, borders included.

use crate::image::{Image, Pixel};

/// Horizontal pass: every row filtered with the centered, odd-length
/// `kernel` (center tap at `len / 2`).
///
/// # Panics
/// Panics if the kernel is empty or has even length.
pub fn convolve_rows<T: Pixel>(src: &Image<T>, kernel: &[f32]) -> Image<f32> {
    check_kernel(kernel);
    let (w, h) = src.dims();
    let half = kernel.len() / 2;

    Image::from_fn(w, h, |x, y| {
        if x >= half && x + half < w {
            // Interior: the whole tap range lies inside the row.
            let row = &src.row(y)[x - half..=x + half];
            row.iter().zip(kernel).map(|(&v, &k)| v.to_f32() * k).sum()
        } else {
            kernel
                .iter()
                .enumerate()
                .map(|(ki, &k)| {
                    let sx = x as isize + ki as isize - half as isize;
                    src.get_clamped(sx, y as isize).to_f32() * k
                })
                .sum()
        }
    })
}

/// Vertical pass over an f32 plane.
///
/// # Panics
/// Panics if the kernel is empty or has even length.
pub fn convolve_cols(src: &Image<f32>, kernel: &[f32]) -> Image<f32> {
    check_kernel(kernel);
    let (w, h) = src.dims();
    let half = kernel.len() / 2;

    Image::from_fn(w, h, |x, y| {
        kernel
            .iter()
            .enumerate()
            .map(|(ki, &k)| {
                let sy = y as isize + ki as isize - half as isize;
                src.get_clamped(x as isize, sy) * k
            })
            .sum()
    })
}

/// Row pass with `kernel_row`, then column pass with `kernel_col` on the
/// f32 intermediate. A symmetric blur passes the same kernel twice.
pub fn convolve_separable<T: Pixel>(src: &Image<T>, kernel_row: &[f32], kernel_col: &[f32]) -> Image<f32> {
    convolve_cols(&convolve_rows(src, kernel_row), kernel_col)
}

/// Sampled Gaussian `exp(-i² / 2σ²)` for `i` in `-half_size..=half_size`,
/// scaled to unit sum so smoothing preserves mean intensity.
///
/// ```
/// let g = coupled_klt::convolution::gaussian_kernel_1d(3, 1.0);
/// assert_eq!(g.len(), 7);
/// assert!((g.iter().sum::<f32>() - 1.0).abs() < 1e-6);
/// ```
pub fn gaussian_kernel_1d(half_size: usize, sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "sigma must be positive (got {sigma})");
    let denom = 2.0 * sigma * sigma;
    let raw: Vec<f32> = (-(half_size as isize)..=half_size as isize)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let total: f32 = raw.iter().sum();
    raw.into_iter().map(|v| v / total).collect()
}

/// Half-size covering ±3σ, at least 1 tap on each side.
pub fn gaussian_half_size(sigma: f32) -> usize {
    (3.0 * sigma).ceil().max(1.0) as usize
}

fn check_kernel(kernel: &[f32]) {
    assert!(!kernel.is_empty(), "kernel must not be empty");
    assert!(kernel.len() % 2 == 1, "kernel length must be odd (got {})", kernel.len());
}
