// linalg.rs — Tiny dense solvers for the tracker's fixed-size systems.
//
// Two sizes occur:
//   2×2 symmetric: the per-feature gradient matrix [Gxx Gxy; Gxy Gyy],
//                  and the covariance of a neighbor layout.
//   3×3 symmetric: the weighted normal equations of a 2-D affine fit.
//                  The 6-parameter problem splits into two 3-parameter
//                  problems (one per output axis) sharing one matrix.
//
// All are symmetric positive (semi-)definite, so the 2×2 case uses the
// closed-form inverse and the rest use Cholesky. Nothing here allocates.

/// Solve `[a b; b c] · [x; y] = [u; v]` with the closed-form inverse.
///
/// Returns `None` if the determinant is zero or not finite.
#[inline]
pub fn solve_sym2(a: f32, b: f32, c: f32, u: f32, v: f32) -> Option<(f32, f32)> {
    let det = a * c - b * b;
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    Some(((c * u - b * v) / det, (a * v - b * u) / det))
}

/// Eigen-decomposition of the symmetric matrix `[a b; b c]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymEigen2 {
    /// Smaller eigenvalue.
    pub min: f64,
    /// Larger eigenvalue.
    pub max: f64,
    /// Unit eigenvector of `max` (the dominant direction), as (cos θ, sin θ).
    pub major_axis: (f64, f64),
}

/// Closed-form eigenvalues and dominant axis of `[a b; b c]`.
pub fn sym_eigen2(a: f64, b: f64, c: f64) -> SymEigen2 {
    let half_trace = 0.5 * (a + c);
    let half_diff = 0.5 * (a - c);
    let root = (half_diff * half_diff + b * b).sqrt();
    // θ of the major axis; atan2 handles the isotropic case (θ = 0).
    let theta = 0.5 * (2.0 * b).atan2(a - c);
    SymEigen2 {
        min: half_trace - root,
        max: half_trace + root,
        major_axis: (theta.cos(), theta.sin()),
    }
}

/// Minimum eigenvalue of the 2×2 structure tensor, in f32.
///
/// `(Gxx + Gyy − sqrt((Gxx − Gyy)² + 4·Gxy²)) / 2`
#[inline]
pub fn min_eigenvalue(gxx: f32, gxy: f32, gyy: f32) -> f32 {
    let diff = gxx - gyy;
    0.5 * (gxx + gyy - (diff * diff + 4.0 * gxy * gxy).sqrt())
}

/// Maximum eigenvalue of the 2×2 structure tensor, in f32.
#[inline]
pub fn max_eigenvalue(gxx: f32, gxy: f32, gyy: f32) -> f32 {
    let diff = gxx - gyy;
    0.5 * (gxx + gyy + (diff * diff + 4.0 * gxy * gxy).sqrt())
}

/// Solve `A · x = b` for symmetric positive-definite `A` by Cholesky.
///
/// Only the lower triangle of `a` is read. Returns `None` when a pivot is
/// not comfortably positive, i.e. the system is (numerically) singular.
pub fn cholesky_solve<const N: usize>(a: &[[f64; N]; N], b: &[f64; N]) -> Option<[f64; N]> {
    let mut l = [[0.0f64; N]; N];
    let scale = (0..N).map(|i| a[i][i].abs()).fold(0.0f64, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tiny = scale * 1e-12;

    for i in 0..N {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= tiny {
                    return None;
                }
                l[i][i] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Forward substitution: L y = b.
    let mut y = [0.0f64; N];
    for i in 0..N {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i][k] * y[k];
        }
        y[i] = sum / l[i][i];
    }

    // Back substitution: Lᵀ x = y.
    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = y[i];
        for k in (i + 1)..N {
            sum -= l[k][i] * x[k];
        }
        x[i] = sum / l[i][i];
    }
    Some(x)
}
