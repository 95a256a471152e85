// klt.rs — Pyramidal KLT (Kanade-Lucas-Tomasi) feature tracker.
//
// Per feature, per pyramid level (coarse→fine), Newton iteration on the
// 2×2 normal equations of the brightness-constancy error:
//
//   G · δ = e,   G = Σ [Ix²  IxIy; IxIy  Iy²],   e = Σ [Ix; Iy] · (I1 − I2)
//
// where I1 is the source window (frame A, fixed for the level), I2 the
// target window at the current estimate (frame B), and Ix, Iy the source
// gradients. Gradients are sampled once per level, so G is constant while
// iterating and only the error vector is recomputed (inverse-compositional
// style for pure translation).
//
// The displacement d is kept in the current level's units. It starts at 0
// on the coarsest level and is doubled on the way down.
//
// The per-level problem (`FeaturePatch`) is shared with the joint tracker,
// which adds a regularization term to the same system:
//
//   (G + λI) · δ = e + λ·(target − d)
//
// NEW RUST CONCEPTS:
// - `Result<T, E>` used as a per-item outcome rather than a propagated
//   error: a lost feature is data, not a failure of the call.
// - `#[cfg(feature = "rayon")]` selects between a parallel and a serial
//   iterator at compile time; both collect into the same Vec.

use log::debug;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::feature::{Feature, FeatureSet, FeatureStatus, TrackFailure, TrackSummary};
use crate::linalg::solve_sym2;
use crate::pyramid::{level_scale, GradientPyramid, PyramidLevel};
use crate::sampler::{HalfExtents, Window};

/// Outcome of tracking one feature: full-resolution displacement or the
/// reason it was lost.
pub type TrackOutcome = std::result::Result<(f32, f32), TrackFailure>;

// ----------------------------------------------------------------------------
// Per-level problem
// ----------------------------------------------------------------------------

/// Source-side data for one feature at one pyramid level.
///
/// Built once per level: the (possibly asymmetric) window, the source
/// intensities and gradients, and the gradient matrix.
#[derive(Debug, Clone)]
pub struct FeaturePatch {
    /// Source position in level coordinates.
    pub x: f32,
    pub y: f32,
    pub extents: HalfExtents,
    template: Vec<f32>,
    grad_x: Vec<f32>,
    grad_y: Vec<f32>,
    pub gxx: f32,
    pub gxy: f32,
    pub gyy: f32,
}

impl FeaturePatch {
    /// Sample the source window at `(x, y)` on `level`.
    ///
    /// The nominal `half_width × half_height` window is shrunk on any side
    /// where the source point or the predicted point `(x, y) + seed` lies
    /// closer to the border than the nominal half-extent.
    pub fn prepare(
        level: &PyramidLevel,
        x: f32,
        y: f32,
        seed: (f32, f32),
        half_width: usize,
        half_height: usize,
    ) -> Self {
        let extents = HalfExtents::clipped(
            half_width,
            half_height,
            level.width(),
            level.height(),
            &[(x, y), (x + seed.0, y + seed.1)],
        );

        let mut win = Window::new();
        let template = win.gather(&level.image, x, y, &extents).to_vec();
        let grad_x = win.gather(&level.grad_x, x, y, &extents).to_vec();
        let grad_y = win.gather(&level.grad_y, x, y, &extents).to_vec();

        let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
        for (&ix, &iy) in grad_x.iter().zip(&grad_y) {
            gxx += ix * ix;
            gxy += ix * iy;
            gyy += iy * iy;
        }

        FeaturePatch { x, y, extents, template, grad_x, grad_y, gxx, gxy, gyy }
    }

    /// Determinant of the gradient matrix.
    #[inline]
    pub fn det(&self) -> f32 {
        self.gxx * self.gyy - self.gxy * self.gxy
    }

    /// Error vector `e = Σ ∇I1 · (I1 − I2)` with the target window at `d`.
    pub fn error_vector(&self, target: &PyramidLevel, d: (f32, f32), win: &mut Window) -> (f32, f32) {
        let moved = win.gather(&target.image, self.x + d.0, self.y + d.1, &self.extents);
        let (mut ex, mut ey) = (0.0f32, 0.0f32);
        for ((&i1, &i2), (&ix, &iy)) in self.template.iter().zip(moved).zip(self.grad_x.iter().zip(&self.grad_y)) {
            let diff = i1 - i2;
            ex += ix * diff;
            ey += iy * diff;
        }
        (ex, ey)
    }

    /// One Newton update δ at the current estimate `d`.
    ///
    /// With `reg = Some((target, λ))` the system is augmented with the
    /// regularization term. `None` if the system is singular.
    pub fn step(
        &self,
        target: &PyramidLevel,
        d: (f32, f32),
        reg: Option<((f32, f32), f32)>,
        win: &mut Window,
    ) -> Option<(f32, f32)> {
        let (ex, ey) = self.error_vector(target, d, win);
        match reg {
            None => solve_sym2(self.gxx, self.gxy, self.gyy, ex, ey),
            Some(((ubar, vbar), lambda)) => solve_sym2(
                self.gxx + lambda,
                self.gxy,
                self.gyy + lambda,
                ex + lambda * (ubar - d.0),
                ey + lambda * (vbar - d.1),
            ),
        }
    }

    /// Mean squared intensity difference between the source window and
    /// the target window at `d`.
    pub fn residue(&self, target: &PyramidLevel, d: (f32, f32), win: &mut Window) -> f32 {
        let moved = win.gather(&target.image, self.x + d.0, self.y + d.1, &self.extents);
        let ssd: f32 = self.template.iter().zip(moved).map(|(a, b)| (a - b) * (a - b)).sum();
        ssd / self.template.len() as f32
    }
}

/// True once both components of an update are below `epsilon`.
#[inline]
pub(crate) fn converged(delta: (f32, f32), epsilon: f32) -> bool {
    delta.0.abs() < epsilon && delta.1.abs() < epsilon
}

/// Fatal checks shared by every tracking entry point.
pub(crate) fn check_inputs(
    config: &TrackerConfig,
    prev: &GradientPyramid,
    curr: &GradientPyramid,
) -> Result<()> {
    config.validate()?;
    if prev.dims() != curr.dims() {
        return Err(TrackerError::FrameSizeMismatch { a: prev.dims(), b: curr.dims() });
    }
    if prev.num_levels() != curr.num_levels() {
        return Err(TrackerError::PyramidDepthMismatch { a: prev.num_levels(), b: curr.num_levels() });
    }
    if prev.num_levels() < config.pyramid_levels {
        return Err(TrackerError::PyramidTooShallow {
            requested: config.pyramid_levels,
            available: prev.num_levels(),
        });
    }
    Ok(())
}

/// Write a tracking outcome back into its slot.
///
/// A tracked feature moves by `d`; a lost one keeps its position.
pub(crate) fn apply_outcome(feature: &mut Feature, outcome: TrackOutcome, summary: &mut TrackSummary) {
    match outcome {
        Ok(d) => {
            feature.x += d.0;
            feature.y += d.1;
            feature.last_displacement = d;
            feature.status = FeatureStatus::Tracked;
            feature.failure = None;
            summary.tracked += 1;
        }
        Err(reason) => {
            feature.lose(reason);
            summary.record(reason);
        }
    }
}

// ----------------------------------------------------------------------------
// Independent tracker
// ----------------------------------------------------------------------------

/// Pyramidal KLT tracker: every feature tracked on its own.
#[derive(Debug, Clone)]
pub struct KltTracker {
    pub config: TrackerConfig,
}

impl KltTracker {
    pub fn new(config: TrackerConfig) -> Self {
        KltTracker { config }
    }

    /// Track `features` from `prev` to `curr` in place.
    ///
    /// Slots that are `Lost` on entry are skipped. Fails only on
    /// configuration or input-shape errors, before touching any feature.
    pub fn track(
        &self,
        prev: &GradientPyramid,
        curr: &GradientPyramid,
        features: &mut FeatureSet,
    ) -> Result<TrackSummary> {
        check_inputs(&self.config, prev, curr)?;

        let track = |f: &Feature| f.is_valid().then(|| self.track_one(prev, curr, f.x, f.y));
        #[cfg(feature = "rayon")]
        let outcomes: Vec<Option<TrackOutcome>> = features.as_slice().par_iter().map(track).collect();
        #[cfg(not(feature = "rayon"))]
        let outcomes: Vec<Option<TrackOutcome>> = features.iter().map(track).collect();

        let mut summary = TrackSummary::default();
        for (feature, outcome) in features.iter_mut().zip(outcomes) {
            match outcome {
                Some(outcome) => apply_outcome(feature, outcome, &mut summary),
                None => summary.skipped += 1,
            }
        }

        debug!(
            "klt: {} tracked, {} lost ({} untrackable, {} out of bounds, {} high residue)",
            summary.tracked,
            summary.lost(),
            summary.untrackable,
            summary.out_of_bounds,
            summary.high_residue
        );
        Ok(summary)
    }

    /// Track one feature at full-resolution position `(x, y)`.
    ///
    /// Returns the full-resolution displacement.
    pub fn track_one(&self, prev: &GradientPyramid, curr: &GradientPyramid, x: f32, y: f32) -> TrackOutcome {
        let cfg = &self.config;
        let mut win = Window::new();
        let mut d = (0.0f32, 0.0f32);

        for level in (0..cfg.pyramid_levels).rev() {
            let scale = level_scale(level);
            let (sx, sy) = (x * scale, y * scale);
            let (src, dst) = (prev.level(level), curr.level(level));

            if !dst.contains(sx + d.0, sy + d.1) {
                return Err(TrackFailure::OutOfBounds);
            }

            let patch = FeaturePatch::prepare(src, sx, sy, d, cfg.window_half_width, cfg.window_half_height);
            if patch.det() < cfg.small_determinant_threshold {
                return Err(TrackFailure::Untrackable);
            }

            for _ in 0..cfg.max_iterations {
                let delta = patch.step(dst, d, None, &mut win).ok_or(TrackFailure::Untrackable)?;
                d = (d.0 + delta.0, d.1 + delta.1);
                if !dst.contains(sx + d.0, sy + d.1) {
                    return Err(TrackFailure::OutOfBounds);
                }
                if converged(delta, cfg.min_displacement_epsilon) {
                    break;
                }
            }

            if level == 0 {
                if patch.residue(dst, d, &mut win) > cfg.max_residue {
                    return Err(TrackFailure::HighResidue);
                }
            } else {
                d = (2.0 * d.0, 2.0 * d.1);
            }
        }

        Ok(d)
    }
}
