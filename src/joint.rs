// joint.rs — Joint, spatially regularized pyramidal tracking.
//
// All features of a set are tracked together, one pyramid level at a time,
// coarse→fine. At each level the tracker runs up to `max_iterations`
// sweeps. One sweep:
//
//   1. For every active feature i, derive a regularization target from
//      its neighbors' current displacements:
//        - ≥ 6 neighbors, well spread     → weighted affine fit, evaluated
//                                            at feature i
//        - ≥ 4 neighbors, collinear-ish   → weighted mean displacement
//        - otherwise                      → no target
//   2. Take one Newton step on
//        (G + λI) · δ = e + λ·(target − d)      (plain KLT without target)
//   3. Check bounds.
//
// Sweeps are Jacobi-style. Step 1 reads only the displacement field as it
// was at the start of the sweep; the new displacements are collected into
// a separate buffer and written back after every feature has stepped. The
// result does not depend on slot order, and the per-feature step can run
// in parallel.
//
// A feature whose gradient matrix is (near) singular at a level does not
// step. After the sweeps it is moved once to its target, if it has one,
// and is lost as untrackable otherwise. This is what carries features on
// straight edges (aperture problem) along with their neighbors.
//
// Lost is final: once a feature fails within a call it stops stepping,
// stops serving as a neighbor, and is reported lost.
//
// NEW RUST CONCEPTS:
// - A closure that borrows several buffers immutably, used with either a
//   serial or a rayon iterator. The borrow ends at `collect()`, after
//   which the buffers can be written again.
// - `Option<&T>` via `as_ref()` to look into an `Option<T>` slot without
//   moving out of the Vec.

use log::{debug, trace};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::feature::{Feature, FeatureSet, TrackFailure, TrackSummary};
use crate::klt::{apply_outcome, check_inputs, converged, FeaturePatch};
use crate::linalg::{cholesky_solve, sym_eigen2, SymEigen2};
use crate::neighbors::{Neighbor, NeighborIndex};
use crate::pyramid::{level_scale, GradientPyramid, PyramidLevel};
use crate::sampler::Window;

/// Neighbors needed for an affine fit.
pub const MIN_AFFINE_NEIGHBORS: usize = 6;
/// Neighbors needed for a directional (mean) target.
pub const MIN_DIRECTIONAL_NEIGHBORS: usize = 4;
/// Neighbor layouts whose minor-axis variance is below this (full-resolution
/// px²) are degenerate.
const MIN_LAYOUT_VARIANCE: f64 = 1.0;
/// ...or whose minor/major variance ratio is below this.
const MIN_LAYOUT_RATIO: f64 = 1e-3;

/// A regularization target: the displacement a feature is pulled toward,
/// in the current level's units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// Affine fit of the neighbors' motion, evaluated at the feature.
    Affine(f32, f32),
    /// Weighted mean of the neighbors' displacements.
    Directional(f32, f32),
}

impl Target {
    pub fn displacement(&self) -> (f32, f32) {
        match *self {
            Target::Affine(u, v) | Target::Directional(u, v) => (u, v),
        }
    }
}

/// One weighted correspondence, relative to the feature being regularized.
#[derive(Debug, Clone, Copy)]
struct Sample {
    /// Neighbor position minus feature position (level units).
    p: (f64, f64),
    /// Neighbor displacement (level units).
    d: (f64, f64),
    w: f64,
}

/// Regularization target for a feature at `origin` (level units).
///
/// `pos` and `disp` are the level-unit positions and displacements of
/// every slot; only neighbors with `is_source[j]` contribute. Neighbor
/// distances are full-resolution, as is `affine_sigma`; `scale` converts
/// full resolution to the current level.
pub fn regularization_target(
    origin: (f32, f32),
    neighbors: &[Neighbor],
    pos: &[(f32, f32)],
    disp: &[(f32, f32)],
    is_source: &[bool],
    scale: f32,
    affine_sigma: f32,
) -> Option<Target> {
    let two_sigma2 = 2.0 * f64::from(affine_sigma).powi(2);
    let samples: Vec<Sample> = neighbors
        .iter()
        .filter(|n| is_source[n.index])
        .map(|n| {
            let (px, py) = pos[n.index];
            let (dx, dy) = disp[n.index];
            Sample {
                p: (f64::from(px - origin.0), f64::from(py - origin.1)),
                d: (f64::from(dx), f64::from(dy)),
                w: (-f64::from(n.distance).powi(2) / two_sigma2).exp(),
            }
        })
        .filter(|s| s.w > 0.0)
        .collect();

    if samples.len() < MIN_DIRECTIONAL_NEIGHBORS {
        return None;
    }

    let layout = layout_spread(&samples);
    let level_to_full = f64::from(scale).powi(-2);
    let degenerate =
        layout.min * level_to_full < MIN_LAYOUT_VARIANCE || layout.min < MIN_LAYOUT_RATIO * layout.max;

    if !degenerate {
        if samples.len() < MIN_AFFINE_NEIGHBORS {
            return None;
        }
        if let Some((u, v)) = affine_fit(&samples) {
            return Some(Target::Affine(u as f32, v as f32));
        }
        trace!("affine fit singular at {origin:?}, using mean displacement");
    } else {
        trace!(
            "degenerate layout at {origin:?} along ({:.2}, {:.2})",
            layout.major_axis.0,
            layout.major_axis.1
        );
    }

    let (u, v) = weighted_mean(&samples);
    Some(Target::Directional(u as f32, v as f32))
}

/// Eigen-decomposition of the weighted covariance of neighbor positions.
fn layout_spread(samples: &[Sample]) -> SymEigen2 {
    let sw: f64 = samples.iter().map(|s| s.w).sum();
    let mx = samples.iter().map(|s| s.w * s.p.0).sum::<f64>() / sw;
    let my = samples.iter().map(|s| s.w * s.p.1).sum::<f64>() / sw;
    let (mut cxx, mut cxy, mut cyy) = (0.0, 0.0, 0.0);
    for s in samples {
        let (x, y) = (s.p.0 - mx, s.p.1 - my);
        cxx += s.w * x * x;
        cxy += s.w * x * y;
        cyy += s.w * y * y;
    }
    sym_eigen2(cxx / sw, cxy / sw, cyy / sw)
}

/// Weighted least-squares fit of `d ≈ K·p + t`; returns `t`, the fitted
/// displacement at the feature itself (p = 0).
fn affine_fit(samples: &[Sample]) -> Option<(f64, f64)> {
    let mut n = [[0.0f64; 3]; 3];
    let mut bu = [0.0f64; 3];
    let mut bv = [0.0f64; 3];
    for s in samples {
        let row = [s.p.0, s.p.1, 1.0];
        for r in 0..3 {
            for c in 0..=r {
                n[r][c] += s.w * row[r] * row[c];
            }
            bu[r] += s.w * row[r] * s.d.0;
            bv[r] += s.w * row[r] * s.d.1;
        }
    }
    let u = cholesky_solve(&n, &bu)?;
    let v = cholesky_solve(&n, &bv)?;
    Some((u[2], v[2]))
}

fn weighted_mean(samples: &[Sample]) -> (f64, f64) {
    let sw: f64 = samples.iter().map(|s| s.w).sum();
    let u = samples.iter().map(|s| s.w * s.d.0).sum::<f64>() / sw;
    let v = samples.iter().map(|s| s.w * s.d.1).sum::<f64>() / sw;
    (u, v)
}

// ----------------------------------------------------------------------------
// Tracker
// ----------------------------------------------------------------------------

/// Result of one feature's step within a sweep.
#[derive(Debug, Clone, Copy)]
enum Step {
    Moved { d: (f32, f32), delta: (f32, f32), target: Option<Target> },
    Failed(TrackFailure),
}

/// Read-only data for one pyramid level.
struct Level<'a> {
    dst: &'a PyramidLevel,
    scale: f32,
    /// Frozen positions in level units.
    pos: Vec<(f32, f32)>,
    /// Source windows; `None` for slots that are not tracked at this level.
    patches: Vec<Option<FeaturePatch>>,
    /// Gradient matrix passed the determinant test.
    trackable: Vec<bool>,
}

/// Tracks a whole feature set with neighbor-coupled regularization.
#[derive(Debug, Clone)]
pub struct JointTracker {
    pub config: TrackerConfig,
}

impl JointTracker {
    pub fn new(config: TrackerConfig) -> Self {
        JointTracker { config }
    }

    /// Track `features` from `prev` to `curr` in place.
    ///
    /// Slots that are `Lost` on entry are skipped and stay `Lost`. Fails
    /// only on configuration or input-shape errors, before touching any
    /// feature.
    pub fn track(
        &self,
        prev: &GradientPyramid,
        curr: &GradientPyramid,
        features: &mut FeatureSet,
    ) -> Result<TrackSummary> {
        check_inputs(&self.config, prev, curr)?;
        let cfg = &self.config;
        let n = features.len();

        let neighbors = NeighborIndex::build(features, cfg.neighbor_radius);
        let entered: Vec<bool> = features.iter().map(Feature::is_valid).collect();
        let mut lost: Vec<Option<TrackFailure>> = vec![None; n];
        let mut d = vec![(0.0f32, 0.0f32); n];

        debug!(
            "joint: {} features, {} neighbor pairs, {} levels",
            entered.iter().filter(|&&v| v).count(),
            neighbors.pair_count(),
            cfg.pyramid_levels
        );

        for level_idx in (0..cfg.pyramid_levels).rev() {
            let level = self.prepare_level(prev, curr, level_idx, features, &entered, &d, &mut lost);
            let sweeps = self.run_sweeps(&level, &neighbors, &mut d, &mut lost);
            let rescued = self.rescue_untrackable(&level, &neighbors, &mut d, &mut lost);
            trace!("level {level_idx}: {sweeps} sweeps, {rescued} rescued");

            if level_idx == 0 {
                let mut win = Window::new();
                for i in 0..n {
                    if lost[i].is_some() {
                        continue;
                    }
                    if let Some(patch) = &level.patches[i] {
                        if patch.residue(level.dst, d[i], &mut win) > cfg.max_residue {
                            lost[i] = Some(TrackFailure::HighResidue);
                        }
                    }
                }
            } else {
                for di in d.iter_mut() {
                    *di = (2.0 * di.0, 2.0 * di.1);
                }
            }
        }

        let mut summary = TrackSummary::default();
        for (i, feature) in features.iter_mut().enumerate() {
            if !entered[i] {
                summary.skipped += 1;
                continue;
            }
            let outcome = match lost[i] {
                Some(reason) => Err(reason),
                None => Ok(d[i]),
            };
            apply_outcome(feature, outcome, &mut summary);
        }

        debug!(
            "joint: {} tracked, {} lost ({} untrackable, {} out of bounds, {} high residue)",
            summary.tracked,
            summary.lost(),
            summary.untrackable,
            summary.out_of_bounds,
            summary.high_residue
        );
        Ok(summary)
    }

    /// Seed bounds check and source windows for one level.
    #[allow(clippy::too_many_arguments)]
    fn prepare_level<'a>(
        &self,
        prev: &GradientPyramid,
        curr: &'a GradientPyramid,
        level_idx: usize,
        features: &FeatureSet,
        entered: &[bool],
        d: &[(f32, f32)],
        lost: &mut [Option<TrackFailure>],
    ) -> Level<'a> {
        let cfg = &self.config;
        let scale = level_scale(level_idx);
        let (src, dst) = (prev.level(level_idx), curr.level(level_idx));
        let pos: Vec<(f32, f32)> = features.iter().map(|f| (f.x * scale, f.y * scale)).collect();

        let n = features.len();
        let mut patches = vec![None; n];
        let mut trackable = vec![false; n];
        for i in 0..n {
            if !entered[i] || lost[i].is_some() {
                continue;
            }
            let (x, y) = pos[i];
            if !dst.contains(x + d[i].0, y + d[i].1) {
                lost[i] = Some(TrackFailure::OutOfBounds);
                continue;
            }
            let patch = FeaturePatch::prepare(src, x, y, d[i], cfg.window_half_width, cfg.window_half_height);
            trackable[i] = patch.det() >= cfg.small_determinant_threshold;
            patches[i] = Some(patch);
        }

        Level { dst, scale, pos, patches, trackable }
    }

    /// Features that step and act as neighbors in the next sweep.
    fn sources(level: &Level, lost: &[Option<TrackFailure>]) -> Vec<bool> {
        level.trackable.iter().zip(lost).map(|(&t, l)| t && l.is_none()).collect()
    }

    /// Jacobi sweeps at one level. Returns the number of sweeps run.
    fn run_sweeps(
        &self,
        level: &Level,
        neighbors: &NeighborIndex,
        d: &mut [(f32, f32)],
        lost: &mut [Option<TrackFailure>],
    ) -> usize {
        let cfg = &self.config;
        let reg = (cfg.affine_sigma, cfg.regularization_lambda);

        for sweep in 0..cfg.max_iterations {
            let is_source = Self::sources(level, lost);
            let snapshot: &[(f32, f32)] = d;

            let step = |i: usize| -> Option<Step> {
                if !is_source[i] {
                    return None;
                }
                let patch = level.patches[i].as_ref()?;
                let target = regularization_target(
                    level.pos[i],
                    neighbors.neighbors(i),
                    &level.pos,
                    snapshot,
                    &is_source,
                    level.scale,
                    reg.0,
                );
                let mut win = Window::new();
                let di = snapshot[i];
                let delta = match patch.step(level.dst, di, target.map(|t| (t.displacement(), reg.1)), &mut win) {
                    Some(delta) => delta,
                    None => return Some(Step::Failed(TrackFailure::Untrackable)),
                };
                let moved = (di.0 + delta.0, di.1 + delta.1);
                if level.dst.contains(level.pos[i].0 + moved.0, level.pos[i].1 + moved.1) {
                    Some(Step::Moved { d: moved, delta, target })
                } else {
                    Some(Step::Failed(TrackFailure::OutOfBounds))
                }
            };

            #[cfg(feature = "rayon")]
            let steps: Vec<Option<Step>> = (0..d.len()).into_par_iter().map(step).collect();
            #[cfg(not(feature = "rayon"))]
            let steps: Vec<Option<Step>> = (0..d.len()).map(step).collect();

            let (mut settled, mut affine, mut directional, mut max_step) = (true, 0usize, 0usize, 0.0f32);
            for (i, s) in steps.into_iter().enumerate() {
                match s {
                    None => {}
                    Some(Step::Failed(reason)) => lost[i] = Some(reason),
                    Some(Step::Moved { d: moved, delta, target }) => {
                        d[i] = moved;
                        settled &= converged(delta, cfg.min_displacement_epsilon);
                        max_step = max_step.max(delta.0.abs()).max(delta.1.abs());
                        match target {
                            Some(Target::Affine(..)) => affine += 1,
                            Some(Target::Directional(..)) => directional += 1,
                            None => {}
                        }
                    }
                }
            }
            trace!("sweep {sweep}: max |δ| {max_step:.4}, {affine} affine, {directional} directional targets");

            if settled {
                return sweep + 1;
            }
        }
        cfg.max_iterations
    }

    /// Move every untrackable feature to its neighbors' target, once.
    ///
    /// Targets are computed from the final displacement field of the level
    /// before any rescued feature is moved. Returns the number rescued.
    fn rescue_untrackable(
        &self,
        level: &Level,
        neighbors: &NeighborIndex,
        d: &mut [(f32, f32)],
        lost: &mut [Option<TrackFailure>],
    ) -> usize {
        let is_source = Self::sources(level, lost);
        let (snapshot, failed): (&[(f32, f32)], &[Option<TrackFailure>]) = (d, lost);
        let pending: Vec<(usize, Option<Target>)> = (0..snapshot.len())
            .filter(|&i| level.patches[i].is_some() && !level.trackable[i] && failed[i].is_none())
            .map(|i| {
                let target = regularization_target(
                    level.pos[i],
                    neighbors.neighbors(i),
                    &level.pos,
                    snapshot,
                    &is_source,
                    level.scale,
                    self.config.affine_sigma,
                );
                (i, target)
            })
            .collect();

        let mut rescued = 0;
        for (i, target) in pending {
            match target {
                Some(t) => {
                    let moved = t.displacement();
                    if level.dst.contains(level.pos[i].0 + moved.0, level.pos[i].1 + moved.1) {
                        d[i] = moved;
                        rescued += 1;
                    } else {
                        lost[i] = Some(TrackFailure::OutOfBounds);
                    }
                }
                None => lost[i] = Some(TrackFailure::Untrackable),
            }
        }
        rescued
    }
}
