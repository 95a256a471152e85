// cornerness.rs — Structure-tensor corner scoring and candidate extraction.
//
// For every interior pixel the 2×2 structure tensor is summed over the
// 3×3 neighborhood of the level-0 gradients (no weighting, no
// normalization):
//
//   Gxx = Σ gx²    Gxy = Σ gx·gy    Gyy = Σ gy²
//
// and turned into a scalar by the configured `CornernessMeasure`.
//
// A pixel is a candidate if its score exceeds `min_cornerness` and is a
// local maximum over its 8-neighborhood. Plateaus are resolved in scan
// order: a pixel must beat (strictly) every neighbor scanned before it and
// tie-or-beat every neighbor scanned after it, so on a flat top only the
// first pixel in raster order survives.
//
// NEW RUST CONCEPTS:
// - `impl` blocks on an enum defined in another module (config.rs). Enums
//   get methods like structs do, and `match self` dispatches per variant.
// - `sort_by` is a stable sort, which keeps scan order among equal scores.

use log::debug;

use crate::config::TrackerConfig;
pub use crate::config::CornernessMeasure;
use crate::error::{Result, TrackerError};
use crate::feature::{Feature, FeatureSet};
use crate::image::Image;
use crate::linalg::{max_eigenvalue, min_eigenvalue};
use crate::pyramid::PyramidLevel;

impl CornernessMeasure {
    /// Score of the structure tensor `[gxx gxy; gxy gyy]`.
    pub fn score(&self, gxx: f32, gxy: f32, gyy: f32) -> f32 {
        match *self {
            CornernessMeasure::MinEigenvalue => min_eigenvalue(gxx, gxy, gyy),
            CornernessMeasure::Blend { alpha } => {
                (1.0 - alpha) * min_eigenvalue(gxx, gxy, gyy) + alpha * max_eigenvalue(gxx, gxy, gyy)
            }
            CornernessMeasure::Harris { k } => {
                let trace = gxx + gyy;
                gxx * gyy - gxy * gxy - k * trace * trace
            }
            CornernessMeasure::TraceDeterminant => {
                let trace = gxx + gyy;
                if trace > 0.0 {
                    (gxx * gyy - gxy * gxy) / trace
                } else {
                    0.0
                }
            }
        }
    }
}

/// A candidate feature location (integer pixel, level 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

/// Scores pixels and extracts ranked candidate features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerScorer {
    pub measure: CornernessMeasure,
    /// Candidates must score strictly above this.
    pub min_cornerness: f32,
}

impl CornerScorer {
    pub fn new(measure: CornernessMeasure, min_cornerness: f32) -> Self {
        CornerScorer { measure, min_cornerness }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.cornerness_measure, config.min_cornerness)
    }

    /// Per-pixel score. Pixels without a full 3×3 neighborhood score 0.
    pub fn score_map(&self, level: &PyramidLevel) -> Image<f32> {
        let (w, h) = level.image.dims();
        let mut scores = Image::new(w, h);
        if w < 3 || h < 3 {
            return scores;
        }

        let (gx, gy) = (&level.grad_x, &level.grad_y);
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
                for yy in y - 1..=y + 1 {
                    let (rx, ry) = (&gx.row(yy)[x - 1..=x + 1], &gy.row(yy)[x - 1..=x + 1]);
                    for (&a, &b) in rx.iter().zip(ry) {
                        gxx += a * a;
                        gxy += a * b;
                        gyy += b * b;
                    }
                }
                scores.set(x, y, self.measure.score(gxx, gxy, gyy));
            }
        }
        scores
    }

    /// All candidates, sorted by descending score (scan order among ties).
    ///
    /// With a mask, only pixels where `mask > 0` can become candidates;
    /// masked pixels still take part in the neighborhood comparison.
    pub fn candidates(&self, level: &PyramidLevel, mask: Option<&Image<u8>>) -> Result<Vec<Candidate>> {
        let (w, h) = level.image.dims();
        if let Some(m) = mask {
            if m.dims() != (w, h) {
                return Err(TrackerError::MaskSizeMismatch { mask: m.dims(), image: (w, h) });
            }
        }

        let scores = self.score_map(level);
        let mut out = Vec::new();
        if w < 3 || h < 3 {
            return Ok(out);
        }

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let s = scores.get(x, y);
                if s.is_nan() || s <= self.min_cornerness {
                    continue;
                }
                if mask.map_or(false, |m| m.get(x, y) == 0) {
                    continue;
                }
                if is_local_max(&scores, x, y, s) {
                    out.push(Candidate { x, y, score: s });
                }
            }
        }

        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!("corner scorer: {} candidates on {}×{}", out.len(), w, h);
        Ok(out)
    }

    /// The `k` best candidates as a feature set of exactly `k` slots.
    ///
    /// Slots past the number of candidates are `Lost` sentinels.
    pub fn top_k(&self, level: &PyramidLevel, k: usize, mask: Option<&Image<u8>>) -> Result<FeatureSet> {
        let mut set = FeatureSet::with_slots(k);
        for (slot, c) in self.candidates(level, mask)?.into_iter().take(k).enumerate() {
            set[slot] = Feature::new(c.x as f32, c.y as f32, c.score);
        }
        Ok(set)
    }
}

/// Scan-order local-maximum test over the interior 8-neighborhood.
fn is_local_max(scores: &Image<f32>, x: usize, y: usize, s: f32) -> bool {
    let (w, h) = scores.dims();
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if (nx, ny) == (x, y) || nx == 0 || ny == 0 || nx == w - 1 || ny == h - 1 {
                continue;
            }
            let n = scores.get(nx, ny);
            let earlier = ny < y || (ny == y && nx < x);
            if (earlier && n >= s) || (!earlier && n > s) {
                return false;
            }
        }
    }
    true
}
