// replace.rs — Refill lost feature slots with fresh detections.
//
// Algorithm:
//   1. Score level 0 of the frame and collect candidates, best first.
//   2. Mark every currently valid feature in an occupancy grid whose cell
//      size is `min_feature_separation`.
//   3. For each Lost slot in index order, take the next candidate the grid
//      accepts, place it in the slot (status New) and mark it.
//
// Candidates are consumed in score order across slots, so the strongest
// free corner goes to the lowest free slot. When candidates run out the
// remaining slots stay Lost.

use log::debug;

use crate::config::TrackerConfig;
use crate::cornerness::CornerScorer;
use crate::error::Result;
use crate::feature::{Feature, FeatureSet, FeatureStatus};
use crate::image::Image;
use crate::occupancy::OccupancyGrid;
use crate::pyramid::GradientPyramid;

/// Fills `Lost` slots of a feature set from corner candidates.
#[derive(Debug, Clone)]
pub struct FeatureReplacer {
    pub config: TrackerConfig,
}

impl FeatureReplacer {
    pub fn new(config: TrackerConfig) -> Self {
        FeatureReplacer { config }
    }

    /// Replace lost features in `features` using candidates from `pyramid`.
    ///
    /// `mask`, if given, must match the image size; detection happens only
    /// where it is nonzero. Returns the number of slots filled.
    pub fn replace(
        &self,
        pyramid: &GradientPyramid,
        features: &mut FeatureSet,
        mask: Option<&Image<u8>>,
    ) -> Result<usize> {
        self.config.validate()?;

        let lost = features.count(FeatureStatus::Lost);
        if lost == 0 {
            return Ok(0);
        }

        let scorer = CornerScorer::from_config(&self.config);
        let candidates = scorer.candidates(pyramid.level(0), mask)?;

        let (w, h) = pyramid.dims();
        let mut grid = OccupancyGrid::new(w, h, self.config.min_feature_separation);
        for (_, f) in features.valid() {
            grid.mark(f.x, f.y);
        }

        let mut next = candidates.iter();
        let mut filled = 0;
        'slots: for slot in features.iter_mut().filter(|f| f.status == FeatureStatus::Lost) {
            for c in next.by_ref() {
                let (x, y) = (c.x as f32, c.y as f32);
                if grid.accepts(x, y) {
                    grid.mark(x, y);
                    *slot = Feature::new(x, y, c.score);
                    filled += 1;
                    continue 'slots;
                }
            }
            break;
        }

        debug!(
            "replace: {filled} of {lost} lost slots filled from {} candidates, {} features placed",
            candidates.len(),
            grid.len()
        );
        Ok(filled)
    }
}

/// Initial detection: `max_features` slots filled by the replacement rule
/// starting from an all-`Lost` set, so the result obeys the spacing.
pub fn select_features(
    pyramid: &GradientPyramid,
    config: &TrackerConfig,
    mask: Option<&Image<u8>>,
) -> Result<FeatureSet> {
    let mut features = FeatureSet::with_slots(config.max_features);
    FeatureReplacer::new(config.clone()).replace(pyramid, &mut features, mask)?;
    Ok(features)
}
