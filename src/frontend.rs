// frontend.rs — Sequential detect → track → replace loop.
//
// Ties every component together into the frame-by-frame loop a caller
// runs over an image stream:
//
//   1. Build the gradient pyramid of the new frame
//   2. If a previous frame exists → track the feature set into this frame
//      (joint or independent, per `tracking_mode`)
//   3. Refill Lost slots from corners of this frame, respecting spacing
//   4. Keep this frame's pyramid as the previous one for the next call
//
// The feature set has exactly `max_features` slots for the lifetime of the
// frontend. A slot keeps its identity while its feature is tracked; when
// the replacer refills it, it holds a new feature with status New.
//
// NEW RUST CONCEPTS:
// - `Option<GradientPyramid>` stands in for "no frame seen yet".
// - Trait objects (`Box<dyn FeatureTracker>`) for runtime dispatch between
//   the two trackers, chosen once from the configuration.

use log::debug;

use crate::config::{TrackerConfig, TrackingMode};
use crate::error::{Result, TrackerError};
use crate::feature::{FeatureSet, TrackSummary};
use crate::image::{Image, Pixel};
use crate::joint::JointTracker;
use crate::klt::KltTracker;
use crate::pyramid::GradientPyramid;
use crate::replace::FeatureReplacer;

/// Anything that moves a feature set from one frame's pyramid to the next.
pub trait FeatureTracker {
    /// Track `features` from `prev` to `curr` in place.
    fn track(
        &self,
        prev: &GradientPyramid,
        curr: &GradientPyramid,
        features: &mut FeatureSet,
    ) -> Result<TrackSummary>;
}

impl FeatureTracker for KltTracker {
    fn track(&self, prev: &GradientPyramid, curr: &GradientPyramid, features: &mut FeatureSet) -> Result<TrackSummary> {
        KltTracker::track(self, prev, curr, features)
    }
}

impl FeatureTracker for JointTracker {
    fn track(&self, prev: &GradientPyramid, curr: &GradientPyramid, features: &mut FeatureSet) -> Result<TrackSummary> {
        JointTracker::track(self, prev, curr, features)
    }
}

/// Build the tracker selected by `config.tracking_mode`.
pub fn tracker_for(config: &TrackerConfig) -> Box<dyn FeatureTracker> {
    match config.tracking_mode {
        TrackingMode::Independent => Box::new(KltTracker::new(config.clone())),
        TrackingMode::Joint => Box::new(JointTracker::new(config.clone())),
    }
}

/// Per-frame counts reported by [`Frontend::process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Features tracked from the previous frame.
    pub tracked: usize,
    /// Features lost while tracking into this frame.
    pub lost: usize,
    /// Lost slots refilled with new detections.
    pub replaced: usize,
    /// Valid features after this frame.
    pub total: usize,
}

/// The frontend: owns the feature set and the previous frame's pyramid.
pub struct Frontend {
    config: TrackerConfig,
    tracker: Box<dyn FeatureTracker>,
    replacer: FeatureReplacer,
    /// Previous frame's pyramid. `None` before the first frame.
    prev_pyramid: Option<GradientPyramid>,
    features: FeatureSet,
    /// Detection mask (nonzero = detect here).
    mask: Option<Image<u8>>,
    img_w: usize,
    img_h: usize,
    frames: usize,
}

impl Frontend {
    /// Create a frontend for images of the given dimensions.
    pub fn new(config: TrackerConfig, img_w: usize, img_h: usize) -> Result<Self> {
        config.validate()?;
        if img_w == 0 || img_h == 0 {
            return Err(TrackerError::EmptyImage { width: img_w, height: img_h });
        }
        Ok(Frontend {
            tracker: tracker_for(&config),
            replacer: FeatureReplacer::new(config.clone()),
            features: FeatureSet::with_slots(config.max_features),
            config,
            prev_pyramid: None,
            mask: None,
            img_w,
            img_h,
            frames: 0,
        })
    }

    /// Restrict detection to pixels where `mask` is nonzero.
    pub fn set_mask(&mut self, mask: Option<Image<u8>>) -> Result<()> {
        if let Some(m) = &mask {
            if m.dims() != (self.img_w, self.img_h) {
                return Err(TrackerError::MaskSizeMismatch { mask: m.dims(), image: (self.img_w, self.img_h) });
            }
        }
        self.mask = mask;
        Ok(())
    }

    /// Process one frame. Returns the feature set and frame statistics.
    pub fn process<T: Pixel>(&mut self, image: &Image<T>) -> Result<(&FeatureSet, FrameStats)> {
        if image.dims() != (self.img_w, self.img_h) {
            return Err(TrackerError::FrameSizeMismatch { a: (self.img_w, self.img_h), b: image.dims() });
        }

        let curr = GradientPyramid::build(image, self.config.pyramid_levels, self.config.pyramid_sigma)?;
        let mut stats = FrameStats::default();

        if let Some(prev) = &self.prev_pyramid {
            let summary = self.tracker.track(prev, &curr, &mut self.features)?;
            stats.tracked = summary.tracked;
            stats.lost = summary.lost();
        }

        stats.replaced = self.replacer.replace(&curr, &mut self.features, self.mask.as_ref())?;
        stats.total = self.features.count_valid();

        self.prev_pyramid = Some(curr);
        self.frames += 1;
        debug!(
            "frame {}: tracked={} lost={} replaced={} total={}",
            self.frames, stats.tracked, stats.lost, stats.replaced, stats.total
        );

        Ok((&self.features, stats))
    }

    /// Replace the feature set, e.g. with externally detected points.
    /// The slot count must equal `max_features`.
    pub fn set_features(&mut self, features: FeatureSet) -> Result<()> {
        if features.len() != self.config.max_features {
            return Err(TrackerError::SlotCountMismatch {
                expected: self.config.max_features,
                actual: features.len(),
            });
        }
        self.features = features;
        Ok(())
    }

    /// The current feature set (without processing a new frame).
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Whether a previous frame is available to track from.
    pub fn has_prev_frame(&self) -> bool {
        self.prev_pyramid.is_some()
    }

    /// Number of frames processed since creation or the last reset.
    pub fn frames_processed(&self) -> usize {
        self.frames
    }

    /// Discard the previous frame and empty every slot.
    pub fn reset(&mut self) {
        self.prev_pyramid = None;
        self.features = FeatureSet::with_slots(self.config.max_features);
        self.frames = 0;
    }
}
