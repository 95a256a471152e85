// feature.rs — Feature slots and their status.
//
// A FeatureSet is a fixed-size array of slots. Slot i always refers to the
// same logical feature until the replacer puts a new one there, so callers
// can keep per-feature state (history, descriptors, IDs) keyed by index.

use std::fmt;

/// Lifecycle state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStatus {
    /// Placed by detection or replacement since the last tracking call.
    New,
    /// Tracked successfully by the last tracking call.
    Tracked,
    /// Not a usable feature: failed to track, or an empty slot.
    Lost,
}

/// Why a feature was lost. All kinds collapse to [`FeatureStatus::Lost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFailure {
    /// Gradient matrix determinant below threshold: not enough texture.
    Untrackable,
    /// The estimated position left the raster at some pyramid level.
    OutOfBounds,
    /// Converged, but the window residue exceeds `max_residue`.
    HighResidue,
}

impl fmt::Display for TrackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackFailure::Untrackable => "untrackable",
            TrackFailure::OutOfBounds => "out of bounds",
            TrackFailure::HighResidue => "high residue",
        };
        f.write_str(s)
    }
}

/// A tracked point in full-resolution image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub x: f32,
    pub y: f32,
    pub status: FeatureStatus,
    /// Displacement found by the last tracking call. Diagnostic only.
    pub last_displacement: (f32, f32),
    /// Cornerness score at detection time; 0 for empty slots.
    pub score: f32,
    /// Reason for the last loss, if any.
    pub failure: Option<TrackFailure>,
}

impl Feature {
    /// A freshly detected feature.
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Feature {
            x,
            y,
            status: FeatureStatus::New,
            last_displacement: (0.0, 0.0),
            score,
            failure: None,
        }
    }

    /// An empty slot.
    pub fn empty() -> Self {
        Feature {
            x: -1.0,
            y: -1.0,
            status: FeatureStatus::Lost,
            last_displacement: (0.0, 0.0),
            score: 0.0,
            failure: None,
        }
    }

    /// True for `New` and `Tracked` features.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.status != FeatureStatus::Lost
    }

    /// Mark the feature lost for `reason`. Position is left untouched.
    pub fn lose(&mut self, reason: TrackFailure) {
        self.status = FeatureStatus::Lost;
        self.failure = Some(reason);
    }

    /// Euclidean distance to another feature.
    pub fn distance(&self, other: &Feature) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Ordered, fixed-size collection of feature slots.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    slots: Vec<Feature>,
}

impl FeatureSet {
    /// `count` empty (`Lost`) slots.
    pub fn with_slots(count: usize) -> Self {
        FeatureSet { slots: vec![Feature::empty(); count] }
    }

    /// Wrap existing features; the slot count is `features.len()`.
    pub fn from_features(features: Vec<Feature>) -> Self {
        FeatureSet { slots: features }
    }

    /// Number of slots (valid or not).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of `New` or `Tracked` slots.
    pub fn count_valid(&self) -> usize {
        self.slots.iter().filter(|f| f.is_valid()).count()
    }

    /// Number of slots with the given status.
    pub fn count(&self, status: FeatureStatus) -> usize {
        self.slots.iter().filter(|f| f.status == status).count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Feature> {
        self.slots.iter_mut()
    }

    /// Iterate over `(slot index, feature)` for valid features only.
    pub fn valid(&self) -> impl Iterator<Item = (usize, &Feature)> + '_ {
        self.slots.iter().enumerate().filter(|(_, f)| f.is_valid())
    }

    pub fn as_slice(&self) -> &[Feature] {
        &self.slots
    }
}

impl std::ops::Index<usize> for FeatureSet {
    type Output = Feature;

    fn index(&self, i: usize) -> &Feature {
        &self.slots[i]
    }
}

impl std::ops::IndexMut<usize> for FeatureSet {
    fn index_mut(&mut self, i: usize) -> &mut Feature {
        &mut self.slots[i]
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

/// Per-call tally of tracking outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackSummary {
    /// Features that ended the call `Tracked`.
    pub tracked: usize,
    pub untrackable: usize,
    pub out_of_bounds: usize,
    pub high_residue: usize,
    /// Slots that were already `Lost` on entry and were skipped.
    pub skipped: usize,
}

impl TrackSummary {
    /// Features lost during this call, any reason.
    pub fn lost(&self) -> usize {
        self.untrackable + self.out_of_bounds + self.high_residue
    }

    pub(crate) fn record(&mut self, failure: TrackFailure) {
        match failure {
            TrackFailure::Untrackable => self.untrackable += 1,
            TrackFailure::OutOfBounds => self.out_of_bounds += 1,
            TrackFailure::HighResidue => self.high_residue += 1,
        }
    }
}
