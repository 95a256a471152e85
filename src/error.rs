// error.rs — Fatal, call-level errors.
//
// Only configuration and input-shape violations are errors. Anything that
// goes wrong for a single feature is recorded on that feature instead
// (see `feature::TrackFailure`) and never aborts the call.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("pyramid_levels must be at least 1")]
    ZeroPyramidLevels,

    #[error("window half-extents must be at least 1 (got {half_width}×{half_height})")]
    InvalidWindow { half_width: usize, half_height: usize },

    #[error("max_iterations must be at least 1")]
    ZeroIterations,

    #[error("parameter `{name}` must be finite and positive (got {value})")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("input raster is empty ({width}×{height})")]
    EmptyImage { width: usize, height: usize },

    #[error("frame sizes differ: {a:?} vs {b:?}")]
    FrameSizeMismatch { a: (usize, usize), b: (usize, usize) },

    #[error("pyramid depths differ: {a} vs {b} levels")]
    PyramidDepthMismatch { a: usize, b: usize },

    #[error("pyramid has {available} levels but {requested} are configured")]
    PyramidTooShallow { requested: usize, available: usize },

    #[error("mask is {mask:?} but the image is {image:?}")]
    MaskSizeMismatch { mask: (usize, usize), image: (usize, usize) },

    #[error("feature set has {actual} slots, expected {expected}")]
    SlotCountMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, TrackerError>;
