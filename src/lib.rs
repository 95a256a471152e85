// coupled-klt: joint, spatially regularized multiscale KLT point tracking
//
// Detects corner features and tracks them across frames with a pyramidal
// Lucas-Kanade solver, coupling each feature's motion to an affine fit of
// its neighbors' motion so that points on edges and weak texture move with
// the surrounding scene instead of drifting along the aperture.
//
// Reference: Birchfield & Pundlik, "Joint Tracking of Features and Edges"
// (CVPR 2008)

pub mod image;
pub mod convolution;
pub mod gradient;
pub mod linalg;
pub mod pyramid;        // gradient pyramid builder
pub mod cornerness;     // structure-tensor corner scoring
pub mod sampler;        // bilinear window sampling
pub mod feature;
pub mod klt;            // single-feature pyramidal tracker
pub mod neighbors;      // fixed-radius neighbor lists
pub mod joint;          // neighbor-regularized joint tracker
pub mod occupancy;      // spacing grid
pub mod replace;        // lost-slot refilling, initial selection
pub mod frontend;       // detect → track → replace loop
pub mod config;
pub mod error;

pub use config::{CornernessMeasure, TrackerConfig, TrackingMode};
pub use error::{Result, TrackerError};
pub use feature::{Feature, FeatureSet, FeatureStatus, TrackFailure, TrackSummary};
pub use frontend::{FrameStats, Frontend};
pub use joint::JointTracker;
pub use klt::KltTracker;
pub use pyramid::GradientPyramid;
pub use replace::{select_features, FeatureReplacer};
