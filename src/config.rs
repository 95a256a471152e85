// config.rs — Tracker configuration shared by detection, tracking and
// replacement.
//
// One struct carries every knob so a frontend can be configured from a
// single document (with the `serde` feature). `validate()` is the single
// gate for fatal configuration errors; every public entry point calls it
// before touching any feature.

use crate::error::{Result, TrackerError};

/// Which scalar is derived from the structure tensor to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CornernessMeasure {
    /// Smaller eigenvalue (Shi-Tomasi).
    MinEigenvalue,
    /// `(1 − alpha)·λmin + alpha·λmax`, alpha in [0, 1].
    Blend { alpha: f32 },
    /// `det − k·trace²`.
    Harris { k: f32 },
    /// `det / trace`, zero where the trace vanishes.
    TraceDeterminant,
}

/// How a feature set is tracked between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackingMode {
    /// Every feature alone (plain pyramidal KLT).
    Independent,
    /// All features together, regularized by their neighbors' motion.
    Joint,
}

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Number of pyramid levels (≥ 1). Level 0 is full resolution.
    pub pyramid_levels: usize,
    /// Gaussian σ of the smoothing applied at every pyramid level.
    pub pyramid_sigma: f32,
    /// Nominal window half-width; the window is `2·hw + 1` wide.
    pub window_half_width: usize,
    /// Nominal window half-height.
    pub window_half_height: usize,
    /// Newton iterations per level (independent mode) or joint sweeps per
    /// level (joint mode).
    pub max_iterations: usize,
    /// Convergence threshold on |δx| and |δy|, in pixels of the current level.
    pub min_displacement_epsilon: f32,
    /// Gradient matrices with a smaller determinant are untrackable.
    pub small_determinant_threshold: f32,
    /// Mean squared intensity difference per window pixel above which a
    /// converged feature is declared occluded.
    pub max_residue: f32,
    /// Features closer than this (full-resolution pixels) are neighbors.
    pub neighbor_radius: f32,
    /// σ of the Gaussian distance weight used in the neighbor fit.
    pub affine_sigma: f32,
    /// Weight λ of the regularization term.
    pub regularization_lambda: f32,
    /// Number of feature slots.
    pub max_features: usize,
    /// Minimum distance between newly placed features and any valid one.
    pub min_feature_separation: f32,
    /// Candidate ranking function.
    pub cornerness_measure: CornernessMeasure,
    /// Candidates must score strictly above this value.
    pub min_cornerness: f32,
    /// Independent or joint tracking.
    pub tracking_mode: TrackingMode,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let mut config = TrackerConfig {
            pyramid_levels: 3,
            pyramid_sigma: 1.0,
            window_half_width: 4,
            window_half_height: 4,
            max_iterations: 10,
            min_displacement_epsilon: 0.01,
            small_determinant_threshold: 0.01,
            max_residue: 400.0,
            neighbor_radius: 40.0,
            affine_sigma: 20.0,
            regularization_lambda: 0.0,
            max_features: 100,
            min_feature_separation: 10.0,
            cornerness_measure: CornernessMeasure::MinEigenvalue,
            min_cornerness: 1.0,
            tracking_mode: TrackingMode::Joint,
        };
        // λ = 50 per window pixel.
        config.regularization_lambda = config.window_pixels() as f32 * 50.0;
        config
    }
}

impl TrackerConfig {
    /// Check every option. Called by all public entry points before any
    /// per-feature work.
    pub fn validate(&self) -> Result<()> {
        if self.pyramid_levels == 0 {
            return Err(TrackerError::ZeroPyramidLevels);
        }
        if self.window_half_width == 0 || self.window_half_height == 0 {
            return Err(TrackerError::InvalidWindow {
                half_width: self.window_half_width,
                half_height: self.window_half_height,
            });
        }
        if self.max_iterations == 0 {
            return Err(TrackerError::ZeroIterations);
        }

        positive("pyramid_sigma", self.pyramid_sigma)?;
        positive("min_displacement_epsilon", self.min_displacement_epsilon)?;
        positive("small_determinant_threshold", self.small_determinant_threshold)?;
        positive("max_residue", self.max_residue)?;
        positive("neighbor_radius", self.neighbor_radius)?;
        positive("affine_sigma", self.affine_sigma)?;
        positive("regularization_lambda", self.regularization_lambda)?;
        positive("min_feature_separation", self.min_feature_separation)?;
        if !self.min_cornerness.is_finite() {
            return Err(TrackerError::InvalidParameter {
                name: "min_cornerness",
                value: self.min_cornerness,
            });
        }

        match self.cornerness_measure {
            CornernessMeasure::Blend { alpha } if !(0.0..=1.0).contains(&alpha) => {
                Err(TrackerError::InvalidParameter { name: "alpha", value: alpha })
            }
            CornernessMeasure::Harris { k } if !(k.is_finite() && k >= 0.0) => {
                Err(TrackerError::InvalidParameter { name: "k", value: k })
            }
            _ => Ok(()),
        }
    }

    /// Number of samples in a full (unclipped) window.
    pub fn window_pixels(&self) -> usize {
        (2 * self.window_half_width + 1) * (2 * self.window_half_height + 1)
    }
}

fn positive(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrackerError::InvalidParameter { name, value })
    }
}
