// tests/test_replace.rs — Integration tests for lost-slot replacement.

use coupled_klt::config::TrackerConfig;
use coupled_klt::feature::{Feature, FeatureSet, FeatureStatus, TrackFailure};
use coupled_klt::image::Image;
use coupled_klt::pyramid::GradientPyramid;
use coupled_klt::replace::{select_features, FeatureReplacer};

fn texture(x: f32, y: f32) -> f32 {
    128.0 + 40.0 * (0.25 * x).sin() * (0.2 * y).cos() + 25.0 * (0.15 * (x + y)).sin()
}

fn scene_pyramid() -> GradientPyramid {
    let img = Image::from_fn(160, 120, |x, y| texture(x as f32, y as f32));
    GradientPyramid::build(&img, 1, 1.0).unwrap()
}

fn assert_spacing(set: &FeatureSet, min_sep: f32) {
    let valid: Vec<Feature> = set.valid().map(|(_, f)| *f).collect();
    for (i, a) in valid.iter().enumerate() {
        for b in &valid[i + 1..] {
            assert!(a.distance(b) >= min_sep, "({}, {}) and ({}, {}) closer than {min_sep}", a.x, a.y, b.x, b.y);
        }
    }
}

// ===== Spacing =====

#[test]
fn refilled_set_respects_separation() {
    let pyr = scene_pyramid();
    let config = TrackerConfig { max_features: 60, min_feature_separation: 10.0, ..Default::default() };
    let mut set = select_features(&pyr, &config, None).unwrap();
    assert_spacing(&set, 10.0);

    // Lose every other slot, then nudge the survivors so the freed corners
    // are no longer exactly where the survivors sit.
    for (i, f) in set.iter_mut().enumerate() {
        if i % 2 == 0 {
            f.lose(TrackFailure::HighResidue);
        } else if f.is_valid() {
            f.x += 0.4;
            f.status = FeatureStatus::Tracked;
        }
    }

    let filled = FeatureReplacer::new(config).replace(&pyr, &mut set, None).unwrap();
    assert!(filled > 0);
    assert_eq!(set.len(), 60);
    assert_spacing(&set, 10.0);
}

#[test]
fn replaced_slots_are_new_and_clean() {
    let pyr = scene_pyramid();
    let config = TrackerConfig { max_features: 10, ..Default::default() };
    let min_cornerness = config.min_cornerness;
    let mut set = FeatureSet::with_slots(10);
    set[3].lose(TrackFailure::OutOfBounds);

    FeatureReplacer::new(config).replace(&pyr, &mut set, None).unwrap();
    for f in set.iter().filter(|f| f.is_valid()) {
        assert_eq!(f.status, FeatureStatus::New);
        assert_eq!(f.failure, None);
        assert_eq!(f.last_displacement, (0.0, 0.0));
        assert!(f.score > min_cornerness);
    }
}

// ===== Ordering =====

#[test]
fn strongest_candidate_goes_to_lowest_slot() {
    let pyr = scene_pyramid();
    let config = TrackerConfig { max_features: 8, ..Default::default() };
    let set = select_features(&pyr, &config, None).unwrap();
    let scores: Vec<f32> = set.valid().map(|(_, f)| f.score).collect();
    assert!(scores.len() > 1);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "scores not descending: {scores:?}");
}

#[test]
fn candidates_exhausted_leaves_slots_lost() {
    let flat = GradientPyramid::build(&Image::filled(64, 64, 90u8), 1, 1.0).unwrap();
    let mut set = FeatureSet::with_slots(5);
    let filled = FeatureReplacer::new(TrackerConfig::default()).replace(&flat, &mut set, None).unwrap();
    assert_eq!(filled, 0);
    assert_eq!(set.count(FeatureStatus::Lost), 5);
}

// ===== Mask =====

#[test]
fn mask_limits_new_features() {
    let pyr = scene_pyramid();
    let top_half = Image::from_fn(160, 120, |_, y| u8::from(y < 60));
    let config = TrackerConfig { max_features: 50, ..Default::default() };
    let set = select_features(&pyr, &config, Some(&top_half)).unwrap();
    assert!(set.count_valid() > 0);
    assert!(set.valid().all(|(_, f)| f.y < 60.0));
}

#[test]
fn mask_of_wrong_size_rejected() {
    let pyr = scene_pyramid();
    let mask = Image::filled(80, 60, 1u8);
    let config = TrackerConfig::default();
    assert!(select_features(&pyr, &config, Some(&mask)).is_err());
}
