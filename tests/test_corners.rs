// tests/test_corners.rs — Integration tests for corner scoring and selection.

use coupled_klt::config::{CornernessMeasure, TrackerConfig};
use coupled_klt::cornerness::CornerScorer;
use coupled_klt::image::Image;
use coupled_klt::pyramid::GradientPyramid;
use coupled_klt::replace::select_features;

/// 80×80 checkerboard of 10 px cells. Interior junctions sit at
/// half-integer coordinates 9.5, 19.5, ..., 69.5.
fn chessboard() -> Image<u8> {
    Image::from_fn(80, 80, |x, y| if (x / 10 + y / 10) % 2 == 0 { 230 } else { 20 })
}

/// Distance from `v` to the nearest interior junction line.
fn junction_offset(v: usize) -> f32 {
    let v = v as f32;
    let nearest = ((v - 9.5) / 10.0).round().clamp(0.0, 6.0) * 10.0 + 9.5;
    (v - nearest).abs()
}

// ===== Chessboard =====

#[test]
fn strongest_corners_sit_on_junctions() {
    let pyr = GradientPyramid::build(&chessboard(), 1, 1.0).unwrap();
    for measure in [
        CornernessMeasure::MinEigenvalue,
        CornernessMeasure::Harris { k: 0.04 },
        CornernessMeasure::TraceDeterminant,
    ] {
        let scorer = CornerScorer::new(measure, 1.0);
        let cands = scorer.candidates(pyr.level(0), None).unwrap();
        assert!(cands.len() >= 20, "{measure:?}: only {} candidates", cands.len());
        for c in cands.iter().take(20) {
            assert!(
                junction_offset(c.x) <= 2.0 && junction_offset(c.y) <= 2.0,
                "{measure:?}: candidate ({}, {}) far from a junction",
                c.x,
                c.y
            );
        }
    }
}

#[test]
fn candidates_sorted_descending() {
    let pyr = GradientPyramid::build(&chessboard(), 1, 1.0).unwrap();
    let cands = CornerScorer::new(CornernessMeasure::MinEigenvalue, 1.0)
        .candidates(pyr.level(0), None)
        .unwrap();
    assert!(cands.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn candidates_are_isolated_maxima() {
    let pyr = GradientPyramid::build(&chessboard(), 1, 1.0).unwrap();
    let cands = CornerScorer::new(CornernessMeasure::MinEigenvalue, 1.0)
        .candidates(pyr.level(0), None)
        .unwrap();
    for (i, a) in cands.iter().enumerate() {
        for b in &cands[i + 1..] {
            let adjacent = a.x.abs_diff(b.x) <= 1 && a.y.abs_diff(b.y) <= 1;
            assert!(!adjacent, "({}, {}) and ({}, {}) are both maxima", a.x, a.y, b.x, b.y);
        }
    }
}

// ===== Thresholds and masks =====

#[test]
fn flat_image_has_no_candidates() {
    let pyr = GradientPyramid::build(&Image::filled(50, 50, 128u8), 1, 1.0).unwrap();
    let cands = CornerScorer::new(CornernessMeasure::MinEigenvalue, 0.0)
        .candidates(pyr.level(0), None)
        .unwrap();
    assert!(cands.is_empty(), "score 0 never exceeds a threshold of 0");
}

#[test]
fn threshold_removes_weak_corners() {
    let pyr = GradientPyramid::build(&chessboard(), 1, 1.0).unwrap();
    let low = CornerScorer::new(CornernessMeasure::MinEigenvalue, 1.0)
        .candidates(pyr.level(0), None)
        .unwrap();
    let best = low[0].score;
    let high = CornerScorer::new(CornernessMeasure::MinEigenvalue, best)
        .candidates(pyr.level(0), None)
        .unwrap();
    assert!(high.is_empty(), "nothing scores strictly above the best score");
}

#[test]
fn mask_restricts_candidates() {
    let pyr = GradientPyramid::build(&chessboard(), 1, 1.0).unwrap();
    let left_half = Image::from_fn(80, 80, |x, _| u8::from(x < 40));
    let cands = CornerScorer::new(CornernessMeasure::MinEigenvalue, 1.0)
        .candidates(pyr.level(0), Some(&left_half))
        .unwrap();
    assert!(!cands.is_empty());
    assert!(cands.iter().all(|c| c.x < 40));
}

#[test]
fn top_k_has_exactly_k_slots() {
    let pyr = GradientPyramid::build(&chessboard(), 1, 1.0).unwrap();
    let scorer = CornerScorer::new(CornernessMeasure::MinEigenvalue, 1.0);
    let few = scorer.top_k(pyr.level(0), 5, None).unwrap();
    assert_eq!(few.len(), 5);
    assert_eq!(few.count_valid(), 5);

    let many = scorer.top_k(pyr.level(0), 5000, None).unwrap();
    assert_eq!(many.len(), 5000);
    assert!(many.count_valid() < 5000);
}

// ===== Selection with spacing =====

#[test]
fn selected_features_respect_separation() {
    let img = Image::from_fn(160, 120, |x, y| {
        let (x, y) = (x as f32, y as f32);
        128.0 + 40.0 * (0.25 * x).sin() * (0.2 * y).cos() + 25.0 * (0.15 * (x + y)).sin()
    });
    let pyr = GradientPyramid::build(&img, 1, 1.0).unwrap();
    let config = TrackerConfig { max_features: 80, min_feature_separation: 12.0, ..Default::default() };
    let set = select_features(&pyr, &config, None).unwrap();

    assert_eq!(set.len(), 80);
    assert!(set.count_valid() > 10, "only {} features selected", set.count_valid());
    let valid: Vec<_> = set.valid().map(|(_, f)| *f).collect();
    for (i, a) in valid.iter().enumerate() {
        for b in &valid[i + 1..] {
            assert!(a.distance(b) >= 12.0, "({}, {}) and ({}, {}) too close", a.x, a.y, b.x, b.y);
        }
    }
}
