// tests/test_pyramid.rs — Integration tests for the gradient pyramid.

use coupled_klt::error::TrackerError;
use coupled_klt::image::Image;
use coupled_klt::pyramid::GradientPyramid;

fn texture(x: usize, y: usize) -> f32 {
    let (x, y) = (x as f32, y as f32);
    128.0 + 40.0 * (0.25 * x).sin() * (0.2 * y).cos() + 25.0 * (0.15 * (x + y)).sin()
}

// ===== Dimensions =====

#[test]
fn pyramid_from_u8_euroc_size() {
    let img = Image::from_fn(752, 480, |x, y| ((x * 7 + y * 3) % 256) as u8);
    let pyr = GradientPyramid::build(&img, 4, 1.0).unwrap();

    assert_eq!(pyr.num_levels(), 4);
    assert_eq!(pyr.dims(), (752, 480));
    let expected = [(752, 480), (376, 240), (188, 120), (94, 60)];
    for (lvl, &(w, h)) in expected.iter().enumerate() {
        let level = pyr.level(lvl);
        assert_eq!((level.width(), level.height()), (w, h), "level {lvl}");
        assert_eq!(level.grad_x.dims(), (w, h), "level {lvl} grad_x");
        assert_eq!(level.grad_y.dims(), (w, h), "level {lvl} grad_y");
    }
}

#[test]
fn odd_dimensions_round_down() {
    let img = Image::from_fn(101, 75, texture);
    let pyr = GradientPyramid::build(&img, 3, 1.0).unwrap();
    assert_eq!(pyr.level(1).image.dims(), (50, 37));
    assert_eq!(pyr.level(2).image.dims(), (25, 18));
}

#[test]
fn tiny_image_keeps_at_least_one_pixel() {
    let img = Image::from_fn(3, 2, |x, y| (x + y) as f32);
    let pyr = GradientPyramid::build(&img, 4, 1.0).unwrap();
    assert_eq!(pyr.level(3).image.dims(), (1, 1));
}

// ===== Determinism and input types =====

#[test]
fn rebuild_is_bit_identical() {
    let img = Image::from_fn(96, 64, texture);
    let a = GradientPyramid::build(&img, 3, 1.0).unwrap();
    let b = GradientPyramid::build(&img, 3, 1.0).unwrap();
    assert!(a == b, "same input must give the same pyramid");
}

#[test]
fn u8_and_f32_inputs_agree() {
    let bytes = Image::from_fn(64, 48, |x, y| ((x * 5 + y * 11) % 200) as u8);
    let floats = bytes.map(|v| v as f32);
    let a = GradientPyramid::build(&bytes, 2, 1.0).unwrap();
    let b = GradientPyramid::build(&floats, 2, 1.0).unwrap();
    assert!(a == b, "u8 and f32 rasters with equal values must agree");
}

// ===== Gradients =====

#[test]
fn ramp_gradient_scales_with_level() {
    // I = 3x + 2y. Smoothing preserves a linear ramp away from the border,
    // and level 1 samples every other pixel, so its slope doubles.
    let img = Image::from_fn(64, 64, |x, y| 3.0 * x as f32 + 2.0 * y as f32);
    let pyr = GradientPyramid::build(&img, 2, 1.0).unwrap();

    let l0 = pyr.level(0);
    for y in 10..54 {
        for x in 10..54 {
            assert!((l0.grad_x.get(x, y) - 3.0).abs() < 1e-3, "gx at ({x},{y}) = {}", l0.grad_x.get(x, y));
            assert!((l0.grad_y.get(x, y) - 2.0).abs() < 1e-3, "gy at ({x},{y}) = {}", l0.grad_y.get(x, y));
        }
    }

    let l1 = pyr.level(1);
    for y in 6..26 {
        for x in 6..26 {
            assert!((l1.grad_x.get(x, y) - 6.0).abs() < 1e-3, "level 1 gx at ({x},{y}) = {}", l1.grad_x.get(x, y));
            assert!((l1.grad_y.get(x, y) - 4.0).abs() < 1e-3, "level 1 gy at ({x},{y}) = {}", l1.grad_y.get(x, y));
        }
    }
}

#[test]
fn flat_image_has_zero_gradient() {
    let img = Image::filled(40, 30, 77u8);
    let pyr = GradientPyramid::build(&img, 2, 1.0).unwrap();
    for level in &pyr.levels {
        assert!(level.grad_x.as_slice().iter().all(|&g| g.abs() < 1e-4));
        assert!(level.grad_y.as_slice().iter().all(|&g| g.abs() < 1e-4));
    }
}

#[test]
fn contains_uses_closed_interval() {
    let img = Image::from_fn(20, 10, texture);
    let pyr = GradientPyramid::build(&img, 1, 1.0).unwrap();
    let level = pyr.level(0);
    assert!(level.contains(0.0, 0.0));
    assert!(level.contains(19.0, 9.0));
    assert!(!level.contains(19.01, 5.0));
    assert!(!level.contains(-0.01, 5.0));
}

// ===== Errors =====

#[test]
fn zero_levels_rejected() {
    let img = Image::from_fn(16, 16, texture);
    assert_eq!(GradientPyramid::build(&img, 0, 1.0).err(), Some(TrackerError::ZeroPyramidLevels));
}

#[test]
fn empty_image_rejected() {
    let img: Image<u8> = Image::new(0, 10);
    assert!(matches!(
        GradientPyramid::build(&img, 2, 1.0),
        Err(TrackerError::EmptyImage { width: 0, height: 10 })
    ));
}

#[test]
fn bad_sigma_rejected() {
    let img = Image::from_fn(16, 16, texture);
    assert!(GradientPyramid::build(&img, 2, 0.0).is_err());
    assert!(GradientPyramid::build(&img, 2, f32::NAN).is_err());
}
