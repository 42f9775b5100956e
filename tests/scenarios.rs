use kaze::image::GrayFloatImage;
use kaze::{DescriptorFamily, Kaze, KazeOptions, KeyPoint, DEFAULT_MIN_DETECTOR_THRESHOLD};
use ndarray::Array2;

fn constant_image(width: usize, height: usize, value: f32) -> GrayFloatImage {
    let mut image = GrayFloatImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            image.put(x, y, value);
        }
    }
    image
}

fn checkerboard(width: usize, height: usize, square: usize) -> GrayFloatImage {
    let mut image = GrayFloatImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let value = if ((x / square) + (y / square)) % 2 == 0 {
                1.0
            } else {
                0.0
            };
            image.put(x, y, value);
        }
    }
    image
}

fn gaussian_blob(width: usize, height: usize, sigma: f32, amplitude: f32) -> GrayFloatImage {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let mut image = GrayFloatImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let r2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
            image.put(x, y, amplitude * (-r2 / (2.0 * sigma * sigma)).exp());
        }
    }
    image
}

/// A blob with a weaker satellite displaced along `theta`, which gives the
/// center an unambiguous dominant orientation. Synthesized analytically so
/// a rotated version carries no interpolation error.
fn oriented_pattern(width: usize, height: usize, theta: f32) -> GrayFloatImage {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let sx = cx + 12.0 * theta.cos();
    let sy = cy + 12.0 * theta.sin();
    let mut image = GrayFloatImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let main = (-((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)) / (2.0 * 25.0)).exp();
            let satellite =
                (-((x as f32 - sx).powi(2) + (y as f32 - sy).powi(2)) / (2.0 * 9.0)).exp();
            image.put(x, y, main + 0.6 * satellite);
        }
    }
    image
}

fn center_keypoint(width: usize, height: usize, kaze: &Kaze) -> KeyPoint {
    let class_id = 4;
    KeyPoint {
        point: (width as f32 / 2.0, height as f32 / 2.0),
        response: 1.0,
        size: 8.0,
        octave: kaze.evolutions()[class_id].octave as usize,
        class_id,
        angle: 0.0,
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (na * nb)
}

#[test]
fn uniform_gray_produces_nothing() {
    let image = constant_image(128, 128, 0.5);
    let mut kaze = Kaze::new(KazeOptions::new(128, 128)).unwrap();
    kaze.build_scale_space(&image).unwrap();

    // Every level of a flat image stays flat.
    for evolution in kaze.evolutions() {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for value in evolution.Lt.iter() {
            lo = lo.min(*value);
            hi = hi.max(*value);
        }
        assert!(hi - lo < 1e-3, "level {} is not flat", evolution.esigma);
    }
    // The gradient histogram has nothing to offer, so the contrast factor
    // falls back to its default.
    assert!((kaze.contrast_factor() - 0.03).abs() < 1e-6);

    let mut keypoints = Vec::new();
    kaze.detect(&mut keypoints).unwrap();
    assert!(keypoints.is_empty());
}

#[test]
fn scale_space_is_monotonic() {
    let image = checkerboard(128, 128, 16);
    let mut kaze = Kaze::new(KazeOptions::new(128, 128)).unwrap();
    kaze.build_scale_space(&image).unwrap();
    let evolutions = kaze.evolutions();
    for pair in evolutions.windows(2) {
        assert!(pair[1].etime > pair[0].etime);
        if pair[0].octave == pair[1].octave {
            assert!(pair[1].esigma > pair[0].esigma);
        }
    }
}

#[test]
fn checkerboard_keypoints_respect_thresholds_and_borders() {
    let image = checkerboard(256, 256, 16);
    let options = KazeOptions::new(256, 256);
    let mut kaze = Kaze::new(options).unwrap();
    let (keypoints, descriptors) = kaze.extract_from_gray_float_image(&image).unwrap();

    assert!(!keypoints.is_empty());
    assert_eq!(descriptors.dim(), (keypoints.len(), 64));
    for keypoint in &keypoints {
        assert!(keypoint.response > options.detector_threshold);
        assert!(keypoint.response >= DEFAULT_MIN_DETECTOR_THRESHOLD);
        assert!(keypoint.point.0 >= 1.0 && keypoint.point.0 <= 254.0);
        assert!(keypoint.point.1 >= 1.0 && keypoint.point.1 <= 254.0);
    }

    // Adjacent-level keypoints keep the dedup radius between them, minus
    // the up-to-one-pixel shift refinement may apply to each point.
    for (i, a) in keypoints.iter().enumerate() {
        for b in &keypoints[i + 1..] {
            if a.class_id.abs_diff(b.class_id) <= 1 {
                let level = a.class_id.min(b.class_id);
                let radius = (kaze.evolutions()[level].sigma_size as f32 - 2.0).max(0.0);
                let dist2 =
                    (a.point.0 - b.point.0).powi(2) + (a.point.1 - b.point.1).powi(2);
                assert!(
                    dist2 > radius * radius,
                    "keypoints {:?} and {:?} are too close",
                    a.point,
                    b.point
                );
            }
        }
    }
}

#[test]
fn extraction_is_deterministic() {
    let image = checkerboard(128, 128, 16);
    let mut kaze = Kaze::new(KazeOptions::new(128, 128)).unwrap();
    let (keypoints_a, descriptors_a) = kaze.extract_from_gray_float_image(&image).unwrap();
    let (keypoints_b, descriptors_b) = kaze.extract_from_gray_float_image(&image).unwrap();

    assert_eq!(keypoints_a.len(), keypoints_b.len());
    for (a, b) in keypoints_a.iter().zip(keypoints_b.iter()) {
        assert_eq!(a.point.0.to_bits(), b.point.0.to_bits());
        assert_eq!(a.point.1.to_bits(), b.point.1.to_bits());
        assert_eq!(a.response.to_bits(), b.response.to_bits());
        assert_eq!(a.size.to_bits(), b.size.to_bits());
        assert_eq!(a.angle.to_bits(), b.angle.to_bits());
        assert_eq!(a.class_id, b.class_id);
        assert_eq!(a.octave, b.octave);
    }
    assert_eq!(descriptors_a.dim(), descriptors_b.dim());
    for (a, b) in descriptors_a.iter().zip(descriptors_b.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn gaussian_blob_is_found_at_the_center() {
    let image = gaussian_blob(128, 128, 4.0, 100.0);
    let mut kaze = Kaze::new(KazeOptions::new(128, 128)).unwrap();
    let (keypoints, descriptors) = kaze.extract_from_gray_float_image(&image).unwrap();

    assert!(!keypoints.is_empty());
    assert_eq!(descriptors.ncols(), 64);

    let near_center = keypoints
        .iter()
        .filter(|kp| {
            (kp.point.0 - 64.0).abs() <= 1.5 && (kp.point.1 - 64.0).abs() <= 1.5
        })
        .count();
    assert!(near_center >= 1, "no keypoint near the blob center");

    let strongest = keypoints
        .iter()
        .max_by(|a, b| a.response.partial_cmp(&b.response).unwrap())
        .unwrap();
    assert!((strongest.point.0 - 64.0).abs() <= 1.5);
    assert!((strongest.point.1 - 64.0).abs() <= 1.5);

    // Non-degenerate descriptors come out L2-normalized.
    for row in descriptors.outer_iter() {
        let norm: f32 = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }
}

#[test]
fn gsurf_extended_descriptors_are_unit_norm() {
    let image = gaussian_blob(128, 128, 4.0, 100.0);
    let mut options = KazeOptions::new(128, 128);
    options.descriptor = DescriptorFamily::Gsurf;
    options.extended = true;
    let mut kaze = Kaze::new(options).unwrap();
    let (keypoints, descriptors) = kaze.extract_from_gray_float_image(&image).unwrap();

    assert!(!keypoints.is_empty());
    assert_eq!(descriptors.dim(), (keypoints.len(), 128));
    for row in descriptors.outer_iter() {
        let norm: f32 = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }
}

#[test]
fn raising_the_threshold_yields_a_subset() {
    let image = checkerboard(128, 128, 16);

    let low = KazeOptions::new(128, 128);
    let mut high = low;
    high.detector_threshold = low.detector_threshold * 2.0;

    let detect_with = |options: KazeOptions| -> Vec<KeyPoint> {
        let mut kaze = Kaze::new(options).unwrap();
        kaze.build_scale_space(&image).unwrap();
        let mut keypoints = Vec::new();
        kaze.detect(&mut keypoints).unwrap();
        keypoints
    };

    let keypoints_low = detect_with(low);
    let keypoints_high = detect_with(high);

    assert!(!keypoints_low.is_empty());
    assert!(keypoints_high.len() <= keypoints_low.len());
    for kp in &keypoints_high {
        let found = keypoints_low.iter().any(|other| {
            other.class_id == kp.class_id
                && (other.point.0 - kp.point.0).abs() < 0.5
                && (other.point.1 - kp.point.1).abs() < 0.5
        });
        assert!(
            found,
            "keypoint {:?} appears only at the higher threshold",
            kp.point
        );
    }
}

#[test]
fn descriptors_rotate_with_the_image() {
    let theta = std::f32::consts::FRAC_PI_4;
    let original = oriented_pattern(128, 128, 0.0);
    let rotated = oriented_pattern(128, 128, theta);

    let describe_center = |image: &GrayFloatImage| -> (f32, Vec<f32>) {
        let mut kaze = Kaze::new(KazeOptions::new(128, 128)).unwrap();
        kaze.build_scale_space(image).unwrap();
        let mut discard = Vec::new();
        kaze.detect(&mut discard).unwrap();
        let mut keypoints = vec![center_keypoint(128, 128, &kaze)];
        let mut descriptors = Array2::zeros((0, 0));
        kaze.describe(&mut keypoints, &mut descriptors).unwrap();
        (keypoints[0].angle, descriptors.row(0).to_vec())
    };

    let (angle_original, descriptor_original) = describe_center(&original);
    let (angle_rotated, descriptor_rotated) = describe_center(&rotated);

    // The dominant orientation tracks the rotation modulo 2*pi.
    let two_pi = 2.0 * std::f32::consts::PI;
    let mut angle_delta = (angle_rotated - angle_original - theta) % two_pi;
    if angle_delta > std::f32::consts::PI {
        angle_delta -= two_pi;
    }
    if angle_delta < -std::f32::consts::PI {
        angle_delta += two_pi;
    }
    // The sliding-sector scan quantizes at 0.15 rad, so allow a little
    // more than one step of drift.
    assert!(
        angle_delta.abs() < 0.25,
        "orientation drifted by {} rad",
        angle_delta
    );

    let similarity = cosine_similarity(&descriptor_original, &descriptor_rotated);
    assert!(
        similarity > 0.9,
        "rotated descriptor similarity only {}",
        similarity
    );
}

#[test]
fn upright_descriptor_of_a_derotated_image_matches_the_oriented_one() {
    // Describe the pattern with orientation estimation, then counter-rotate
    // the pattern by that orientation: an axis-aligned (upright) descriptor
    // of the derotated image should agree with the oriented descriptor of
    // the original, up to interpolation and sector-quantization error.
    let original = oriented_pattern(128, 128, 0.0);

    let mut kaze = Kaze::new(KazeOptions::new(128, 128)).unwrap();
    kaze.build_scale_space(&original).unwrap();
    let mut discard = Vec::new();
    kaze.detect(&mut discard).unwrap();
    let mut keypoints = vec![center_keypoint(128, 128, &kaze)];
    let mut oriented = Array2::zeros((0, 0));
    kaze.describe(&mut keypoints, &mut oriented).unwrap();
    let dominant_angle = keypoints[0].angle;

    let derotated = oriented_pattern(128, 128, -dominant_angle);
    let mut options = KazeOptions::new(128, 128);
    options.upright = true;
    let mut kaze_upright = Kaze::new(options).unwrap();
    kaze_upright.build_scale_space(&derotated).unwrap();
    kaze_upright.detect(&mut discard).unwrap();
    let mut keypoints = vec![center_keypoint(128, 128, &kaze_upright)];
    let mut upright = Array2::zeros((0, 0));
    kaze_upright.describe(&mut keypoints, &mut upright).unwrap();

    let similarity =
        cosine_similarity(&oriented.row(0).to_vec(), &upright.row(0).to_vec());
    assert!(
        similarity > 0.85,
        "upright/oriented descriptor similarity only {}",
        similarity
    );
}

#[test]
fn upright_descriptors_keep_angle_zero() {
    let image = oriented_pattern(128, 128, 0.3);
    let mut options = KazeOptions::new(128, 128);
    options.upright = true;
    let mut kaze = Kaze::new(options).unwrap();
    let (keypoints, descriptors) = kaze.extract_from_gray_float_image(&image).unwrap();
    for keypoint in &keypoints {
        assert_eq!(keypoint.angle, 0.0);
    }
    for value in descriptors.iter() {
        assert!(value.is_finite());
    }
}

#[test]
fn mismatched_image_sizes_are_rejected() {
    let image = constant_image(64, 64, 0.5);
    let mut kaze = Kaze::new(KazeOptions::new(128, 128)).unwrap();
    assert!(kaze.build_scale_space(&image).is_err());

    let mut keypoints = Vec::new();
    assert!(kaze.detect(&mut keypoints).is_err());
    let mut descriptors = Array2::zeros((0, 0));
    assert!(kaze.describe(&mut keypoints, &mut descriptors).is_err());
}
