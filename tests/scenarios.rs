//! Cross-module scenario tests exercising `denoise()`/`median()` through the
//! public surface only, one per scenario in the design doc's testable
//! properties section.

use artdenoise::{
    denoise, denoise_into, median, ChromaMethod, ColorSpace, DenoiseConfig, DenoiseRuntime,
    MedianConfig, MedianKind, NoiseCurves, Plane, RgbImage, WorkingProfile,
};

fn flat_image(w: usize, h: usize, value: f32) -> RgbImage {
    RgbImage::from_planes(
        Plane::from_vec(w, h, vec![value; w * h]),
        Plane::from_vec(w, h, vec![value; w * h]),
        Plane::from_vec(w, h, vec![value; w * h]),
    )
    .unwrap()
}

/// Deterministic pseudo-noise generator (LCG), so scenarios needing "Gaussian
/// noise" or "salt-and-pepper" don't depend on an RNG crate dependency.
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.0 >> 40) as f32) / (1u64 << 24) as f32
    }

    /// Approximately standard-normal via a 12-term sum (Irwin-Hall), cheap
    /// and dependency-free.
    fn next_gaussian(&mut self) -> f32 {
        let mut sum = 0.0;
        for _ in 0..12 {
            sum += self.next_f32();
        }
        sum - 6.0
    }
}

// S1: a flat field run through a mid-strength denoise should come back
// almost unchanged; there is no noise to remove and no edges to ring on.
#[test]
fn s1_zero_noise_uniform_stays_within_tolerance() {
    let mut image = flat_image(512, 512, 10000.0);
    let cfg = DenoiseConfig {
        luma: 50,
        chroma: 50,
        luminance_detail: 50.0,
        luminance_detail_thresh: 50,
        gamma: 1.7,
        ..Default::default()
    };
    let wp = WorkingProfile::identity_like_srgb();
    let runtime = DenoiseRuntime::single_threaded();

    denoise(
        &mut image,
        &cfg,
        &wp,
        0.0,
        &NoiseCurves::default(),
        &runtime,
        1.0,
        true,
    )
    .unwrap();

    for plane in [image.r(), image.g(), image.b()] {
        for &v in plane.as_slice() {
            assert!((v - 10000.0).abs() < 50.0, "pixel drifted to {v}");
        }
    }
}

// S2: an isolated impulse should decay with distance rather than spreading
// uniform energy across the whole frame; the à trous filter's amplitude
// falls off geometrically even though its support grows with level count.
#[test]
fn s2_impulse_response_decays_with_distance() {
    let w = 128;
    let h = 128;
    let mut image = flat_image(w, h, 0.0);
    let (cx, cy) = (w / 2, h / 2);
    image.g_mut().set(cx, cy, 65535.0);

    let cfg = DenoiseConfig {
        luma: 0,
        chroma: 100,
        chroma_method: ChromaMethod::Manual,
        ..Default::default()
    };
    let wp = WorkingProfile::identity_like_srgb();
    let runtime = DenoiseRuntime::single_threaded();

    denoise(
        &mut image,
        &cfg,
        &wp,
        0.0,
        &NoiseCurves::default(),
        &runtime,
        1.0,
        true,
    )
    .unwrap();

    let g = image.g();
    let mut center_energy = 0.0f64;
    let mut far_energy = 0.0f64;
    let mut far_count = 0u64;
    for y in 0..h {
        for x in 0..w {
            let dx = (x as isize - cx as isize).unsigned_abs();
            let dy = (y as isize - cy as isize).unsigned_abs();
            let dist = dx.max(dy);
            let v = g.get(x, y).abs() as f64;
            if dist <= 8 {
                center_energy += v;
            } else if dist >= 48 {
                far_energy += v;
                far_count += 1;
            }
        }
    }
    let far_mean = far_energy / far_count.max(1) as f64;

    assert!(
        center_energy > far_energy,
        "impulse energy should concentrate near the source: center={center_energy} far_total={far_energy}"
    );
    assert!(
        far_mean < 500.0,
        "far field should carry only a small fraction of the impulse on average: {far_mean}"
    );
}

// S3: bounded strong 3x3 median on salt-and-pepper noise. Pixels above the
// bound must come through exactly unchanged, and the error on the
// remaining pixels should shrink with more iterations.
#[test]
fn s3_median_bound_preserves_outliers_and_improves_with_iterations() {
    let w = 64;
    let h = 64;
    let mut rng = Lcg::new(42);
    let base: Vec<f32> = (0..w * h)
        .map(|_| 20000.0 + rng.next_f32() * 200.0)
        .collect();
    let mut noisy = base.clone();
    for v in noisy.iter_mut() {
        let roll = rng.next_f32();
        if roll < 0.025 {
            *v = 60000.0;
        } else if roll < 0.05 {
            *v = 0.0;
        }
    }
    let src = Plane::from_vec(w, h, noisy);

    let bound = Some(50000.0);
    let mut once = Plane::zeros(w, h);
    median(&src, &mut once, MedianKind::Strong3x3, 1, bound);
    let mut twice = Plane::zeros(w, h);
    median(&src, &mut twice, MedianKind::Strong3x3, 2, bound);

    for (i, &source_v) in src.as_slice().iter().enumerate() {
        if source_v > 50000.0 {
            assert_eq!(once.as_slice()[i], source_v);
            assert_eq!(twice.as_slice()[i], source_v);
        }
    }

    let rmse = |dst: &Plane| {
        let sum_sq: f64 = base
            .iter()
            .zip(dst.as_slice())
            .map(|(&b, &d)| ((b - d) as f64).powi(2))
            .sum();
        (sum_sq / base.len() as f64).sqrt()
    };
    let rmse_once = rmse(&once);
    let rmse_twice = rmse(&twice);
    assert!(
        rmse_twice <= rmse_once,
        "second iteration should not increase error: once={rmse_once} twice={rmse_twice}"
    );
}

// S4: bi-shrink should leave a flat noisy patch smoother (lower residual
// variance) than simple shrink, for the same slider settings.
#[test]
fn s4_bishrink_is_denser_than_simple_shrink_on_flat_noise() {
    let w = 256;
    let h = 256;
    let mut rng = Lcg::new(7);
    let mut data = vec![0.0f32; w * h];
    for v in data.iter_mut() {
        *v = (20000.0 + rng.next_gaussian() * 200.0).clamp(0.0, 65535.0);
    }

    let make_image = || {
        RgbImage::from_planes(
            Plane::from_vec(w, h, data.clone()),
            Plane::from_vec(w, h, data.clone()),
            Plane::from_vec(w, h, data.clone()),
        )
        .unwrap()
    };

    let wp = WorkingProfile::identity_like_srgb();
    let runtime = DenoiseRuntime::single_threaded();
    let base_cfg = DenoiseConfig {
        luma: 80,
        chroma: 0,
        luminance_detail: 0.0,
        luminance_detail_thresh: 0,
        gamma: 1.0,
        ..Default::default()
    };

    let mut simple = make_image();
    denoise(
        &mut simple,
        &DenoiseConfig { aggressive: false, ..base_cfg },
        &wp,
        0.0,
        &NoiseCurves::default(),
        &runtime,
        1.0,
        true,
    )
    .unwrap();

    let mut aggressive = make_image();
    denoise(
        &mut aggressive,
        &DenoiseConfig { aggressive: true, ..base_cfg },
        &wp,
        0.0,
        &NoiseCurves::default(),
        &runtime,
        1.0,
        true,
    )
    .unwrap();

    let variance = |img: &RgbImage| {
        let slice = img.r().as_slice();
        let mean: f64 = slice.iter().map(|&v| v as f64).sum::<f64>() / slice.len() as f64;
        slice
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / slice.len() as f64
    };

    let var_simple = variance(&simple);
    let var_aggressive = variance(&aggressive);
    let var_input = variance(&make_image());

    assert!(var_simple < var_input, "simple shrink should reduce variance");
    assert!(
        var_aggressive <= var_simple * 1.05,
        "bi-shrink should be at least as smoothing as simple shrink: aggressive={var_aggressive} simple={var_simple}"
    );
}

// S6: in-place and out-of-place calls with the same config and starting
// pixels must agree, for a config that actually exercises every stage.
#[test]
fn s6_in_place_matches_out_of_place() {
    let w = 96;
    let h = 96;
    let mut rng = Lcg::new(99);
    let data: Vec<f32> = (0..w * h)
        .map(|_| (15000.0 + rng.next_gaussian() * 400.0).clamp(0.0, 65535.0))
        .collect();

    let make_image = || {
        RgbImage::from_planes(
            Plane::from_vec(w, h, data.clone()),
            Plane::from_vec(w, h, data.clone()),
            Plane::from_vec(w, h, data.clone()),
        )
        .unwrap()
    };

    let cfg = DenoiseConfig {
        luma: 40,
        chroma: 40,
        luminance_detail: 30.0,
        luminance_detail_thresh: 20,
        median: Some(MedianConfig {
            kind: MedianKind::Soft3x3,
            iterations: 1,
            bound: None,
        }),
        color_space: ColorSpace::Yuv,
        ..Default::default()
    };
    let wp = WorkingProfile::identity_like_srgb();
    let runtime = DenoiseRuntime::single_threaded();

    let mut a = make_image();
    denoise(&mut a, &cfg, &wp, 0.0, &NoiseCurves::default(), &runtime, 1.0, true).unwrap();

    let src = make_image();
    let mut b = flat_image(w, h, 0.0);
    denoise_into(&src, &mut b, &cfg, &wp, 0.0, &NoiseCurves::default(), &runtime, 1.0, true).unwrap();

    for (plane_a, plane_b) in [
        (a.r(), b.r()),
        (a.g(), b.g()),
        (a.b(), b.b()),
    ] {
        for (&va, &vb) in plane_a.as_slice().iter().zip(plane_b.as_slice()) {
            assert!((va - vb).abs() < 1e-3, "{va} vs {vb}");
        }
    }
}
