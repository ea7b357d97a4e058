//! Orchestrates a full denoise call: gamma bracketing, tile partitioning
//! (single canonical tile, per an open design question discussed below),
//! wavelet shrink, DCT detail recovery, and the inverse conversions back to RGB.

use crate::config::{ChromaMethod, DenoiseConfig, NoiseCurves};
use crate::dct::DctTileEngine;
use crate::detail_mask::detail_mask;
use crate::error::{Diagnostic, Result};
use crate::mad::mad_rgb;
use crate::median;
use crate::noise_field::NoiseField;
use crate::plane::Plane;
use crate::rect::IntRect;
use crate::rgb_image::{lch_to_rgb, rgb_to_lch, ColorSpace, GammaLut, RgbImage, WorkingProfile};
use crate::runtime::DenoiseRuntime;
use crate::shrink::{self, MadTable, ShrinkParams, ShrinkScratch};
use crate::wavelet::{self, WaveletPyramid};

/// Pixels whose chroma magnitude exceeds this get a mild saturation boost
/// before the inverse color conversion (the magenta-guard constant).
const CHROMA_BOOST_THRESHOLD: f32 = 3000.0;
/// Driver tile size and overlap (`Tile_calc`'s `tilesize`/`overlap`).
const TILE_SIZE: usize = 1024;
const TILE_OVERLAP: usize = 128;

/// Tile geometry as `Tile_calc` would report it. This crate implements the
/// canonical single-tile path: `bounds` always covers the whole image and
/// `numtiles_{w,h}` are reported only for the diagnostic log line, never used
/// to actually split the image. Multi-tile feathered blending is left as an
/// open design question; the feather math it would need already exists in
/// [`crate::dct`]'s `tilemask_in`/`tilemask_out` tables.
struct TileGeometry {
    numtiles_w: usize,
    numtiles_h: usize,
    bounds: IntRect,
}

fn tile_calc(width: usize, height: usize) -> TileGeometry {
    let step = TILE_SIZE - TILE_OVERLAP;
    let numtiles_w = if width > TILE_SIZE { width.div_ceil(step) } else { 1 };
    let numtiles_h = if height > TILE_SIZE { height.div_ceil(step) } else { 1 };
    let image = IntRect::new(0, 0, width as i64, height as i64);
    TileGeometry {
        numtiles_w,
        numtiles_h,
        bounds: image.clip_to(image),
    }
}
/// Scale of the magenta-guard boost itself; an implementation decision left
/// free (not a normative constant).
const CHROMA_BOOST_GAIN: f32 = 0.1;

/// Denoises `image` in place. `src == dst` is inherent to this signature;
/// see [`denoise_into`] for an out-of-place entry point.
///
/// Returns the diagnostics collected from any stage that degraded
/// gracefully instead of aborting the call.
#[allow(clippy::too_many_arguments)]
pub fn denoise(
    image: &mut RgbImage,
    cfg: &DenoiseConfig,
    wp: &WorkingProfile,
    exposure: f32,
    noise_curves: &NoiseCurves,
    runtime: &DenoiseRuntime,
    scale: f32,
    is_raw: bool,
) -> Result<Vec<Diagnostic>> {
    cfg.validate()?;
    Plane::check_nonempty(image.width(), image.height())?;

    if cfg.is_noop(noise_curves) {
        log::trace!("denoise: short-circuit, nothing requested");
        return Ok(Vec::new());
    }

    let mut diagnostics = Vec::new();
    let (w, h) = (image.width(), image.height());
    let geometry = tile_calc(w, h);
    log::debug!(
        "denoise: {w}x{h}, numtiles={}x{}, bounds={:?}, luma={} chroma={}",
        geometry.numtiles_w,
        geometry.numtiles_h,
        geometry.bounds,
        cfg.luma,
        cfg.chroma
    );
    if geometry.numtiles_w > 1 || geometry.numtiles_h > 1 {
        log::trace!("denoise: multi-tile geometry reported but canonical single-tile path is used regardless");
    }

    let gamma = GammaLut::build(cfg.gamma, is_raw);
    let gain = 2f32.powf(exposure);

    let mut r = image.r().clone();
    let mut g = image.g().clone();
    let mut b = image.b().clone();
    for plane in [&mut r, &mut g, &mut b] {
        for v in plane.as_mut_slice() {
            *v = gamma.apply((*v * gain).max(0.0));
        }
    }

    let (mut l_plane, mut a_plane, mut b_plane) = to_working_space(&r, &g, &b, wp, cfg.color_space);

    if let Some(median_cfg) = &cfg.median {
        let bound = median_cfg.bound.map(|v| v.0);
        let mut filtered = Plane::zeros(w, h);
        median::median(&l_plane, &mut filtered, median_cfg.kind, median_cfg.iterations, bound);
        l_plane = filtered;
    }

    let (realred, realblue) = chroma_amounts(cfg, &a_plane, &b_plane);
    let noise = build_noise_field(w, h, cfg, noise_curves, &l_plane, &a_plane, &b_plane, realred, realblue);

    // Neither the luma nor the chroma shrink stage below needs the luma
    // pyramid when both sliders are at zero; skip building it so a
    // median-only call (luma == chroma == 0, median set) doesn't pay for a
    // wavelet decomposition nothing will read. `execwavelet` additionally
    // covers the near-zero-chroma-with-median case the plain `> 0` checks
    // can't express.
    let levels = wavelet_level_count(cfg, realred, realblue, scale, w.min(h));
    let mut l_pyramid = None;
    let mut mad_l = None;
    if (cfg.luma > 0 || cfg.chroma > 0) && execwavelet(cfg) {
        let pyramid = wavelet::decompose(&l_plane, levels)?;
        mad_l = Some(build_mad_table(&pyramid));
        l_pyramid = Some(pyramid);
    }

    if cfg.chroma > 0 {
        let l_pyramid = l_pyramid.as_ref().expect("built above since chroma > 0");
        let mad_l = mad_l.as_ref().expect("built above since chroma > 0");
        let mut a_pyramid = wavelet::decompose(&a_plane, levels)?;
        let mut b_pyramid = wavelet::decompose(&b_plane, levels)?;
        let mad_a = build_mad_table(&a_pyramid);
        let mad_b = build_mad_table(&b_pyramid);
        let mut scratch = ShrinkScratch::new(w, h);
        let params = ShrinkParams {
            scale,
            bishrink: cfg.aggressive,
            vari: None,
            edge: false,
        };
        let chroma_curve_active = noise_curves.chroma_curve.is_some();

        shrink::shrink_chroma(
            &mut a_pyramid,
            &l_pyramid,
            &mad_a,
            &mad_l,
            &noise,
            chroma_curve_active,
            realred,
            &params,
            &mut scratch,
        );
        shrink::shrink_chroma(
            &mut b_pyramid,
            &l_pyramid,
            &mad_b,
            &mad_l,
            &noise,
            chroma_curve_active,
            realblue,
            &params,
            &mut scratch,
        );

        a_plane = wavelet::reconstruct(&a_pyramid);
        b_plane = wavelet::reconstruct(&b_pyramid);
    }

    let mut l_final = l_plane.clone();

    if cfg.luma > 0 {
        let lin = l_plane.clone();
        let mut l_pyramid_mut = l_pyramid.expect("built above since luma > 0");
        let mad_l = mad_l.expect("built above since luma > 0");
        let mut scratch = ShrinkScratch::new(w, h);
        let params = ShrinkParams {
            scale,
            bishrink: cfg.aggressive,
            vari: None,
            edge: false,
        };
        shrink::shrink_luma(&mut l_pyramid_mut, &mad_l, &noise, &params, &mut scratch);
        let l_shrunk = wavelet::reconstruct(&l_pyramid_mut);

        let mut residual = Plane::zeros(w, h);
        for i in 0..(w * h) {
            residual.as_mut_slice()[i] = lin.as_slice()[i] - l_shrunk.as_slice()[i];
        }

        let mask = if cfg.luminance_detail_thresh > 0 {
            Some(detail_mask(&l_shrunk, cfg.luminance_detail_thresh as f32 / 100.0, 25.0 / scale))
        } else {
            None
        };

        match DctTileEngine::new(runtime) {
            Ok(engine) => match engine.recover_detail(&residual, mask.as_ref(), cfg.luminance_detail, scale) {
                Ok(ldetail) => {
                    l_final = l_shrunk;
                    for i in 0..(w * h) {
                        l_final.as_mut_slice()[i] += ldetail.as_slice()[i];
                    }
                }
                Err(_) => {
                    diagnostics.push(Diagnostic::new("dct", "detail recovery failed, using wavelet output only"));
                    l_final = l_shrunk;
                }
            },
            Err(_) => {
                diagnostics.push(Diagnostic::new("dct", "plan allocation failed, skipping detail recovery"));
                l_final = l_shrunk;
            }
        }
    }

    apply_chroma_boost(&mut a_plane, &mut b_plane, realred, realblue);

    let (mut r_out, mut g_out, mut b_out) = from_working_space(&l_final, &a_plane, &b_plane, wp, cfg.color_space);

    for plane in [&mut r_out, &mut g_out, &mut b_out] {
        for v in plane.as_mut_slice() {
            *v = gamma.invert(*v) / gain;
        }
    }

    let nonfinite = replace_nonfinite(&mut r_out, image.r())
        + replace_nonfinite(&mut g_out, image.g())
        + replace_nonfinite(&mut b_out, image.b());
    if nonfinite > 0 {
        diagnostics.push(Diagnostic::new(
            "numeric",
            format!("{nonfinite} non-finite sample(s) replaced with source pixels"),
        ));
    }

    image.r_mut().copy_from(&r_out);
    image.g_mut().copy_from(&g_out);
    image.b_mut().copy_from(&b_out);

    Ok(diagnostics)
}

/// Out-of-place entry point: copies `src` into `dst`, then denoises `dst`.
pub fn denoise_into(
    src: &RgbImage,
    dst: &mut RgbImage,
    cfg: &DenoiseConfig,
    wp: &WorkingProfile,
    exposure: f32,
    noise_curves: &NoiseCurves,
    runtime: &DenoiseRuntime,
    scale: f32,
    is_raw: bool,
) -> Result<Vec<Diagnostic>> {
    if (src.width(), src.height()) != (dst.width(), dst.height()) {
        crate::error::bail!(crate::error::DimensionError::Mismatch {
            src: (src.width() as u32, src.height() as u32),
            dst: (dst.width() as u32, dst.height() as u32),
        });
    }
    dst.copy_from(src);
    denoise(dst, cfg, wp, exposure, noise_curves, runtime, scale, is_raw)
}

fn to_working_space(r: &Plane, g: &Plane, b: &Plane, wp: &WorkingProfile, space: ColorSpace) -> (Plane, Plane, Plane) {
    let (w, h) = (r.width(), r.height());
    let mut l = Plane::zeros(w, h);
    let mut a = Plane::zeros(w, h);
    let mut bb = Plane::zeros(w, h);
    for i in 0..(w * h) {
        let (lv, av, bv) = rgb_to_lch(r.as_slice()[i], g.as_slice()[i], b.as_slice()[i], wp, space);
        l.as_mut_slice()[i] = lv;
        a.as_mut_slice()[i] = av;
        bb.as_mut_slice()[i] = bv;
    }
    (l, a, bb)
}

fn from_working_space(l: &Plane, a: &Plane, b: &Plane, wp: &WorkingProfile, space: ColorSpace) -> (Plane, Plane, Plane) {
    let (w, h) = (l.width(), l.height());
    let mut r = Plane::zeros(w, h);
    let mut g = Plane::zeros(w, h);
    let mut bb = Plane::zeros(w, h);
    for i in 0..(w * h) {
        let (rv, gv, bv) = lch_to_rgb(l.as_slice()[i], a.as_slice()[i], b.as_slice()[i], wp, space);
        r.as_mut_slice()[i] = rv;
        g.as_mut_slice()[i] = gv;
        bb.as_mut_slice()[i] = bv;
    }
    (r, g, bb)
}

fn build_mad_table(pyramid: &WaveletPyramid) -> MadTable {
    let mut values = Vec::with_capacity(pyramid.levels() as usize);
    for level in 0..pyramid.levels() {
        let bands = pyramid.level_coeffs_ref(level);
        values.push([
            mad_rgb(bands.h.as_slice()),
            mad_rgb(bands.v.as_slice()),
            mad_rgb(bands.d.as_slice()),
        ]);
    }
    MadTable { values }
}

/// Derives `(realred, realblue)`, the per-tile chroma noise-variance
/// multipliers, from either the user sliders directly (`Manual`) or the
/// tile's own chroma statistics (`Automatic`).
fn chroma_amounts(cfg: &DenoiseConfig, a_plane: &Plane, b_plane: &Plane) -> (f32, f32) {
    match cfg.chroma_method {
        ChromaMethod::Manual => {
            let base = cfg.chroma as f32;
            (
                (base * (1.0 + cfg.chroma_red_green / 100.0)).max(0.0),
                (base * (1.0 + cfg.chroma_blue_yellow / 100.0)).max(0.0),
            )
        }
        ChromaMethod::Automatic => {
            let median_a = 0.6745 * mad_rgb(a_plane.as_slice());
            let median_b = 0.6745 * mad_rgb(b_plane.as_slice());
            (median_a.max(1.0), median_b.max(1.0))
        }
    }
}

/// Mirrors `FTblockDN.cc`'s `execwavelet` gate (lines 2231-2239): the
/// wavelet pass is skipped only when luminance denoise is off, the chroma
/// slider is below a small threshold, and a median pass is already
/// requested to do the work instead; `Automatic` chroma derives its amount
/// from the tile itself, so it always forces the wavelet pass back on.
fn execwavelet(cfg: &DenoiseConfig) -> bool {
    let interm_med = cfg.chroma as f32 / 10.0;
    let mut exec = true;
    if cfg.luma == 0 && interm_med < 0.05 && cfg.median.is_some() {
        exec = false;
    }
    if cfg.chroma_method != ChromaMethod::Manual {
        exec = true;
    }
    exec
}

fn build_noise_field(
    w: usize,
    h: usize,
    cfg: &DenoiseConfig,
    noise_curves: &NoiseCurves,
    l_plane: &Plane,
    a_plane: &Plane,
    b_plane: &Plane,
    realred: f32,
    realblue: f32,
) -> NoiseField {
    let base_lum = (cfg.luma as f32).max(1.0);
    let base_chrom = (realred + realblue).max(1.0) / 2.0;

    if !noise_curves.active() {
        return NoiseField::constant(w, h, base_lum, base_chrom);
    }

    NoiseField::build(
        w,
        h,
        |x, y| match &noise_curves.luma_curve {
            Some(curve) => base_lum * curve.eval((l_plane.get(x, y) / 65535.0).clamp(0.0, 1.0)),
            None => base_lum,
        },
        |x, y| match &noise_curves.chroma_curve {
            Some(curve) => {
                let mag = (a_plane.get(x, y).hypot(b_plane.get(x, y)) / 65535.0).clamp(0.0, 1.0);
                base_chrom * curve.eval(mag)
            }
            None => base_chrom,
        },
    )
}

/// Wavelet level-count policy.
fn wavelet_level_count(cfg: &DenoiseConfig, realred: f32, realblue: f32, scale: f32, min_dim: usize) -> u32 {
    let maxamp = realred.max(realblue);
    let mut levels: i32 = if maxamp < 8.0 {
        5
    } else if maxamp < 10.0 {
        6
    } else if maxamp < 15.0 {
        7
    } else {
        8
    };
    if cfg.aggressive {
        levels += 2;
    }
    levels = levels.min(8);
    let scale_reduction = scale.max(1e-6).ln().ceil() as i32;
    levels = (levels - scale_reduction).max(5);
    let cap = level_cap_for_dim(min_dim) as i32;
    levels = levels.min(cap);
    wavelet::clamp_levels(levels.max(3) as u32, min_dim, min_dim)
}

fn level_cap_for_dim(min_dim: usize) -> u32 {
    if min_dim < 16 {
        3
    } else if min_dim < 32 {
        4
    } else if min_dim < 64 {
        5
    } else if min_dim < 128 {
        6
    } else if min_dim < 256 {
        7
    } else {
        8
    }
}

/// Replaces any non-finite sample in `out` with the corresponding sample
/// from `src`, returning how many were replaced.
fn replace_nonfinite(out: &mut Plane, src: &Plane) -> usize {
    let src = src.as_slice();
    let mut count = 0;
    for (i, v) in out.as_mut_slice().iter_mut().enumerate() {
        if !v.is_finite() {
            *v = src[i];
            count += 1;
        }
    }
    count
}

/// Magenta guard: boosts high-chroma pixels slightly before the inverse
/// color conversion.
fn apply_chroma_boost(a_plane: &mut Plane, b_plane: &mut Plane, realred: f32, realblue: f32) {
    let boost_a = 1.0 + CHROMA_BOOST_GAIN * realred / 100.0;
    let boost_b = 1.0 + CHROMA_BOOST_GAIN * realblue / 100.0;
    for i in 0..a_plane.as_slice().len() {
        let av = a_plane.as_slice()[i];
        let bv = b_plane.as_slice()[i];
        if av.hypot(bv) > CHROMA_BOOST_THRESHOLD {
            a_plane.as_mut_slice()[i] = av * boost_a;
            b_plane.as_mut_slice()[i] = bv * boost_b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DenoiseConfig;

    fn flat_image(w: usize, h: usize, value: f32) -> RgbImage {
        RgbImage::from_planes(
            Plane::from_vec(w, h, vec![value; w * h]),
            Plane::from_vec(w, h, vec![value; w * h]),
            Plane::from_vec(w, h, vec![value; w * h]),
        )
        .unwrap()
    }

    #[test]
    fn execwavelet_skips_only_for_near_zero_chroma_with_median() {
        use crate::config::MedianConfig;

        let with_median = |chroma, luma| DenoiseConfig {
            luma,
            chroma,
            median: Some(MedianConfig {
                kind: crate::config::MedianKind::Soft3x3,
                iterations: 1,
                bound: None,
            }),
            ..Default::default()
        };

        assert!(!execwavelet(&with_median(0, 0)));
        assert!(execwavelet(&with_median(1, 0)), "any nonzero chroma keeps wavelet on");
        assert!(execwavelet(&with_median(0, 1)), "luma on keeps wavelet on");

        let no_median = DenoiseConfig {
            luma: 0,
            chroma: 0,
            median: None,
            ..Default::default()
        };
        assert!(execwavelet(&no_median), "nothing to fall back on, so the wavelet path stays live");

        let automatic = DenoiseConfig {
            chroma_method: ChromaMethod::Automatic,
            ..with_median(0, 0)
        };
        assert!(execwavelet(&automatic), "automatic chroma always forces the wavelet pass");
    }

    #[test]
    fn short_circuit_leaves_image_unchanged() {
        let mut image = flat_image(16, 16, 10000.0);
        let before = image.r().as_slice().to_vec();
        let cfg = DenoiseConfig::default();
        let wp = WorkingProfile::identity_like_srgb();
        let runtime = DenoiseRuntime::single_threaded();
        let diags = denoise(
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
        assert!(diags.is_empty());
        assert_eq!(image.r().as_slice(), before.as_slice());
    }

    #[test]
    fn median_only_call_skips_wavelet_and_still_runs() {
        use crate::config::{MedianConfig, MedianKind};

        let mut image = flat_image(32, 32, 10000.0);
        let cfg = DenoiseConfig {
            luma: 0,
            chroma: 0,
            median: Some(MedianConfig {
                kind: MedianKind::Soft3x3,
                iterations: 1,
                bound: None,
            }),
            ..Default::default()
        };
        let wp = WorkingProfile::identity_like_srgb();
        let runtime = DenoiseRuntime::single_threaded();
        let diags = denoise(
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
        assert!(diags.is_empty());
        for &v in image.r().as_slice() {
            assert!((v - 10000.0).abs() < 1.0, "{v}");
        }
    }

    #[test]
    fn flat_image_stays_nearly_flat_after_denoise() {
        let mut image = flat_image(128, 128, 10000.0);
        let cfg = DenoiseConfig {
            luma: 50,
            chroma: 50,
            luminance_detail: 50.0,
            luminance_detail_thresh: 50,
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
        for &v in image.r().as_slice() {
            assert!((v - 10000.0).abs() < 50.0, "{v}");
        }
    }

    #[test]
    fn replace_nonfinite_restores_source_pixel() {
        let src = Plane::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let mut out = Plane::from_vec(2, 2, vec![1.0, f32::NAN, f32::INFINITY, 4.0]);
        let replaced = replace_nonfinite(&mut out, &src);
        assert_eq!(replaced, 2);
        assert_eq!(out.as_slice(), src.as_slice());
    }

    #[test]
    fn tile_calc_reports_single_tile_below_threshold() {
        let geometry = tile_calc(512, 256);
        assert_eq!(geometry.numtiles_w, 1);
        assert_eq!(geometry.numtiles_h, 1);
        assert_eq!(geometry.bounds, IntRect::new(0, 0, 512, 256));
    }

    #[test]
    fn tile_calc_reports_multiple_tiles_above_threshold() {
        let geometry = tile_calc(2200, 300);
        assert!(geometry.numtiles_w > 1);
        assert_eq!(geometry.numtiles_h, 1);
    }

    #[test]
    fn in_place_matches_out_of_place() {
        let mut a = flat_image(32, 32, 8000.0);
        let src = flat_image(32, 32, 8000.0);
        let mut b = flat_image(32, 32, 0.0);
        let cfg = DenoiseConfig {
            luma: 30,
            chroma: 30,
            ..Default::default()
        };
        let wp = WorkingProfile::identity_like_srgb();
        let runtime = DenoiseRuntime::single_threaded();

        denoise(&mut a, &cfg, &wp, 0.0, &NoiseCurves::default(), &runtime, 1.0, true).unwrap();
        denoise_into(&src, &mut b, &cfg, &wp, 0.0, &NoiseCurves::default(), &runtime, 1.0, true).unwrap();

        for i in 0..(32 * 32) {
            assert!((a.r().as_slice()[i] - b.r().as_slice()[i]).abs() < 1e-3);
        }
    }
}
