//! Perceptual detail mask used to attenuate the DCT engine's recovered
//! high-frequency residual in flat/noisy regions.
//!
//! Built once per `denoise()` call at quarter resolution: downsample,
//! compand into a log-like domain, take a clipped Laplacian magnitude,
//! upsample back, reshape with an S-curve, and smooth. Constants below
//! (`SCALING`, `THRESHOLD`, `CEILING`) are chosen to match a well-tuned
//! reference implementation's defaults; bit-exact legacy reproduction is not
//! a goal, but these particular constants carry through cleanly.

use crate::box_blur::box_blur;
use crate::plane::Plane;

const SCALING: f32 = 65535.0;
const THRESHOLD: f32 = 25.0;
const CEILING: f32 = 10000.0;

/// Log-like companding: `log(1 + x*(base-1)) / log(base)`, clamped to
/// `x ∈ [0, 1]` first.
fn xlin2log(x: f32, base: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    (1.0 + x * (base - 1.0)).ln() / base.ln()
}

/// Computes the perceptual detail mask for a luma plane (values expected in
/// `[0, 65535]`). `amount` (typically `luminance_detail_thresh / 100`) scales
/// how strongly flat regions are suppressed; `0` disables the mask (callers
/// should skip calling this and use an all-ones mask instead, matching the
/// driver's `luminance_detail_thresh == 0` short-circuit).
///
/// Returns a same-size plane of weights in `[0, 1]`. Falls back to an
/// all-ones mask when the source is too small to usefully downsample
/// (`width < 8 || height < 8`).
pub fn detail_mask(luma: &Plane, amount: f32, blur_radius: f32) -> Plane {
    let (w, h) = (luma.width(), luma.height());
    if w < 8 || h < 8 {
        return Plane::from_vec(w, h, vec![1.0; w * h]);
    }

    let (dw, dh) = (w / 4, h / 4);
    let mut l2 = Plane::zeros(dw, dh);
    for y in 0..dh {
        for x in 0..dw {
            let v = bilinear_sample(luma, x as f32 * 4.0 + 1.5, y as f32 * 4.0 + 1.5);
            l2.set(x, y, xlin2log(v / SCALING, 50.0));
        }
    }

    let m2 = laplacian(&l2, THRESHOLD / SCALING, CEILING / SCALING, amount);

    let mut mask = Plane::zeros(w, h);
    let thr = 1.0 - amount;
    for y in 0..h {
        for x in 0..w {
            let v = bilinear_sample(&m2, x as f32 / 4.0 - 0.5, y as f32 / 4.0 - 0.5);
            let shaped = xlin2log((v + thr).clamp(0.0, 1.0).powf(2.23), 101.0);
            mask.set(x, y, shaped.clamp(0.0, 1.0));
        }
    }

    if blur_radius > 0.0 {
        let radius = blur_radius.round().max(1.0) as usize;
        let mut scratch = Plane::zeros(w, h);
        let mut out = Plane::zeros(w, h);
        // Three box-blur passes approximate a Gaussian blur.
        box_blur(&mask, &mut out, &mut scratch, radius, radius, w, h);
        box_blur(&out, &mut mask, &mut scratch, radius, radius, w, h);
        box_blur(&mask, &mut out, &mut scratch, radius, radius, w, h);
        out
    } else {
        mask
    }
}

/// Clipped Laplacian magnitude over the full 8-neighborhood, with negative
/// samples treated as zero, matching the companded-domain input's expected
/// non-negativity.
fn laplacian(src: &Plane, threshold: f32, ceiling: f32, factor: f32) -> Plane {
    let (w, h) = (src.width(), src.height());
    let mut dst = Plane::zeros(w, h);
    let f = factor / ceiling;
    let get = |x: usize, y: usize| src.get(x, y).max(0.0);
    let reflect = |i: isize, len: usize| -> usize {
        if i < 0 {
            (i + 2).max(0) as usize
        } else if i as usize >= len {
            (i - 2).max(0) as usize
        } else {
            i as usize
        }
    };

    for y in 0..h {
        let n = reflect(y as isize - 1, h);
        let s = reflect(y as isize + 1, h);
        for x in 0..w {
            let wx = reflect(x as isize - 1, w);
            let ex = reflect(x as isize + 1, w);
            let v = -8.0 * get(x, y)
                + get(x, n)
                + get(x, s)
                + get(wx, y)
                + get(ex, y)
                + get(wx, n)
                + get(ex, n)
                + get(wx, s)
                + get(ex, s);
            dst.set(x, y, (v.abs() - threshold).clamp(0.0, ceiling) * f);
        }
    }
    dst
}

/// Bilinear sample of `plane` at real coordinates `(x, y)`, clamped to the
/// plane's bounds at the edges (no wraparound, no extrapolation past 0/size-1).
fn bilinear_sample(plane: &Plane, x: f32, y: f32) -> f32 {
    let (w, h) = (plane.width(), plane.height());
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = plane.get(x0, y0) * (1.0 - fx) + plane.get(x1, y0) * fx;
    let bottom = plane.get(x0, y1) * (1.0 - fx) + plane.get(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}
