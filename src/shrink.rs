//! Soft-thresholding of wavelet detail coefficients.
//!
//! Operates per level, per direction (H/V/D), on luma and chroma pyramids
//! produced by [`crate::wavelet`]. Two modes are supported: a single
//! "simple" shrink pass, and a two-pass "bi-shrink" pass used when
//! `aggressive` denoising is requested.

use crate::box_blur::box_blur;
use crate::noise_field::NoiseField;
use crate::plane::Plane;
use crate::wavelet::WaveletPyramid;

const EPS_LUMA: f32 = 0.01;

/// Direction of a detail sub-band, used to index per-direction MAD values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    H = 0,
    V = 1,
    D = 2,
}

const DIRECTIONS: [Direction; 3] = [Direction::H, Direction::V, Direction::D];

/// Per-level, per-direction MAD values, as computed once and reused by both
/// the luma shrink and (for the coupling term) the chroma shrink.
#[derive(Debug, Clone)]
pub struct MadTable {
    /// `mad[level][direction]`.
    pub values: Vec<[f32; 3]>,
}

impl MadTable {
    pub fn get(&self, level: u32, dir: Direction) -> f32 {
        self.values[level as usize][dir as usize]
    }
}

/// Scratch buffers reused across levels and directions to avoid
/// reallocating inside the shrink loop.
pub struct ShrinkScratch {
    s: Plane,
    s_blur: Plane,
    blur_scratch: Plane,
}

impl ShrinkScratch {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            s: Plane::zeros(width, height),
            s_blur: Plane::zeros(width, height),
            blur_scratch: Plane::zeros(width, height),
        }
    }
}

/// Options shared by the luma and chroma shrink entry points.
#[derive(Debug, Clone)]
pub struct ShrinkParams {
    pub scale: f32,
    pub bishrink: bool,
    /// Per-level override for the noise-variance field (`vari[level]`),
    /// applied uniformly to every pixel when `edge` is set.
    pub vari: Option<Vec<f32>>,
    pub edge: bool,
}

fn level_factor(mad_l: f32, level: u32) -> f32 {
    mad_l * 5.0 / (level as f32 + 1.0)
}

fn blur_radius(level: u32, scale: f32) -> usize {
    (((level + 2) as f32) / scale).ceil().max(1.0) as usize
}

/// Shrinks one detail band in place using the simple (single-pass) formula.
fn shrink_simple(
    coeffs: &mut Plane,
    level: u32,
    mad_l: f32,
    noise: &NoiseField,
    scale: f32,
    vari_override: Option<f32>,
    scratch: &mut ShrinkScratch,
) {
    let (w, h) = (coeffs.width(), coeffs.height());
    let lf = level_factor(mad_l, level);

    let mut m_row = vec![0.0f32; w];
    let mut tau_row = vec![0.0f32; w];
    let mut exp_args = vec![0.0f32; w];
    for y in 0..h {
        for x in 0..w {
            let c = coeffs.get(x, y);
            let m = c * c;
            let noisevar = vari_override.unwrap_or_else(|| noise.lum_at(x, y));
            let tau = (lf * noisevar).max(1e-12);
            m_row[x] = m;
            tau_row[x] = tau;
            exp_args[x] = -m / (9.0 * tau);
        }
        crate::math::exp_inplace(&mut exp_args);
        for x in 0..w {
            let s = m_row[x] / (m_row[x] + tau_row[x] * exp_args[x] + EPS_LUMA);
            scratch.s.set(x, y, s);
        }
    }

    let radius = blur_radius(level, scale);
    box_blur(
        &scratch.s,
        &mut scratch.s_blur,
        &mut scratch.blur_scratch,
        radius,
        radius,
        w,
        h,
    );

    for y in 0..h {
        for x in 0..w {
            let c = coeffs.get(x, y);
            let s = scratch.s.get(x, y);
            let sb = scratch.s_blur.get(x, y);
            let factor = (sb * sb + s * s) / (sb + s + EPS_LUMA);
            coeffs.set(x, y, c * factor);
        }
    }
}

/// Shrinks the luma (`L`) pyramid in place.
pub fn shrink_luma(
    pyramid: &mut WaveletPyramid,
    mad: &MadTable,
    noise: &NoiseField,
    params: &ShrinkParams,
    scratch: &mut ShrinkScratch,
) {
    let levels = pyramid.levels();
    let vari_at =
        |level: u32| -> Option<f32> { params.edge.then(|| params.vari.as_ref().map(|v| v[level as usize])).flatten() };

    let mut pass = |order: &dyn Fn(u32) -> u32| {
        for i in 0..levels {
            let level = order(i);
            let bands = pyramid.level_coeffs(level);
            for dir in DIRECTIONS {
                let coeffs = match dir {
                    Direction::H => &mut bands.h,
                    Direction::V => &mut bands.v,
                    Direction::D => &mut bands.d,
                };
                let mad_l = mad.get(level, dir);
                shrink_simple(coeffs, level, mad_l, noise, params.scale, vari_at(level), scratch);
            }
        }
    };

    if params.bishrink {
        pass(&|i| levels - 1 - i);
        pass(&|i| i);
    } else {
        pass(&|i| i);
    }
}

/// Shrinks one chroma detail band in place, coupling it to the matching
/// luma band at the same level/direction.
#[allow(clippy::too_many_arguments)]
fn shrink_chroma_direction(
    coeffs_ab: &mut Plane,
    coeffs_l: &Plane,
    mad_ab: f32,
    mad_l: f32,
    noise: &NoiseField,
    chroma_curve_active: bool,
    global_chroma_variance: f32,
    scale: f32,
    level: u32,
    scratch: &mut ShrinkScratch,
) {
    let (w, h) = (coeffs_ab.width(), coeffs_ab.height());
    let madab_eff = if chroma_curve_active {
        mad_ab
    } else {
        mad_ab * global_chroma_variance
    };

    let mad_l_floor = mad_l.max(1e-12);
    let mut exp_args = vec![0.0f32; w];
    for y in 0..h {
        for x in 0..w {
            let m_ab = {
                let c = coeffs_ab.get(x, y);
                c * c
            };
            let m_l = {
                let c = coeffs_l.get(x, y);
                c * c
            };
            let noisevarchrom = noise.chrom_at(x, y).max(1e-6);
            let denom = (noisevarchrom * madab_eff).max(1e-12);
            exp_args[x] = -(m_ab / denom) - (m_l / (9.0 * mad_l_floor));
        }
        crate::math::exp_inplace(&mut exp_args);
        for x in 0..w {
            scratch.s.set(x, y, 1.0 - exp_args[x]);
        }
    }

    let radius = blur_radius(level, scale);
    box_blur(
        &scratch.s,
        &mut scratch.s_blur,
        &mut scratch.blur_scratch,
        radius,
        radius,
        w,
        h,
    );

    for y in 0..h {
        for x in 0..w {
            let c = coeffs_ab.get(x, y);
            let s = scratch.s.get(x, y);
            let sb = scratch.s_blur.get(x, y);
            let factor = (sb * sb + s * s) / (sb + s + EPS_LUMA);
            coeffs_ab.set(x, y, c * factor);
        }
    }
}

/// Shrinks a chroma (`a` or `b`) pyramid in place.
#[allow(clippy::too_many_arguments)]
pub fn shrink_chroma(
    pyramid: &mut WaveletPyramid,
    luma_pyramid: &WaveletPyramid,
    mad_ab: &MadTable,
    mad_l: &MadTable,
    noise: &NoiseField,
    chroma_curve_active: bool,
    global_chroma_variance: f32,
    params: &ShrinkParams,
    scratch: &mut ShrinkScratch,
) {
    let levels = pyramid.levels();

    let mut run_level = |level: u32, square_attenuate: bool| {
        let luma_bands = luma_pyramid.level_coeffs_ref(level);
        let l_for_dir = |dir: Direction| match dir {
            Direction::H => &luma_bands.h,
            Direction::V => &luma_bands.v,
            Direction::D => &luma_bands.d,
        };
        let luma_refs: [Plane; 3] = [
            l_for_dir(Direction::H).clone(),
            l_for_dir(Direction::V).clone(),
            l_for_dir(Direction::D).clone(),
        ];

        let bands = pyramid.level_coeffs(level);
        for dir in DIRECTIONS {
            let coeffs = match dir {
                Direction::H => &mut bands.h,
                Direction::V => &mut bands.v,
                Direction::D => &mut bands.d,
            };
            shrink_chroma_direction(
                coeffs,
                &luma_refs[dir as usize],
                mad_ab.get(level, dir),
                mad_l.get(level, dir),
                noise,
                chroma_curve_active,
                global_chroma_variance,
                params.scale,
                level,
                scratch,
            );
            if square_attenuate {
                for v in coeffs.as_mut_slice() {
                    *v *= v.abs();
                }
            }
        }
    };

    if params.bishrink {
        for i in 0..levels {
            run_level(levels - 1 - i, true);
        }
        for level in 0..levels {
            run_level(level, false);
        }
    } else {
        for level in 0..levels {
            run_level(level, false);
        }
    }
}
