//! RGB image buffer, working-space color matrices, and the gamma-in/out LUT
//! that brackets a `denoise()` call.

use crate::error::{bail, DimensionError, Result};
use crate::plane::Plane;

/// A width×height RGB image of `f32` samples, one [`Plane`] per channel.
///
/// Raw-pipeline values are expected in the `[0, 65535]` domain; the type
/// itself does not enforce a range.
#[derive(Debug, Clone)]
pub struct RgbImage {
    pub(crate) r: Plane,
    pub(crate) g: Plane,
    pub(crate) b: Plane,
}

impl RgbImage {
    /// Creates a zero-filled image of the given dimensions.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            r: Plane::zeros(width, height),
            g: Plane::zeros(width, height),
            b: Plane::zeros(width, height),
        }
    }

    /// Builds an image from three equally-sized planes.
    pub fn from_planes(r: Plane, g: Plane, b: Plane) -> Result<Self> {
        if (r.width(), r.height()) != (g.width(), g.height())
            || (r.width(), r.height()) != (b.width(), b.height())
        {
            bail!(DimensionError::Mismatch {
                src: (r.width() as u32, r.height() as u32),
                dst: (g.width() as u32, g.height() as u32),
            });
        }
        Ok(Self { r, g, b })
    }

    pub fn width(&self) -> usize {
        self.r.width()
    }

    pub fn height(&self) -> usize {
        self.r.height()
    }

    pub fn r(&self) -> &Plane {
        &self.r
    }
    pub fn g(&self) -> &Plane {
        &self.g
    }
    pub fn b(&self) -> &Plane {
        &self.b
    }
    pub fn r_mut(&mut self) -> &mut Plane {
        &mut self.r
    }
    pub fn g_mut(&mut self) -> &mut Plane {
        &mut self.g
    }
    pub fn b_mut(&mut self) -> &mut Plane {
        &mut self.b
    }

    pub(crate) fn copy_from(&mut self, other: &RgbImage) {
        self.r.copy_from(&other.r);
        self.g.copy_from(&other.g);
        self.b.copy_from(&other.b);
    }
}

/// The RGB working space's 3×3 forward/inverse transform matrices to/from
/// CIE XYZ, supplied by the surrounding raw pipeline.
#[derive(Debug, Clone, Copy)]
pub struct WorkingProfile {
    pub m_rgb_to_xyz: [[f32; 3]; 3],
    pub m_xyz_to_rgb: [[f32; 3]; 3],
}

impl WorkingProfile {
    /// The sRGB/D65-ish working profile used by tests and as a harmless
    /// default for callers that have no real profile handy.
    pub fn identity_like_srgb() -> Self {
        Self {
            m_rgb_to_xyz: [
                [0.4124, 0.3576, 0.1805],
                [0.2126, 0.7152, 0.0722],
                [0.0193, 0.1192, 0.9505],
            ],
            m_xyz_to_rgb: [
                [3.2406, -1.5372, -0.4986],
                [-0.9689, 1.8758, 0.0415],
                [0.0557, -0.2040, 1.0570],
            ],
        }
    }

    fn rgb_to_xyz(&self, r: f32, g: f32, b: f32) -> (f32, f32, f32) {
        let m = &self.m_rgb_to_xyz;
        (
            m[0][0] * r + m[0][1] * g + m[0][2] * b,
            m[1][0] * r + m[1][1] * g + m[1][2] * b,
            m[2][0] * r + m[2][1] * g + m[2][2] * b,
        )
    }

    fn xyz_to_rgb(&self, x: f32, y: f32, z: f32) -> (f32, f32, f32) {
        let m = &self.m_xyz_to_rgb;
        (
            m[0][0] * x + m[0][1] * y + m[0][2] * z,
            m[1][0] * x + m[1][1] * y + m[1][2] * z,
            m[2][0] * x + m[2][1] * y + m[2][2] * z,
        )
    }
}

/// D50 reference white, used by the CIELAB conversion regardless of the
/// working profile's own native white point (matches the fixed-whitepoint
/// convention a reference `Color::XYZ2Lab` implementation uses).
const WHITE_X: f32 = 0.9642;
const WHITE_Y: f32 = 1.0;
const WHITE_Z: f32 = 0.8249;

fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA {
        t * t * t
    } else {
        3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
    }
}

/// Which luma/chroma working space the driver converts RGB into before
/// running the wavelet and DCT passes. Geometrically identical (three
/// planes, one achromatic and two opponent-color).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Lab,
    Yuv,
}

/// Converts a gamma-corrected RGB triplet (in `[0, 65535]`-ish raw units)
/// into the driver's working luma/chroma triplet `(l, a, b)`.
pub fn rgb_to_lch(r: f32, g: f32, b: f32, wp: &WorkingProfile, space: ColorSpace) -> (f32, f32, f32) {
    match space {
        ColorSpace::Lab => {
            let (x, y, z) = wp.rgb_to_xyz(r / 65535.0, g / 65535.0, b / 65535.0);
            let fx = lab_f(x / WHITE_X);
            let fy = lab_f(y / WHITE_Y);
            let fz = lab_f(z / WHITE_Z);
            let l = 116.0 * fy - 16.0;
            let a = 500.0 * (fx - fy);
            let bb = 200.0 * (fy - fz);
            (l * 655.35, a * 655.35, bb * 655.35)
        }
        ColorSpace::Yuv => {
            let y = 0.299 * r + 0.587 * g + 0.114 * b;
            let u = b - y;
            let v = r - y;
            (y, v, u)
        }
    }
}

/// Inverse of [`rgb_to_lch`].
pub fn lch_to_rgb(l: f32, a: f32, b: f32, wp: &WorkingProfile, space: ColorSpace) -> (f32, f32, f32) {
    match space {
        ColorSpace::Lab => {
            let l = l / 655.35;
            let a = a / 655.35;
            let b = b / 655.35;
            let fy = (l + 16.0) / 116.0;
            let fx = fy + a / 500.0;
            let fz = fy - b / 200.0;
            let x = WHITE_X * lab_f_inv(fx);
            let y = WHITE_Y * lab_f_inv(fy);
            let z = WHITE_Z * lab_f_inv(fz);
            let (r, g, bl) = wp.xyz_to_rgb(x, y, z);
            (r * 65535.0, g * 65535.0, bl * 65535.0)
        }
        ColorSpace::Yuv => {
            let (y, v, u) = (l, a, b);
            let r = y + v;
            let bl = y + u;
            let g = (y - 0.299 * r - 0.114 * bl) / 0.587;
            (r, g, bl)
        }
    }
}

/// A piecewise gamma LUT built once per `denoise()` call:
/// linear toe below `threshold`, power law above, with a matching inverse.
/// `gamma` is reduced for non-raw sources per a small continuous map so Lab
/// (TIFF/JPEG) inputs, which are already roughly gamma-corrected, are not
/// over-boosted.
#[derive(Debug, Clone)]
pub struct GammaLut {
    forward: Vec<f32>,
    inverse: Vec<f32>,
    gamma: f32,
}

const LUT_SIZE: usize = 65536;
const GAMMA_THRESHOLD: f32 = 0.001;

fn effective_gamma(user_gamma: f32, is_raw: bool) -> f32 {
    if is_raw {
        return user_gamma;
    }
    if user_gamma < 1.9 {
        1.0 - (1.9 - user_gamma) / 3.0
    } else {
        (1.4 / 1.1) * user_gamma - 1.41818
    }
}

fn gamma_curve(x: f32, gamma: f32, slope: f32) -> f32 {
    if x <= GAMMA_THRESHOLD {
        x * slope
    } else {
        x.powf(1.0 / gamma)
    }
}

impl GammaLut {
    /// Builds the forward/inverse LUT pair for a `denoise()` call.
    pub fn build(user_gamma: f32, is_raw: bool) -> Self {
        let gamma = effective_gamma(user_gamma, is_raw);
        let slope = GAMMA_THRESHOLD.powf(1.0 / gamma - 1.0);
        let inv_gamma = 1.0 / gamma;
        let inv_slope = 1.0 / slope;
        let forward = (0..LUT_SIZE)
            .map(|i| gamma_curve(i as f32 / 65535.0, gamma, slope) * 65535.0)
            .collect();
        let inverse = (0..LUT_SIZE)
            .map(|i| gamma_curve(i as f32 / 65535.0, inv_gamma, inv_slope) * 65535.0)
            .collect();
        Self {
            forward,
            inverse,
            gamma,
        }
    }

    /// Applies the forward (gamma-in) curve, or the identity if `gamma <= 1`.
    pub fn apply(&self, v: f32) -> f32 {
        Self::lookup(&self.forward, v, self.gamma)
    }

    /// Applies the inverse (gamma-out) curve.
    pub fn invert(&self, v: f32) -> f32 {
        Self::lookup(&self.inverse, v, self.gamma)
    }

    fn lookup(lut: &[f32], v: f32, gamma: f32) -> f32 {
        if gamma <= 1.0 || v <= 0.0 {
            return v;
        }
        if v < 65535.0 {
            let lo = v.floor();
            let frac = v - lo;
            let i0 = (lo as usize).min(LUT_SIZE - 1);
            let i1 = (i0 + 1).min(LUT_SIZE - 1);
            lut[i0] * (1.0 - frac) + lut[i1] * frac
        } else {
            (v / 65535.0).powf(1.0 / gamma) * 65535.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_roundtrip_is_close() {
        let wp = WorkingProfile::identity_like_srgb();
        let (r, g, b) = (12000.0f32, 30000.0, 8000.0);
        let (l, a, bb) = rgb_to_lch(r, g, b, &wp, ColorSpace::Lab);
        let (r2, g2, b2) = lch_to_rgb(l, a, bb, &wp, ColorSpace::Lab);
        assert!((r - r2).abs() < 1.0, "{r} vs {r2}");
        assert!((g - g2).abs() < 1.0, "{g} vs {g2}");
        assert!((b - b2).abs() < 1.0, "{b} vs {b2}");
    }

    #[test]
    fn yuv_roundtrip_is_exact() {
        let wp = WorkingProfile::identity_like_srgb();
        let (r, g, b) = (12000.0f32, 30000.0, 8000.0);
        let (l, a, bb) = rgb_to_lch(r, g, b, &wp, ColorSpace::Yuv);
        let (r2, g2, b2) = lch_to_rgb(l, a, bb, &wp, ColorSpace::Yuv);
        assert!((r - r2).abs() < 1e-2);
        assert!((g - g2).abs() < 1e-2);
        assert!((b - b2).abs() < 1e-2);
    }

    #[test]
    fn gamma_identity_below_one() {
        let lut = GammaLut::build(1.0, true);
        assert_eq!(lut.apply(12345.0), 12345.0);
        assert_eq!(lut.invert(12345.0), 12345.0);
    }

    #[test]
    fn gamma_roundtrip_is_close() {
        let lut = GammaLut::build(2.2, true);
        let v = 8000.0f32;
        let up = lut.apply(v);
        let back = lut.invert(up);
        assert!((v - back).abs() < 2.0, "{v} vs {back}");
    }
}
