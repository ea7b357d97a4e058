//! Stationary (undecimated) wavelet decomposition and reconstruction.
//!
//! Each level applies a separable low-pass filter dilated by `2^level`
//! ("à trous") and takes the high-pass residual as `original - lowpass`,
//! along each axis in turn. That makes every sub-band a simple linear split
//! of its parent band, so reconstruction is exact by construction: summing
//! a band's four children always reproduces it, independent of the chosen
//! filter taps (the open design question in this area is only which taps
//! shape the noise estimate, not whether reconstruction holds).

use crate::error::{bail, DimensionError, Result};
use crate::plane::Plane;

/// Symmetric 3-tap low-pass kernel, dilated by `2^level` between levels.
const TAPS: [f32; 3] = [0.25, 0.5, 0.25];

/// The four full-resolution sub-bands produced for one decomposition level.
#[derive(Debug, Clone)]
pub struct LevelBands {
    /// Approximation band `A_k` (the plane entering this level).
    pub approx: Plane,
    /// Horizontal detail (`H`): low-pass vertically, high-pass horizontally.
    pub h: Plane,
    /// Vertical detail (`V`): high-pass vertically, low-pass horizontally.
    pub v: Plane,
    /// Diagonal detail (`D`): high-pass along both axes.
    pub d: Plane,
}

/// An undecimated wavelet pyramid over one plane.
#[derive(Debug, Clone)]
pub struct WaveletPyramid {
    levels: Vec<LevelBands>,
    /// The coarsest approximation band, `A_L`, which seeds reconstruction.
    coarsest_approx: Plane,
}

impl WaveletPyramid {
    /// Number of decomposition levels held by this pyramid.
    pub fn levels(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Mutable access to the four sub-bands at level `k` (0 = finest).
    pub fn level_coeffs(&mut self, k: u32) -> &mut LevelBands {
        &mut self.levels[k as usize]
    }

    /// Shared access to the four sub-bands at level `k`.
    pub fn level_coeffs_ref(&self, k: u32) -> &LevelBands {
        &self.levels[k as usize]
    }

    /// The coarsest approximation band `A_L`.
    pub fn coarsest_approx(&self) -> &Plane {
        &self.coarsest_approx
    }
}

/// Clamps a requested level count to `[3, min(8, floor(log2(min(W,H))))]`.
pub fn clamp_levels(requested: u32, width: usize, height: usize) -> u32 {
    let min_dim = width.min(height) as u32;
    let max_levels = if min_dim < 2 {
        0
    } else {
        (31 - min_dim.leading_zeros()).min(8)
    };
    requested.clamp(3, max_levels.max(3))
}

/// Computes a stationary wavelet pyramid of `plane` with `levels` levels.
pub fn decompose(plane: &Plane, levels: u32) -> Result<WaveletPyramid> {
    let min_dim = plane.width().min(plane.height()) as u32;
    if min_dim < (1u32 << levels) {
        bail!(DimensionError::TooSmallForLevels { levels, min_dim });
    }

    let mut bands = Vec::with_capacity(levels as usize);
    let mut current = plane.clone();

    for level in 0..levels {
        let dilation = 1usize << level;
        let approx_in = current.clone();

        let (lo_x, hi_x) = split_horizontal(&approx_in, dilation);
        let (approx_next, v) = split_vertical(&lo_x, dilation);
        let (h, d) = split_vertical(&hi_x, dilation);

        bands.push(LevelBands {
            approx: approx_in,
            h,
            v,
            d,
        });
        current = approx_next;
    }

    Ok(WaveletPyramid {
        levels: bands,
        coarsest_approx: current,
    })
}

/// Reconstructs a plane from a pyramid by summing bands from the coarsest
/// level back down to the finest.
pub fn reconstruct(pyramid: &WaveletPyramid) -> Plane {
    let mut acc = pyramid.coarsest_approx.clone();
    for k in (0..pyramid.levels()).rev() {
        let bands = pyramid.level_coeffs_ref(k);
        acc = sum4(&acc, &bands.h, &bands.v, &bands.d);
    }
    acc
}

fn sum4(a: &Plane, b: &Plane, c: &Plane, d: &Plane) -> Plane {
    let mut out = Plane::zeros(a.width(), a.height());
    let out_slice = out.as_mut_slice();
    let (a, b, c, d) = (a.as_slice(), b.as_slice(), c.as_slice(), d.as_slice());
    for i in 0..out_slice.len() {
        out_slice[i] = a[i] + b[i] + c[i] + d[i];
    }
    out
}

/// Splits `plane` into `(lowpass, highpass)` along rows, where
/// `highpass = plane - lowpass`.
fn split_horizontal(plane: &Plane, dilation: usize) -> (Plane, Plane) {
    let (w, h) = (plane.width(), plane.height());
    let mut lo = Plane::zeros(w, h);
    let mut hi = Plane::zeros(w, h);
    for y in 0..h {
        let row = plane.row(y);
        let lo_row = lo.row_mut(y);
        for x in 0..w {
            lo_row[x] = filter_tap(row, x, dilation);
        }
    }
    for i in 0..(w * h) {
        hi.as_mut_slice()[i] = plane.as_slice()[i] - lo.as_slice()[i];
    }
    (lo, hi)
}

/// Splits `plane` into `(lowpass, highpass)` along columns.
fn split_vertical(plane: &Plane, dilation: usize) -> (Plane, Plane) {
    let (w, h) = (plane.width(), plane.height());
    let mut lo = Plane::zeros(w, h);
    for x in 0..w {
        for y in 0..h {
            let a = sample_col(plane, x, y as isize - dilation as isize, h);
            let b = plane.get(x, y);
            let c = sample_col(plane, x, y as isize + dilation as isize, h);
            lo.set(x, y, TAPS[0] * a + TAPS[1] * b + TAPS[2] * c);
        }
    }
    let mut hi = Plane::zeros(w, h);
    for i in 0..(w * h) {
        hi.as_mut_slice()[i] = plane.as_slice()[i] - lo.as_slice()[i];
    }
    (lo, hi)
}

#[inline]
fn filter_tap(row: &[f32], x: usize, dilation: usize) -> f32 {
    let w = row.len();
    let a = row[clamp_index(x as isize - dilation as isize, w)];
    let b = row[x];
    let c = row[clamp_index(x as isize + dilation as isize, w)];
    TAPS[0] * a + TAPS[1] * b + TAPS[2] * c
}

#[inline]
fn sample_col(plane: &Plane, x: usize, y: isize, h: usize) -> f32 {
    plane.get(x, clamp_index(y, h))
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    if i < 0 {
        0
    } else if i as usize >= len {
        len - 1
    } else {
        i as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruction_identity_holds() {
        let mut data = Vec::with_capacity(32 * 32);
        for y in 0..32 {
            for x in 0..32 {
                data.push(((x * 7 + y * 13) % 97) as f32);
            }
        }
        let plane = Plane::from_vec(32, 32, data);
        let pyramid = decompose(&plane, 3).unwrap();
        let out = reconstruct(&pyramid);
        for i in 0..plane.as_slice().len() {
            let diff = (plane.as_slice()[i] - out.as_slice()[i]).abs();
            assert!(diff < 1e-3, "diff {diff} at {i}");
        }
    }

    #[test]
    fn rejects_plane_too_small_for_levels() {
        let plane = Plane::zeros(4, 4);
        let err = decompose(&plane, 4).unwrap_err();
        assert!(matches!(
            err,
            crate::error::DenoiseError::Dimension(DimensionError::TooSmallForLevels { .. })
        ));
    }

    #[test]
    fn clamp_levels_respects_bounds() {
        assert_eq!(clamp_levels(10, 256, 256), 8);
        assert_eq!(clamp_levels(1, 256, 256), 3);
        assert_eq!(clamp_levels(6, 32, 32), 5);
    }
}
