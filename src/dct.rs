//! Tiled, overlapped block-DCT detail recovery pass.
//!
//! Runs on the luminance residual `Lin − L` (original minus wavelet-denoised):
//! each `TS×TS` block is windowed, forward-DCT'd, its coefficients are
//! attenuated by a local neighbor-energy estimate relative to a user-tunable
//! detail curve, inverse-DCT'd, and feather-blended back into an
//! accumulation buffer. Blocks overlap by `TS − offset` so no seam forms at
//! block boundaries.

use std::sync::Arc;

use rustdct::{Dct2, Dct3};

use crate::error::{bail, AllocationError, Result};
use crate::plane::Plane;
use crate::runtime::DenoiseRuntime;

/// Block edge length.
const TS: usize = 64;
/// Step between consecutive block origins; blocks overlap by `TS - OFFSET`.
const OFFSET: usize = 25;
/// Extra blocks added on each side of the block grid so every image pixel is
/// covered by at least one full-overlap block, even near the borders.
const BLKRAD: usize = 1;
/// `1 / (4 * TS^2)`, the unnormalized-DCT-to-spatial-domain scale factor.
const DCT_NORM: f32 = 1.0 / (4.0 * (TS * TS) as f32);
/// Feather floor added to both tilemasks so no weight is ever exactly zero.
const EPSILON: f32 = 0.001 / ((TS * TS) as f32);

fn detail_curve(d: f32) -> f32 {
    let t = 100.0 - d;
    let v = t * t + 50.0 * t;
    v * v * (TS * TS) as f32 / 4.0
}

/// A forward/inverse DCT-II/III plan pair for `TS`-length rows, plus the
/// feather windows used to blend overlapping blocks back together.
pub struct DctTileEngine {
    dct2: Arc<dyn Dct2<f32>>,
    dct3: Arc<dyn Dct3<f32>>,
    tilemask_in: Vec<f32>,
    tilemask_out: Vec<f32>,
}

impl DctTileEngine {
    /// Builds the engine's DCT plans under the runtime's plan-creation lock.
    pub fn new(runtime: &DenoiseRuntime) -> Result<Self> {
        let (dct2, dct3) = runtime.with_planner(|planner| (planner.plan_dct2(TS), planner.plan_dct3(TS)));
        let border_in = (TS / 16).max(2);
        let border_out = 2 * border_in;
        let win_in = feather_window(border_in);
        let win_out = feather_window(border_out);
        let tilemask_in = outer_product(&win_in);
        let tilemask_out = outer_product(&win_out);
        Ok(Self {
            dct2,
            dct3,
            tilemask_in,
            tilemask_out,
        })
    }

    /// Recovers a high-frequency detail residual from `residual` (typically
    /// `Lin - L`), attenuated by local DCT-coefficient energy relative to a
    /// `luminance_detail ∈ [0, 99.9]`-driven curve, optionally modulated
    /// per-pixel by a [`crate::detail_mask`] mask. `scale` is the wavelet
    /// working scale (driver's `scale` parameter), which widens the
    /// neighbor-energy blur at lower magnification.
    pub fn recover_detail(
        &self,
        residual: &Plane,
        mask: Option<&Plane>,
        luminance_detail: f32,
        scale: f32,
    ) -> Result<Plane> {
        let (w, h) = (residual.width(), residual.height());
        if w == 0 || h == 0 {
            bail!(AllocationError::DctEngine);
        }

        let detail_hi = detail_curve(luminance_detail);
        let detail_lo = detail_curve(0.0);
        let blur_radius = ((3.0 / scale).floor() as usize).max(1);

        let mut accum = Plane::zeros(w, h);
        let mut weight = Plane::zeros(w, h);

        for (hblk, vblk) in block_grid(w, h) {
            let left = (hblk as isize - BLKRAD as isize) * OFFSET as isize;
            let top = (vblk as isize - BLKRAD as isize) * OFFSET as isize;

            let mut block = self.extract_windowed_block(residual, left, top, w, h);
            self.forward(&mut block);

            let detail_factor = self.block_detail_factor(mask, left, top, w, h, luminance_detail, detail_hi, detail_lo);
            attenuate(&mut block, &detail_factor, blur_radius);

            self.inverse(&mut block);
            self.accumulate(&block, &mut accum, &mut weight, left, top, w, h);
        }

        for i in 0..(w * h) {
            let wt = weight.as_slice()[i];
            accum.as_mut_slice()[i] = if wt > 1e-12 {
                accum.as_slice()[i] / wt
            } else {
                0.0
            };
        }
        Ok(accum)
    }

    /// Extracts one `TS×TS` block with mirrored (reflect, no duplicated
    /// edge) out-of-bounds sampling, pre-multiplied by `tilemask_in`.
    fn extract_windowed_block(&self, src: &Plane, left: isize, top: isize, w: usize, h: usize) -> Vec<f32> {
        let mut block = vec![0.0f32; TS * TS];
        for j in 0..TS {
            let sy = reflect(top + j as isize, h);
            for i in 0..TS {
                let sx = reflect(left + i as isize, w);
                block[j * TS + i] = src.get(sx, sy) * self.tilemask_in[j * TS + i];
            }
        }
        block
    }

    /// Per-pixel detail-attenuation ceiling for one block: `detail_lo` in
    /// the mirrored padding region outside the image, the mask-modulated
    /// curve when a detail mask is active, `detail_hi` otherwise.
    #[allow(clippy::too_many_arguments)]
    fn block_detail_factor(
        &self,
        mask: Option<&Plane>,
        left: isize,
        top: isize,
        w: usize,
        h: usize,
        luminance_detail: f32,
        detail_hi: f32,
        detail_lo: f32,
    ) -> Vec<f32> {
        let mut out = vec![0.0f32; TS * TS];
        for j in 0..TS {
            let sy_raw = top + j as isize;
            for i in 0..TS {
                let sx_raw = left + i as isize;
                let inside = sx_raw >= 0 && (sx_raw as usize) < w && sy_raw >= 0 && (sy_raw as usize) < h;
                out[j * TS + i] = if !inside {
                    detail_lo
                } else if let Some(mask) = mask {
                    let mv = mask.get(sx_raw as usize, sy_raw as usize);
                    detail_curve(luminance_detail * mv)
                } else {
                    detail_hi
                };
            }
        }
        out
    }

    fn forward(&self, block: &mut [f32]) {
        for row in block.chunks_mut(TS) {
            self.dct2.process_dct2(row);
        }
        transpose_inplace(block, TS);
        for row in block.chunks_mut(TS) {
            self.dct2.process_dct2(row);
        }
        transpose_inplace(block, TS);
    }

    fn inverse(&self, block: &mut [f32]) {
        for row in block.chunks_mut(TS) {
            self.dct3.process_dct3(row);
        }
        transpose_inplace(block, TS);
        for row in block.chunks_mut(TS) {
            self.dct3.process_dct3(row);
        }
        transpose_inplace(block, TS);
    }

    #[allow(clippy::too_many_arguments)]
    fn accumulate(&self, block: &[f32], accum: &mut Plane, weight: &mut Plane, left: isize, top: isize, w: usize, h: usize) {
        for j in 0..TS {
            let dy = top + j as isize;
            if dy < 0 || dy as usize >= h {
                continue;
            }
            for i in 0..TS {
                let dx = left + i as isize;
                if dx < 0 || dx as usize >= w {
                    continue;
                }
                let cell = j * TS + i;
                let idx = (dy as usize) * w + dx as usize;
                accum.as_mut_slice()[idx] += self.tilemask_out[cell] * block[cell] * DCT_NORM;
                weight.as_mut_slice()[idx] += self.tilemask_in[cell] * self.tilemask_out[cell];
            }
        }
    }
}

/// Attenuates each coefficient `x` by `1 - exp(-nbrwt² / detail_factor)`,
/// where `nbrwt` is a local box-abs-blur of the block's coefficients.
fn attenuate(block: &mut [f32], detail_factor: &[f32], radius: usize) {
    let nbrwt = box_abs_blur(block, TS, radius);
    for i in 0..block.len() {
        let df = detail_factor[i].max(1e-6);
        let n = nbrwt[i];
        let factor = 1.0 - (-(n * n) / df).exp();
        block[i] *= factor;
    }
}

/// Box blur of `|block|` over a `(2*radius+1)^2` neighborhood, used as the
/// local coefficient-energy estimate in [`attenuate`].
fn box_abs_blur(block: &[f32], ts: usize, radius: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; ts * ts];
    for j in 0..ts {
        let j0 = j.saturating_sub(radius);
        let j1 = (j + radius).min(ts - 1);
        for i in 0..ts {
            let i0 = i.saturating_sub(radius);
            let i1 = (i + radius).min(ts - 1);
            let mut sum = 0.0f32;
            let mut count = 0usize;
            for yy in j0..=j1 {
                for xx in i0..=i1 {
                    sum += block[yy * ts + xx].abs();
                    count += 1;
                }
            }
            out[j * ts + i] = sum / count as f32;
        }
    }
    out
}

/// Transposes a `ts x ts` row-major buffer in place.
fn transpose_inplace(block: &mut [f32], ts: usize) {
    for j in 0..ts {
        for i in (j + 1)..ts {
            block.swap(j * ts + i, i * ts + j);
        }
    }
}

/// 1-D half-cosine feather: `sin²(π·k1/(2·border))` within `border` of
/// either edge, `1.0` in the interior, where `k1` folds position `k` onto
/// its distance from the nearer edge.
fn feather_window(border: usize) -> Vec<f32> {
    (0..TS)
        .map(|k| {
            let k1 = if k > TS / 2 {
                ((TS - 1) as isize - k as isize).unsigned_abs() as f32
            } else {
                k as f32
            };
            if k1 < border as f32 {
                let s = (std::f32::consts::PI * k1 / (2.0 * border as f32)).sin();
                s * s
            } else {
                1.0
            }
        })
        .collect()
}

/// Builds the separable 2-D `TS×TS` table `win[i]·win[j] + epsilon`.
fn outer_product(win: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f32; TS * TS];
    for j in 0..TS {
        for i in 0..TS {
            out[j * TS + i] = win[i] * win[j] + EPSILON;
        }
    }
    out
}

/// Block grid indices `(hblk, vblk)` covering `(w, h)`: `ceil(dim/OFFSET) +
/// 2*BLKRAD` blocks per axis, so the outermost blocks' reflected padding
/// always fully covers the image edges.
fn block_grid(w: usize, h: usize) -> Vec<(usize, usize)> {
    let numblox_w = w.div_ceil(OFFSET) + 2 * BLKRAD;
    let numblox_h = h.div_ceil(OFFSET) + 2 * BLKRAD;
    let mut out = Vec::with_capacity(numblox_w * numblox_h);
    for vblk in 0..numblox_h {
        for hblk in 0..numblox_w {
            out.push((hblk, vblk));
        }
    }
    out
}

/// Mirrors `i` into `[0, len)` without duplicating the edge sample (reflect,
/// not clamp): `-1 -> 1`, `len -> len-2`, etc.
fn reflect(i: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut m = i.rem_euclid(period);
    if m >= len as isize {
        m = period - m;
    }
    m as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_does_not_duplicate_edge() {
        assert_eq!(reflect(-1, 10), 1);
        assert_eq!(reflect(0, 10), 0);
        assert_eq!(reflect(9, 10), 9);
        assert_eq!(reflect(10, 10), 8);
    }

    #[test]
    fn low_detail_suppresses_small_residual_more_than_high_detail() {
        let runtime = DenoiseRuntime::single_threaded();
        let engine = DctTileEngine::new(&runtime).unwrap();
        let mut data = vec![0.0f32; 96 * 96];
        for (i, v) in data.iter_mut().enumerate() {
            *v = (((i * 31) % 40) as f32) - 20.0;
        }
        let residual = Plane::from_vec(96, 96, data);

        let low = engine.recover_detail(&residual, None, 0.0, 1.0).unwrap();
        let high = engine.recover_detail(&residual, None, 99.0, 1.0).unwrap();

        let energy = |p: &Plane| p.as_slice().iter().map(|v| v.abs()).sum::<f32>();
        assert!(energy(&low) <= energy(&high) + 1e-3);
    }

    #[test]
    fn zero_residual_stays_zero() {
        let runtime = DenoiseRuntime::single_threaded();
        let engine = DctTileEngine::new(&runtime).unwrap();
        let residual = Plane::zeros(96, 96);
        let out = engine.recover_detail(&residual, None, 50.0, 1.0).unwrap();
        assert!(out.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn block_grid_covers_small_and_large_images() {
        assert!(!block_grid(40, 40).is_empty());
        assert!(block_grid(200, 130).len() > block_grid(40, 40).len());
    }
}
