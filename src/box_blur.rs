//! Fast separable box blur used to smooth local shrinkage factors.

use crate::plane::Plane;

/// Runs a separable box blur of `src` into `dst`, using `scratch` as an
/// intermediate row-pass buffer (must be sized `width * height`, same as
/// `src`/`dst`; `src` and `dst` may alias).
///
/// A `radius` of `0` on an axis skips that axis's pass. At the borders the
/// running sum uses a shrinking window rather than reflecting samples, so
/// the divisor there is smaller than `2*radius+1`.
pub fn box_blur(
    src: &Plane,
    dst: &mut Plane,
    scratch: &mut Plane,
    radius_y: usize,
    radius_x: usize,
    width: usize,
    height: usize,
) {
    debug_assert_eq!(src.width(), width);
    debug_assert_eq!(src.height(), height);

    if radius_x == 0 && radius_y == 0 {
        dst.copy_from(src);
        return;
    }

    if radius_x == 0 {
        scratch.copy_from(src);
    } else {
        for y in 0..height {
            blur_line(src.row(y), scratch.row_mut(y), radius_x);
        }
    }

    if radius_y == 0 {
        dst.copy_from(scratch);
        return;
    }

    let mut column = vec![0.0f32; height];
    let mut column_out = vec![0.0f32; height];
    for x in 0..width {
        for y in 0..height {
            column[y] = scratch.get(x, y);
        }
        blur_line(&column, &mut column_out, radius_y);
        for y in 0..height {
            dst.set(x, y, column_out[y]);
        }
    }
}

/// Shrinking-window box blur of a single 1-D line.
fn blur_line(src: &[f32], dst: &mut [f32], radius: usize) {
    let n = src.len();
    if n == 0 {
        return;
    }
    for i in 0..n {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(n - 1);
        let mut sum = 0.0f32;
        for v in &src[lo..=hi] {
            sum += v;
        }
        dst[i] = sum / (hi - lo + 1) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_radius_is_identity() {
        let src = Plane::from_vec(3, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let mut dst = Plane::zeros(3, 3);
        let mut scratch = Plane::zeros(3, 3);
        box_blur(&src, &mut dst, &mut scratch, 0, 0, 3, 3);
        assert_eq!(dst.as_slice(), src.as_slice());
    }

    #[test]
    fn blurs_flat_plane_to_itself() {
        let src = Plane::from_vec(5, 5, vec![3.0; 25]);
        let mut dst = Plane::zeros(5, 5);
        let mut scratch = Plane::zeros(5, 5);
        box_blur(&src, &mut dst, &mut scratch, 2, 2, 5, 5);
        for &v in dst.as_slice() {
            assert!((v - 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn border_uses_shrinking_window() {
        let src = Plane::from_vec(5, 1, vec![0.0, 0.0, 10.0, 0.0, 0.0]);
        let mut dst = Plane::zeros(5, 1);
        let mut scratch = Plane::zeros(5, 1);
        box_blur(&src, &mut dst, &mut scratch, 0, 1, 5, 1);
        // Center cell averages 3 samples; edge cells average only 2.
        assert!((dst.get(2, 0) - 10.0 / 3.0).abs() < 1e-5);
        assert!((dst.get(0, 0) - 0.0).abs() < 1e-5);
    }
}
