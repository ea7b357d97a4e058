//! Optional k×k median pre/post filter.
//!
//! Not on the critical wavelet/DCT path, but part of the core's public
//! surface: a driver can run it before the wavelet stage on the luma plane
//! or a caller can use it standalone.

use crate::config::MedianKind;
use crate::plane::Plane;

/// Runs `iterations` passes of a `kind`-shaped median filter from `src` into
/// `dst`. `src` and `dst` may alias; an internal scratch buffer is allocated
/// when needed (aliasing, or `iterations > 1`).
///
/// Border rows/columns of width `(k-1)/2` are copied unchanged on the first
/// iteration and carried through on later ones. When `bound` is `Some`,
/// pixels whose *input* value (to that iteration) exceeds it are passed
/// through unchanged instead of being replaced by the median.
pub fn median(src: &Plane, dst: &mut Plane, kind: MedianKind, iterations: u32, bound: Option<f32>) {
    let iterations = iterations.max(1);
    let (w, h) = (src.width(), src.height());
    let border = kind.border();

    if w <= 2 * border || h <= 2 * border {
        dst.copy_from(src);
        return;
    }

    let mut buffers = [src.clone(), Plane::zeros(w, h)];
    let mut current = 0usize;

    for _ in 0..iterations {
        let (read, write) = if current == 0 {
            let (a, b) = buffers.split_at_mut(1);
            (&a[0], &mut b[0])
        } else {
            let (a, b) = buffers.split_at_mut(1);
            (&b[0], &mut a[0])
        };

        for y in 0..border {
            write.row_mut(y).copy_from_slice(read.row(y));
            write.row_mut(h - 1 - y).copy_from_slice(read.row(h - 1 - y));
        }

        for y in border..h - border {
            for x in 0..border {
                write.set(x, y, read.get(x, y));
                write.set(w - 1 - x, y, read.get(w - 1 - x, y));
            }
            for x in border..w - border {
                let center = read.get(x, y);
                if let Some(b) = bound {
                    if center > b {
                        write.set(x, y, center);
                        continue;
                    }
                }
                write.set(x, y, kind.apply(read, x, y));
            }
        }

        current ^= 1;
    }

    let result = &buffers[current];
    dst.copy_from(result);
}

impl MedianKind {
    fn border(self) -> usize {
        match self {
            MedianKind::Soft3x3 | MedianKind::Strong3x3 => 1,
            MedianKind::Soft5x5 | MedianKind::Strong5x5 => 2,
            MedianKind::Size7x7 => 3,
            MedianKind::Size9x9 => 4,
        }
    }

    /// Computes the median of this kind's neighborhood centered at `(x, y)`.
    fn apply(self, src: &Plane, x: usize, y: usize) -> f32 {
        let g = |dx: isize, dy: isize| src.get((x as isize + dx) as usize, (y as isize + dy) as usize);
        match self {
            MedianKind::Soft3x3 => {
                let mut v = [g(0, -1), g(-1, 0), g(0, 0), g(1, 0), g(0, 1)];
                median_of_slice(&mut v)
            }
            MedianKind::Strong3x3 => {
                let mut v = [
                    g(-1, -1),
                    g(0, -1),
                    g(1, -1),
                    g(-1, 0),
                    g(0, 0),
                    g(1, 0),
                    g(-1, 1),
                    g(0, 1),
                    g(1, 1),
                ];
                median_of_slice(&mut v)
            }
            MedianKind::Soft5x5 => {
                let mut v = [
                    g(0, -2),
                    g(-1, -1),
                    g(0, -1),
                    g(1, -1),
                    g(-2, 0),
                    g(-1, 0),
                    g(0, 0),
                    g(1, 0),
                    g(2, 0),
                    g(-1, 1),
                    g(0, 1),
                    g(1, 1),
                    g(0, 2),
                ];
                median_of_slice(&mut v)
            }
            MedianKind::Strong5x5 => {
                let mut v = [0.0f32; 25];
                let mut i = 0;
                for dy in -2..=2 {
                    for dx in -2..=2 {
                        v[i] = g(dx, dy);
                        i += 1;
                    }
                }
                median_of_slice(&mut v)
            }
            MedianKind::Size7x7 => {
                let mut v = [0.0f32; 49];
                let mut i = 0;
                for dy in -3..=3 {
                    for dx in -3..=3 {
                        v[i] = g(dx, dy);
                        i += 1;
                    }
                }
                median_of_slice(&mut v)
            }
            MedianKind::Size9x9 => {
                let mut v = [0.0f32; 81];
                let mut i = 0;
                for dy in -4..=4 {
                    for dx in -4..=4 {
                        v[i] = g(dx, dy);
                        i += 1;
                    }
                }
                median_of_slice(&mut v)
            }
        }
    }
}

fn median_of_slice(v: &mut [f32]) -> f32 {
    let mid = v.len() / 2;
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if v.len() % 2 == 1 {
        v[mid]
    } else {
        0.5 * (v[mid - 1] + v[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_3x3_kills_salt_and_pepper() {
        let mut data = vec![100.0f32; 8 * 8];
        data[3 * 8 + 3] = 50000.0;
        let src = Plane::from_vec(8, 8, data);
        let mut dst = Plane::zeros(8, 8);
        median(&src, &mut dst, MedianKind::Strong3x3, 1, None);
        assert_eq!(dst.get(3, 3), 100.0);
    }

    #[test]
    fn bound_preserves_pixels_above_threshold() {
        let mut data = vec![100.0f32; 8 * 8];
        data[3 * 8 + 3] = 60000.0;
        let src = Plane::from_vec(8, 8, data);
        let mut dst = Plane::zeros(8, 8);
        median(&src, &mut dst, MedianKind::Strong3x3, 1, Some(50000.0));
        assert_eq!(dst.get(3, 3), 60000.0);
    }

    #[test]
    fn border_is_copied_unchanged() {
        let data: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let src = Plane::from_vec(8, 8, data.clone());
        let mut dst = Plane::zeros(8, 8);
        median(&src, &mut dst, MedianKind::Strong3x3, 1, None);
        for x in 0..8 {
            assert_eq!(dst.get(x, 0), src.get(x, 0));
            assert_eq!(dst.get(x, 7), src.get(x, 7));
        }
    }

    #[test]
    fn two_single_iterations_match_one_double_iteration() {
        let data: Vec<f32> = (0..(16 * 16)).map(|i| ((i * 37) % 251) as f32).collect();
        let src = Plane::from_vec(16, 16, data);

        let mut once = Plane::zeros(16, 16);
        median(&src, &mut once, MedianKind::Strong3x3, 1, None);
        let mut twice_manual = Plane::zeros(16, 16);
        median(&once, &mut twice_manual, MedianKind::Strong3x3, 1, None);

        let mut twice_direct = Plane::zeros(16, 16);
        median(&src, &mut twice_direct, MedianKind::Strong3x3, 2, None);

        for i in 0..(16 * 16) {
            assert!((twice_manual.as_slice()[i] - twice_direct.as_slice()[i]).abs() < 1e-4);
        }
    }
}
