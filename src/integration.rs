//! Integration with the [image] crate (feature `image`).
//!
//! Lets a caller already holding an `image::Rgb32FImage` hand it to
//! [`crate::denoise`] and get one back, without the core crate depending on
//! `image` unconditionally (mirrors the `hayro-jpeg2000` crate's optional
//! `image` integration, minus the format-registration hooks this crate has
//! no use for — there is no on-disk format here, just a buffer conversion).

use core::fmt;

use image::{Rgb, Rgb32FImage};

use crate::plane::Plane;
use crate::rgb_image::RgbImage;

/// Failure converting between [`RgbImage`] and `image::Rgb32FImage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageConversionError {
    /// The source image had a zero width or height.
    Empty,
}

impl fmt::Display for ImageConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "image has a zero dimension"),
        }
    }
}

impl std::error::Error for ImageConversionError {}

impl TryFrom<&Rgb32FImage> for RgbImage {
    type Error = ImageConversionError;

    /// Converts an `image::Rgb32FImage` (values in `[0, 1]`) into an
    /// [`RgbImage`] in the `[0, 65535]` domain this crate's stages expect.
    fn try_from(image: &Rgb32FImage) -> Result<Self, Self::Error> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(ImageConversionError::Empty);
        }
        let (w, h) = (w as usize, h as usize);
        let mut r = Plane::zeros(w, h);
        let mut g = Plane::zeros(w, h);
        let mut b = Plane::zeros(w, h);
        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            r.set(x, y, pixel.0[0] * 65535.0);
            g.set(x, y, pixel.0[1] * 65535.0);
            b.set(x, y, pixel.0[2] * 65535.0);
        }
        Ok(RgbImage { r, g, b })
    }
}

impl From<&RgbImage> for Rgb32FImage {
    /// Converts an [`RgbImage`] (values in `[0, 65535]`) back into an
    /// `image::Rgb32FImage` with values in `[0, 1]`, clamped.
    fn from(image: &RgbImage) -> Self {
        let (w, h) = (image.width(), image.height());
        let mut out = Rgb32FImage::new(w as u32, h as u32);
        for y in 0..h {
            for x in 0..w {
                let px = Rgb([
                    (image.r().get(x, y) / 65535.0).clamp(0.0, 1.0),
                    (image.g().get(x, y) / 65535.0).clamp(0.0, 1.0),
                    (image.b().get(x, y) / 65535.0).clamp(0.0, 1.0),
                ]);
                out.put_pixel(x as u32, y as u32, px);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_values() {
        let mut src = Rgb32FImage::new(3, 2);
        for (i, pixel) in src.pixels_mut().enumerate() {
            let v = (i as f32 / 10.0).clamp(0.0, 1.0);
            *pixel = Rgb([v, v, v]);
        }
        let rgb = RgbImage::try_from(&src).unwrap();
        let back = Rgb32FImage::from(&rgb);
        for (a, b) in src.pixels().zip(back.pixels()) {
            for c in 0..3 {
                assert!((a.0[c] - b.0[c]).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn empty_image_is_rejected() {
        let empty = Rgb32FImage::new(0, 0);
        assert_eq!(RgbImage::try_from(&empty).unwrap_err(), ImageConversionError::Empty);
    }
}
