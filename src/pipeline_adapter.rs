//! Minimal contract between the denoise core and the surrounding raw
//! pipeline: supplies the input image and working-profile
//! matrices, nothing more. Kept as a real trait (rather than a bag of
//! loose arguments) so `DenoiseDriver` can be exercised against a fake
//! adapter in tests without a real raw pipeline.

use crate::rgb_image::{RgbImage, WorkingProfile};

/// What the denoise core needs from its host pipeline.
pub trait PipelineAdapter {
    /// The tile (or whole image) to denoise.
    fn tiles(&self) -> &RgbImage;

    /// The RGB working space's XYZ transform matrices.
    fn working_profile(&self) -> &WorkingProfile;

    /// Exposure compensation already baked into the source, in stops. The
    /// driver applies `gain = 2^exposure` before the gamma-in LUT.
    fn exposure(&self) -> f32 {
        0.0
    }

    /// Whether the source is linear raw data (`true`) or already
    /// gamma-encoded (TIFF/JPEG-derived, `false`); controls the gamma
    /// reduction applied on non-raw inputs.
    fn is_raw(&self) -> bool {
        true
    }

    /// The working scale of the current processing pass (e.g. a preview
    /// downscale factor); affects shrink blur radii and the DCT engine's
    /// neighbor-energy blur.
    fn scale(&self) -> f32 {
        1.0
    }
}

/// A fixed in-memory [`PipelineAdapter`], useful for tests and for callers
/// that already have a fully-formed tile and profile in hand.
pub struct FixedAdapter {
    tile: RgbImage,
    profile: WorkingProfile,
    exposure: f32,
    is_raw: bool,
    scale: f32,
}

impl FixedAdapter {
    pub fn new(tile: RgbImage, profile: WorkingProfile) -> Self {
        Self {
            tile,
            profile,
            exposure: 0.0,
            is_raw: true,
            scale: 1.0,
        }
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_is_raw(mut self, is_raw: bool) -> Self {
        self.is_raw = is_raw;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

impl PipelineAdapter for FixedAdapter {
    fn tiles(&self) -> &RgbImage {
        &self.tile
    }

    fn working_profile(&self) -> &WorkingProfile {
        &self.profile
    }

    fn exposure(&self) -> f32 {
        self.exposure
    }

    fn is_raw(&self) -> bool {
        self.is_raw
    }

    fn scale(&self) -> f32 {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_adapter_reports_defaults() {
        let tile = RgbImage::zeros(4, 4);
        let profile = WorkingProfile::identity_like_srgb();
        let adapter = FixedAdapter::new(tile, profile);
        assert_eq!(adapter.exposure(), 0.0);
        assert!(adapter.is_raw());
        assert_eq!(adapter.scale(), 1.0);
    }

    #[test]
    fn fixed_adapter_builder_overrides() {
        let tile = RgbImage::zeros(4, 4);
        let profile = WorkingProfile::identity_like_srgb();
        let adapter = FixedAdapter::new(tile, profile)
            .with_exposure(1.5)
            .with_is_raw(false)
            .with_scale(0.5);
        assert_eq!(adapter.exposure(), 1.5);
        assert!(!adapter.is_raw());
        assert_eq!(adapter.scale(), 0.5);
    }
}
